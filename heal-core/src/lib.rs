//! Self-healing selector resolution.
//!
//! [`resolver::SelectorResolver`] resolves element keys against a live
//! document, polling the override, primary and fallback selectors until a
//! deadline. On exhaustion it hands the failure to
//! [`coordinator::HealingCoordinator`], which captures the page, ranks
//! candidates with [`scoring`], asks a repair backend for one selector,
//! validates it against the document and records the attempt in
//! [`audit::AuditLog`].
//!
//! [`actions::SafeActions`] layers click and type on top with bounded
//! recovery.
pub mod actions;
pub mod artifacts;
pub mod audit;
pub mod coordinator;
pub mod extract;
pub mod monitor;
pub mod resolver;
pub mod scoring;

pub use actions::SafeActions;
pub use artifacts::ArtifactStore;
pub use audit::{AuditLog, HealAttempt, OverrideMap};
pub use coordinator::{HealRequest, HealStage, HealingCoordinator};
pub use extract::CandidateExtractor;
pub use monitor::DomMutationMonitor;
pub use resolver::{Resolution, ResolverSettings, SelectorResolver};
