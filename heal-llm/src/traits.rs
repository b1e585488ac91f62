use crate::payload::RepairPayload;
use async_trait::async_trait;
use heal_common::Result;

/// Provider-neutral selector repair capability.
///
/// Implementations differ only in transport; all of them send the same
/// system instruction and the same serialized payload, with temperature 0.
#[async_trait]
pub trait SelectorRepairClient: Send + Sync {
    /// Ask the backend for exactly one selector and return its raw text.
    ///
    /// An empty response is a [`heal_common::HealError::Provider`] failure;
    /// whether the text is a usable selector is decided by the caller.
    async fn repair_selector(&self, payload: &RepairPayload) -> Result<String>;

    /// Short provider label recorded in audit records (e.g. `openai`).
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}
