//! Browser driver layer for the healing pipeline.
//!
//! - [`driver::BrowserDriver`]: the primitive capability the resolver and
//!   healer consume (query, script, source, screenshot, cookies, input)
//! - [`driver::DriverError`]: classified WebDriver failures
//! - [`session::WebDriverSession`]: `fantoccini` implementation with
//!   chrome/firefox session bootstrap
pub mod driver;
pub mod session;

pub use driver::{BrowserCookie, BrowserDriver, DriverError};
pub use session::WebDriverSession;
