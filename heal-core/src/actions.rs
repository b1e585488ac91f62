//! Click and type routed through the resolver, with bounded recovery.
use crate::resolver::SelectorResolver;
use heal_common::{ConfigurationProvider, FailureKind, RepairMode, Result};
use heal_drivers::{BrowserDriver, DriverError};
use std::sync::Arc;

/// High-level actions. Every recovery path retries at most once.
pub struct SafeActions<D: BrowserDriver, P: ConfigurationProvider> {
    resolver: SelectorResolver<D, P>,
}

impl<D: BrowserDriver, P: ConfigurationProvider> SafeActions<D, P> {
    pub fn new(resolver: SelectorResolver<D, P>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &SelectorResolver<D, P> {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut SelectorResolver<D, P> {
        &mut self.resolver
    }

    pub fn into_resolver(self) -> SelectorResolver<D, P> {
        self.resolver
    }

    /// Click `key`.
    ///
    /// An intercepted click heals once in `obstacle_repair` mode, clicks the
    /// returned dismiss control and retries the original click once. A
    /// stale or non-interactable element is re-resolved and clicked once
    /// more without asking for a repair.
    pub async fn click(&mut self, key: &str) -> Result<()> {
        let driver = Arc::clone(self.resolver.driver());
        let element = self.resolver.find(key, None).await?;
        match driver.click(&element).await {
            Ok(()) => Ok(()),
            Err(DriverError::ClickIntercepted(msg)) => {
                tracing::warn!(target: "heal.actions", %key, reason = %msg, "click intercepted");
                let old_selector = self.resolver.first_selector(key)?;
                let dismiss = self
                    .resolver
                    .heal(
                        key,
                        &old_selector,
                        FailureKind::Intercepted,
                        RepairMode::ObstacleRepair,
                    )
                    .await?;
                let control = self.resolver.find_by_selector(&dismiss, None).await?;
                driver.click(&control).await?;
                tracing::info!(target: "heal.actions", %key, %dismiss, "obstacle dismissed");

                let element = self.resolver.find(key, None).await?;
                driver.click(&element).await?;
                Ok(())
            }
            Err(e) if e.is_stale_or_not_interactable() => {
                tracing::info!(target: "heal.actions", %key, error = %e, "re-resolving before retrying click");
                let element = self.resolver.find(key, None).await?;
                driver.click(&element).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Type `value` into `key`, clearing it first when asked.
    pub async fn type_text(&mut self, key: &str, value: &str, clear_first: bool) -> Result<()> {
        let driver = Arc::clone(self.resolver.driver());
        let element = self.resolver.find(key, None).await?;
        match fill(driver.as_ref(), &element, value, clear_first).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_stale_or_not_interactable() => {
                tracing::info!(target: "heal.actions", %key, error = %e, "re-resolving before retrying input");
                let element = self.resolver.find(key, None).await?;
                fill(driver.as_ref(), &element, value, clear_first).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn fill<D: BrowserDriver>(
    driver: &D,
    element: &D::Element,
    value: &str,
    clear_first: bool,
) -> std::result::Result<(), DriverError> {
    if clear_first {
        driver.clear(element).await?;
    }
    driver.send_keys(element, value).await
}
