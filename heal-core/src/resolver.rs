//! Override-first, poll-until-deadline element resolution with one
//! automatic heal on exhaustion.
use crate::audit::OverrideMap;
use crate::coordinator::{HealRequest, HealingCoordinator};
use crate::monitor::DomMutationMonitor;
use heal_common::{
    ConfigurationProvider, FailureKind, HealError, RepairMode, Result, SelectorKind,
};
use heal_drivers::{BrowserDriver, DriverError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of polling a selector list.
#[derive(Debug)]
pub enum Resolution<E> {
    Found(E),
    /// Deadline passed, or nothing left worth polling. Carries the last
    /// driver error seen, if any.
    Exhausted(Option<DriverError>),
}

/// Timing knobs for [`SelectorResolver`].
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub default_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Public lookup surface of the pipeline.
///
/// Owns the in-memory [`OverrideMap`], loaded once from the audit store at
/// construction.
pub struct SelectorResolver<D: BrowserDriver, P: ConfigurationProvider> {
    driver: Arc<D>,
    provider: P,
    monitor: DomMutationMonitor,
    coordinator: HealingCoordinator,
    overrides: OverrideMap,
    settings: ResolverSettings,
}

impl<D: BrowserDriver, P: ConfigurationProvider> SelectorResolver<D, P> {
    pub fn new(
        driver: Arc<D>,
        provider: P,
        coordinator: HealingCoordinator,
        settings: ResolverSettings,
    ) -> Result<Self> {
        let overrides = coordinator.audit().read_overrides()?;
        tracing::debug!(target: "heal.resolver", overrides = overrides.len(), "resolver ready");
        Ok(Self {
            driver,
            provider,
            monitor: DomMutationMonitor::new(),
            coordinator,
            overrides,
            settings,
        })
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutable access for runtime adjustments such as clearing fallbacks.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    pub fn coordinator(&self) -> &HealingCoordinator {
        &self.coordinator
    }

    /// Resolve `key` to a live element, healing at most once.
    pub async fn find(&mut self, key: &str, timeout: Option<Duration>) -> Result<D::Element> {
        let timeout = timeout.unwrap_or(self.settings.default_timeout);
        self.monitor.install(self.driver.as_ref()).await?;
        self.monitor.flush_events(self.driver.as_ref()).await?;

        let candidates = self.selector_candidates(key)?;
        match self.poll(&candidates, timeout).await? {
            Resolution::Found(element) => Ok(element),
            Resolution::Exhausted(last_error) => {
                let failure = failure_kind(last_error.as_ref());
                tracing::warn!(
                    target: "heal.resolver",
                    %key,
                    %failure,
                    timeout_ms = timeout.as_millis() as u64,
                    "selectors exhausted"
                );
                let old_selector = candidates
                    .first()
                    .map(|(_, s)| s.clone())
                    .unwrap_or_default();
                let healed = self
                    .heal(key, &old_selector, failure, RepairMode::TargetRepair)
                    .await?;
                self.find_by_selector(&healed, Some(timeout)).await
            }
        }
    }

    /// Poll one selector until it matches; never heals.
    pub async fn find_by_selector(
        &self,
        selector: &str,
        timeout: Option<Duration>,
    ) -> Result<D::Element> {
        let timeout = timeout.unwrap_or(self.settings.default_timeout);
        let candidates = [(SelectorKind::infer(selector), selector.to_string())];
        match self.poll(&candidates, timeout).await? {
            Resolution::Found(element) => Ok(element),
            Resolution::Exhausted(Some(DriverError::InvalidSelector { selector, message })) => {
                Err(HealError::InvalidSelectorSyntax { selector, message })
            }
            Resolution::Exhausted(Some(DriverError::StaleElement(msg))) => {
                Err(HealError::StaleReference(msg))
            }
            Resolution::Exhausted(_) => Err(HealError::NotFound {
                target: selector.to_string(),
                timeout,
            }),
        }
    }

    /// Invoke the coordinator for `key` directly.
    ///
    /// `old_selector` should be the first selector that was tried.
    pub async fn heal(
        &mut self,
        key: &str,
        old_selector: &str,
        failure: FailureKind,
        mode: RepairMode,
    ) -> Result<String> {
        let definition = self.provider.get_element(key)?;
        let request = HealRequest {
            definition,
            old_selector,
            failure,
            mode,
        };
        self.coordinator
            .heal(self.driver.as_ref(), request, &mut self.overrides)
            .await
    }

    /// First selector `find` would try for `key`.
    pub fn first_selector(&self, key: &str) -> Result<String> {
        let definition = self.provider.get_element(key)?;
        Ok(self
            .overrides
            .get(key)
            .unwrap_or(definition.selector.as_str())
            .to_string())
    }

    /// Override, then primary, then fallbacks in declared order.
    fn selector_candidates(&self, key: &str) -> Result<Vec<(SelectorKind, String)>> {
        let definition = self.provider.get_element(key)?;
        let mut selectors = Vec::with_capacity(definition.fallback_selectors.len() + 2);
        if let Some(over) = self.overrides.get(key).filter(|s| !s.is_empty()) {
            selectors.push((SelectorKind::infer(over), over.to_string()));
        }
        selectors.push((definition.selector_type, definition.selector.clone()));
        for fallback in &definition.fallback_selectors {
            selectors.push((SelectorKind::infer(fallback), fallback.clone()));
        }
        Ok(selectors)
    }

    /// Every tick tries every selector in order and returns the first match
    /// of the first selector that matches.
    async fn poll(
        &self,
        selectors: &[(SelectorKind, String)],
        timeout: Duration,
    ) -> Result<Resolution<D::Element>> {
        let deadline = Instant::now() + timeout;
        let mut last_error = None;
        while Instant::now() < deadline {
            let mut invalid = 0;
            for (kind, selector) in selectors {
                match self.driver.find_all(*kind, selector).await {
                    Ok(matches) => {
                        if let Some(first) = matches.into_iter().next() {
                            tracing::debug!(target: "heal.resolver", %selector, "matched");
                            return Ok(Resolution::Found(first));
                        }
                    }
                    Err(e @ DriverError::InvalidSelector { .. }) => {
                        tracing::debug!(target: "heal.resolver", %selector, error = %e, "skipping invalid selector");
                        invalid += 1;
                        last_error = Some(e);
                    }
                    Err(DriverError::NoSuchElement(_)) => {}
                    Err(e @ DriverError::StaleElement(_)) => {
                        return Ok(Resolution::Exhausted(Some(e)));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if invalid == selectors.len() {
                break;
            }
            sleep(self.settings.poll_interval).await;
        }
        Ok(Resolution::Exhausted(last_error))
    }
}

fn failure_kind(last_error: Option<&DriverError>) -> FailureKind {
    match last_error {
        Some(DriverError::InvalidSelector { .. }) => FailureKind::NotFound,
        Some(DriverError::StaleElement(_)) => FailureKind::StaleReference,
        _ => FailureKind::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_reason_selects_failure_kind() {
        assert_eq!(failure_kind(None), FailureKind::Timeout);
        let invalid = DriverError::InvalidSelector {
            selector: "##".into(),
            message: "bad".into(),
        };
        assert_eq!(failure_kind(Some(&invalid)), FailureKind::NotFound);
        let stale = DriverError::StaleElement("gone".into());
        assert_eq!(failure_kind(Some(&stale)), FailureKind::StaleReference);
    }
}
