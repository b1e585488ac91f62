use anyhow::{Context, Result};
use heal_config::{SuiteConfig, SuiteConfigLoader};
use heal_core::{
    ArtifactStore, AuditLog, HealingCoordinator, ResolverSettings, SafeActions, SelectorResolver,
};
use heal_drivers::{BrowserDriver, WebDriverSession};
use heal_llm::create_repair_client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn settings_from(cfg: &SuiteConfig) -> ResolverSettings {
    ResolverSettings {
        default_timeout: Duration::from_secs(cfg.environment.default_timeout_seconds),
        poll_interval: Duration::from_millis(cfg.environment.poll_interval_ms.max(1)),
    }
}

pub async fn resolve(
    suite: &Path,
    browser: &str,
    keys: &[String],
    click: bool,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let cfg = SuiteConfigLoader::new()
        .with_file(suite)
        .load()
        .with_context(|| format!("failed to load suite {}", suite.display()))?;

    let client = create_repair_client(&cfg.repair_config())?;
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "repair backend ready"
    );

    let artifacts = ArtifactStore::new(cfg.artifacts.root.clone())?;
    let audit = AuditLog::open(&cfg.artifacts.root)?;
    let coordinator = HealingCoordinator::new(client, artifacts, audit);

    let session = Arc::new(WebDriverSession::start(browser, &cfg.environment).await?);
    let base_url = cfg.environment.base_url.clone();
    let settings = settings_from(&cfg);
    let resolver = match SelectorResolver::new(Arc::clone(&session), cfg, coordinator, settings) {
        Ok(resolver) => resolver,
        Err(e) => {
            close_session(session).await;
            return Err(e.into());
        }
    };
    let actions = SafeActions::new(resolver);

    let run = Run {
        browser,
        base_url: &base_url,
        keys,
        click,
        timeout: timeout_secs.map(Duration::from_secs),
    };
    let outcome = run.execute(&session, actions).await;

    close_session(session).await;

    let failures = outcome?;
    if failures > 0 {
        anyhow::bail!("{failures} of {} element(s) failed to resolve", keys.len());
    }
    Ok(())
}

async fn close_session(session: Arc<WebDriverSession>) {
    match Arc::try_unwrap(session) {
        Ok(session) => {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "failed to close webdriver session");
            }
        }
        Err(_) => tracing::warn!("session still shared; leaving it open"),
    }
}

struct Run<'a> {
    browser: &'a str,
    base_url: &'a str,
    keys: &'a [String],
    click: bool,
    timeout: Option<Duration>,
}

impl Run<'_> {
    /// Drive every key through the pipeline; returns how many failed. Takes
    /// the actions by value so the session is unshared when this returns.
    async fn execute(
        &self,
        session: &WebDriverSession,
        mut actions: SafeActions<WebDriverSession, SuiteConfig>,
    ) -> Result<usize> {
        session.goto(self.base_url).await?;

        let mut lines = vec![format!("browser={} base_url={}", self.browser, self.base_url)];
        let mut failures = 0usize;
        for key in self.keys {
            let outcome = if self.click {
                actions.click(key).await
            } else {
                actions.resolver_mut().find(key, self.timeout).await.map(|_| ())
            };
            let line = match outcome {
                Ok(()) => {
                    let selector = actions.resolver().first_selector(key)?;
                    format!("{key}\tok\t{selector}")
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(%key, error = %e, "resolution failed");
                    format!("{key}\tfailed\t{e}")
                }
            };
            println!("{line}");
            lines.push(line);
        }

        let cookies = session.cookies().await?;
        lines.push(format!("cookies={}", cookies.len()));
        let store = actions.resolver().coordinator().artifacts();
        let run_log = store.write_run_log(&lines.join("\n"), &ArtifactStore::timestamp())?;
        println!("run log: {}", run_log.display());
        Ok(failures)
    }
}

pub fn print_overrides(root: &Path) -> Result<()> {
    let overrides = AuditLog::open(root)?.read_overrides()?;
    if overrides.is_empty() {
        println!("no overrides in {}", root.display());
        return Ok(());
    }
    for (key, selector) in overrides.iter() {
        println!("{key}\t{selector}");
    }
    Ok(())
}

pub fn print_audit(root: &Path, tail: usize) -> Result<()> {
    let records = AuditLog::open(root)?.records()?;
    let skip = records.len().saturating_sub(tail);
    for record in records.iter().skip(skip) {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
