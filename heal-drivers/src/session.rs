use crate::driver::{BrowserCookie, BrowserDriver, DriverError};
use ::webdriver::capabilities::Capabilities;
use anyhow::anyhow;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use heal_common::SelectorKind;
use heal_config::EnvironmentConfig;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use url::Url;

const CHROMEDRIVER_URL: &str = "http://localhost:9515";
const GECKODRIVER_URL: &str = "http://localhost:4444";
const WEBDRIVER_URL_ENV: &str = "HEAL_WEBDRIVER_URL";
const WINDOW_SIZE: &str = "--window-size=1440,1200";

/// A live `fantoccini` WebDriver session.
pub struct WebDriverSession {
    client: Client,
    browser: String,
}

impl WebDriverSession {
    /// Connect to a running chromedriver/geckodriver and configure timeouts.
    ///
    /// The page-load timeout follows the suite's default timeout and the
    /// implicit wait is zero; all waiting is done by the resolver's poll loop.
    pub async fn start(browser: &str, env: &EnvironmentConfig) -> Result<Self, DriverError> {
        let browser = browser.trim().to_lowercase();
        let endpoint = resolve_endpoint(&browser, env.webdriver_url.as_deref())?;
        let caps = capabilities(&browser, env.headless)?;

        tracing::info!(%browser, %endpoint, headless = env.headless, "starting webdriver session");
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(endpoint.as_str())
            .await
            .map_err(|e| DriverError::Session(anyhow!("webdriver connect failed: {e}")))?;

        let page_load = Duration::from_secs(env.default_timeout_seconds);
        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(page_load),
                Some(Duration::ZERO),
            ))
            .await
            .map_err(|e| classify(e, None))?;

        Ok(Self { client, browser })
    }

    pub fn browser(&self) -> &str {
        &self.browser
    }

    pub async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.client.goto(url).await.map_err(|e| classify(e, None))
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<(), DriverError> {
        self.client.close().await.map_err(|e| classify(e, None))
    }
}

fn resolve_endpoint(browser: &str, configured: Option<&str>) -> Result<Url, DriverError> {
    let raw = configured
        .map(str::to_string)
        .or_else(|| std::env::var(WEBDRIVER_URL_ENV).ok())
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| match browser {
            "firefox" => GECKODRIVER_URL.to_string(),
            _ => CHROMEDRIVER_URL.to_string(),
        });
    Url::parse(raw.trim()).map_err(|e| DriverError::Session(anyhow!("invalid webdriver url {raw}: {e}")))
}

fn capabilities(browser: &str, headless: bool) -> Result<Capabilities, DriverError> {
    let mut caps = Capabilities::new();
    match browser {
        "chrome" => {
            let mut args = vec![json!(WINDOW_SIZE)];
            if headless {
                args.insert(0, json!("--headless=new"));
            }
            caps.insert("browserName".to_string(), json!("chrome"));
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
        "firefox" => {
            let args: Vec<Value> = if headless {
                vec![json!("-headless")]
            } else {
                Vec::new()
            };
            caps.insert("browserName".to_string(), json!("firefox"));
            caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
        }
        other => {
            return Err(DriverError::Session(anyhow!(
                "unsupported browser: {other}"
            )))
        }
    }
    Ok(caps)
}

/// Map a WebDriver command failure onto [`DriverError`].
fn classify(err: CmdError, selector: Option<&str>) -> DriverError {
    match err {
        CmdError::Standard(wd) => match wd.error {
            ErrorStatus::InvalidSelector => DriverError::InvalidSelector {
                selector: selector.unwrap_or_default().to_string(),
                message: wd.to_string(),
            },
            ErrorStatus::NoSuchElement => DriverError::NoSuchElement(wd.to_string()),
            ErrorStatus::StaleElementReference => DriverError::StaleElement(wd.to_string()),
            ErrorStatus::ElementClickIntercepted => DriverError::ClickIntercepted(wd.to_string()),
            ErrorStatus::ElementNotInteractable => DriverError::NotInteractable(wd.to_string()),
            ErrorStatus::JavascriptError => DriverError::Script(wd.to_string()),
            _ => DriverError::Session(anyhow!("{wd}")),
        },
        other => DriverError::Session(anyhow::Error::from(other)),
    }
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
    type Element = Element;

    async fn find_all(
        &self,
        kind: SelectorKind,
        expression: &str,
    ) -> Result<Vec<Element>, DriverError> {
        let locator = match kind {
            SelectorKind::Css => Locator::Css(expression),
            SelectorKind::Xpath => Locator::XPath(expression),
        };
        self.client
            .find_all(locator)
            .await
            .map_err(|e| classify(e, Some(expression)))
    }

    async fn execute_script(&self, script: &str) -> Result<Value, DriverError> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(|e| classify(e, None))
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.client.source().await.map_err(|e| classify(e, None))
    }

    async fn save_screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let png = self
            .client
            .screenshot()
            .await
            .map_err(|e| classify(e, None))?;
        tokio::fs::write(path, png)
            .await
            .map_err(|e| DriverError::Session(anyhow!("writing {}: {e}", path.display())))
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, DriverError> {
        let cookies = self
            .client
            .get_all_cookies()
            .await
            .map_err(|e| classify(e, None))?;
        Ok(cookies
            .iter()
            .map(|c| BrowserCookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
                domain: c.domain().map(str::to_string),
                path: c.path().map(str::to_string),
            })
            .collect())
    }

    async fn click(&self, element: &Element) -> Result<(), DriverError> {
        element.click().await.map_err(|e| classify(e, None))
    }

    async fn clear(&self, element: &Element) -> Result<(), DriverError> {
        element.clear().await.map_err(|e| classify(e, None))
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<(), DriverError> {
        element.send_keys(text).await.map_err(|e| classify(e, None))
    }
}
