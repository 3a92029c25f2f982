use crate::browser::{
    behavioral::BehavioralEngine,
    cdp::{CdpCommand, GetLogCommand, PerfLogEntry},
    fingerprint::UserAgentManager,
    stealth::{build_stealth_arguments, StealthProfile, StealthScripts},
};
use anyhow::{Context, Result};
use fantoccini::{elements::Element, Client, ClientBuilder, Locator};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;
use webdriver::capabilities::Capabilities;

/// Thin wrapper around a `fantoccini` WebDriver client with stealth,
/// behavioral, and network-instrumentation helpers.
///
/// Sessions are opened with `goog:loggingPrefs: {performance: ALL}` so
/// chromedriver buffers DevTools network events; [`SiftDriver::performance_log`]
/// drains that buffer and [`SiftDriver::execute_cdp`] reaches anything the
/// log alone cannot, such as raw response bodies.
pub struct SiftDriver {
    pub client: Client,
    pub behavioral_engine: BehavioralEngine,
    pub user_agent_manager: UserAgentManager,
    pub stealth_profile: StealthProfile,
}

impl SiftDriver {
    /// Open a fresh browser session against a running chromedriver.
    pub async fn new(
        webdriver_url: &str,
        headless: bool,
        stealth_profile: StealthProfile,
    ) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        let mut user_agent_manager = UserAgentManager::new();
        let user_agent_profile = user_agent_manager
            .get_session_profile(&stealth_profile)
            .clone();

        let mut args = build_stealth_arguments(&stealth_profile, &user_agent_profile);
        if headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        chrome_opts.insert("args".to_string(), json!(args));
        chrome_opts.insert("excludeSwitches".to_string(), json!(["enable-automation"]));
        chrome_opts.insert("useAutomationExtension".to_string(), json!(false));

        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));
        // Without this the performance log type does not exist and /se/log
        // returns an unknown-type error.
        caps.insert(
            "goog:loggingPrefs".to_string(),
            json!({ "performance": "ALL" }),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .with_context(|| format!("connecting to webdriver at {webdriver_url}"))?;

        // Pin the UA at the network layer too; the command-line flag alone
        // does not cover workers.
        client
            .issue_cmd(CdpCommand::new(
                "Network.setUserAgentOverride",
                json!({
                    "userAgent": user_agent_profile.user_agent,
                    "acceptLanguage": user_agent_profile.accept_language,
                }),
            ))
            .await?;

        Ok(Self {
            client,
            behavioral_engine: BehavioralEngine::new(),
            user_agent_manager,
            stealth_profile,
        })
    }

    /// Navigate to `url` with stealth/fingerprint scripts applied afterwards.
    pub async fn goto(&mut self, url: &str) -> Result<()> {
        self.behavioral_engine.random_delay(300, 1200).await;
        self.client.goto(url).await.map_err(anyhow::Error::from)?;
        self.apply_stealth_and_fingerprint().await?;
        Ok(())
    }

    async fn apply_stealth_and_fingerprint(&mut self) -> Result<()> {
        let profile = self
            .user_agent_manager
            .get_session_profile(&self.stealth_profile)
            .clone();

        self.client
            .execute(StealthScripts::get_core_evasions(), vec![])
            .await?;
        self.client
            .execute(&StealthScripts::language_evasion(&profile.languages), vec![])
            .await?;

        match self.stealth_profile {
            StealthProfile::Lightweight => {
                // No additional scripts for the lightest profile
            }
            StealthProfile::Balanced => {
                self.client
                    .execute(StealthScripts::get_canvas_evasions(), vec![])
                    .await?;
            }
            StealthProfile::Maximum => {
                self.client
                    .execute(StealthScripts::get_canvas_evasions(), vec![])
                    .await?;
                self.client
                    .execute(StealthScripts::get_webgl_evasions(), vec![])
                    .await?;
                self.client
                    .execute(
                        &format!(
                            "Object.defineProperty(navigator, 'platform', {{ get: () => '{}' }});",
                            profile.platform
                        ),
                        vec![],
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Return the current page URL.
    pub async fn current_url(&self) -> Result<Url> {
        self.client.current_url().await.map_err(anyhow::Error::from)
    }

    /// Return the full page HTML source.
    pub async fn page_source(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::from)
    }

    /// Return the page title.
    pub async fn title(&self) -> Result<String> {
        self.client.title().await.map_err(anyhow::Error::from)
    }

    /// Capture a PNG screenshot of the viewport.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.client.screenshot().await.map_err(anyhow::Error::from)
    }

    /// True when a cookie with `name` exists in the session jar.
    pub async fn has_cookie(&self, name: &str) -> Result<bool> {
        let cookies = self.client.get_all_cookies().await?;
        Ok(cookies.iter().any(|c| c.name() == name))
    }

    /// Wait up to `timeout` for an element matching the CSS selector.
    pub async fn wait_for_css(&self, selector: &str, timeout: Duration) -> Result<SiftElement> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await?;
        Ok(SiftElement::new(element, &self.behavioral_engine))
    }

    /// Find one element by CSS selector; absence is not an error.
    pub async fn find_css(&self, selector: &str) -> Result<Option<SiftElement>> {
        match self.client.find(Locator::Css(selector)).await {
            Ok(element) => Ok(Some(SiftElement::new(element, &self.behavioral_engine))),
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Drain the buffered DevTools performance log.
    ///
    /// Entries that fail to deserialize individually are dropped; a page can
    /// emit thousands of events and one bad record must not sink the scan.
    pub async fn performance_log(&self) -> Result<Vec<PerfLogEntry>> {
        let raw = self.client.issue_cmd(GetLogCommand::performance()).await?;
        let entries = raw
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    /// Relay one DevTools command and return its raw result.
    pub async fn execute_cdp(
        &self,
        cmd: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.client
            .issue_cmd(CdpCommand::new(cmd, params))
            .await
            .map_err(anyhow::Error::from)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[derive(Clone)]
/// Wrapper for DOM elements that provides typed helpers consistent with
/// [`SiftDriver`].
pub struct SiftElement {
    element: Element,
    behavioral_engine: BehavioralEngine,
}

impl SiftElement {
    pub fn new(element: Element, behavioral: &BehavioralEngine) -> Self {
        Self {
            element,
            behavioral_engine: behavioral.clone(),
        }
    }

    /// Type into the element using human‑like timings.
    pub async fn type_str(&self, text: &str) -> Result<()> {
        self.behavioral_engine
            .type_text_human_like(&self.element, text)
            .await
    }

    /// Clear and re-type the field with human-like timings.
    pub async fn refill(&self, text: &str) -> Result<()> {
        self.behavioral_engine
            .refill_field(&self.element, text)
            .await
    }

    /// Click with a small pre-click hesitation.
    pub async fn click(&self) -> Result<()> {
        self.behavioral_engine
            .click_like_human(&self.element)
            .await
    }

    /// Read an attribute value.
    pub async fn attr(&self, attribute: &str) -> Result<Option<String>> {
        self.element
            .attr(attribute)
            .await
            .map_err(anyhow::Error::from)
    }

    /// Return the element's visible text.
    pub async fn text(&self) -> Result<String> {
        self.element.text().await.map_err(anyhow::Error::from)
    }
}
