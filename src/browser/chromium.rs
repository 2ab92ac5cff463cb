//! Chrome driver over the DevTools protocol.
//!
//! Launches a local Chrome/Chromium (or attaches to a remote one), hands
//! out pages that each live in their own incognito browser context, and
//! evaluates `:has-text()` selectors by tagging matches in the page and
//! querying the tags. Navigation waits for the `networkIdle` lifecycle
//! event and falls back to the document ready state.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::handler::{Handler, HandlerConfig};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{ElementHandle, PageFactory, PageHandle, Selector, SelectorKind, bounded};
use crate::error::{AppError, Result};
use crate::models::BrowserSettings;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Executable names looked up on `PATH`.
const CHROME_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Lifecycle event fired once the page has had no network activity for 500ms.
const NETWORK_IDLE: &str = "networkIdle";

/// Attribute used to tag `:has-text()` matches.
const MARK_ATTR: &str = "data-crawler-mark";

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete') {
            resolve(document.readyState);
        } else {
            window.addEventListener('load', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

const CLEAR_VALUE_FN: &str = r#"function() {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

/// A running browser shared by every page of one crawl run.
pub struct ChromiumSession {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
    settings: BrowserSettings,
}

impl ChromiumSession {
    /// Launch a browser, or connect to `settings.remote_url` when set.
    ///
    /// Failure here is fatal for the run.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let (browser, mut handler) = match settings.remote_url.as_deref() {
            Some(remote_url) => Self::connect_remote(remote_url, settings).await?,
            None => {
                let config = Self::launch_config(settings)?;
                log::info!("Launching browser (headless={})", settings.headless);
                Browser::launch(config)
                    .await
                    .map_err(|e| AppError::browser(format!("Failed to launch browser: {e}")))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
            settings: settings.clone(),
        })
    }

    fn launch_config(settings: &BrowserSettings) -> Result<BrowserConfig> {
        let chrome_path = match &settings.chrome_executable {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(settings.navigation_timeout());

        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg(format!("--lang={}", settings.locale))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| AppError::browser(format!("Failed to build browser config: {e}")))
    }

    /// Attach to a browser started elsewhere with `--remote-debugging-port`.
    async fn connect_remote(
        url: &str,
        settings: &BrowserSettings,
    ) -> Result<(Browser, Handler)> {
        log::info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(settings.navigation_timeout())
            .build()?;
        let version: serde_json::Value = client.get(&version_url).send().await?.json().await?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::browser("No webSocketDebuggerUrl in /json/version"))?;

        let handler_config = HandlerConfig {
            request_timeout: settings.navigation_timeout(),
            ..Default::default()
        };

        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| AppError::browser(format!("Failed to connect to remote browser: {e}")))
    }
}

#[async_trait]
impl PageFactory for ChromiumSession {
    type Page = ChromiumPage;

    async fn open_page(&self) -> Result<ChromiumPage> {
        let page = {
            let mut browser = self.browser.lock().await;
            let context_id = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await?;
            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id)
                .build()
                .map_err(AppError::browser)?;
            browser.new_page(target).await?
        };

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(self.settings.user_agent.clone())
            .accept_language(self.settings.locale.clone())
            .build()
            .map_err(AppError::browser)?;
        page.execute(user_agent).await?;
        page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;

        Ok(ChromiumPage {
            page,
            navigation_timeout: self.settings.navigation_timeout(),
            marks: AtomicU64::new(0),
        })
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handler.abort();
        closed.map(|_| ()).map_err(AppError::from)
    }
}

/// One tab of a `ChromiumSession`.
pub struct ChromiumPage {
    page: Page,
    navigation_timeout: Duration,
    marks: AtomicU64,
}

impl ChromiumPage {
    async fn wait_for_ready(&self) {
        match bounded(self.navigation_timeout, "page ready", async {
            self.page
                .evaluate(WAIT_FOR_READY_SCRIPT)
                .await
                .map_err(AppError::from)
        })
        .await
        {
            Ok(result) => {
                let state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
                log::debug!("Page ready state: {}", state);
            }
            Err(e) => log::warn!("Could not confirm page ready state: {}", e),
        }
    }

    /// Tag elements matched by a `:has-text()` selector and return the tag query.
    async fn mark_has_text(
        &self,
        anchor: &str,
        needle: &str,
        sibling: Option<&str>,
    ) -> Result<String> {
        let mark = self.marks.fetch_add(1, Ordering::Relaxed).to_string();
        let script = format!(
            r#"(() => {{
                const needle = {needle};
                const sibling = {sibling};
                const mark = {mark};
                let count = 0;
                document.querySelectorAll({anchor}).forEach((el) => {{
                    if (!(el.innerText || '').includes(needle)) return;
                    let target = el;
                    if (sibling !== null) {{
                        target = el.nextElementSibling;
                        if (!target || !target.matches(sibling)) return;
                    }}
                    target.setAttribute({attr}, mark);
                    count += 1;
                }});
                return count;
            }})()"#,
            needle = serde_json::to_string(needle)?,
            sibling = serde_json::to_string(&sibling)?,
            mark = serde_json::to_string(&mark)?,
            anchor = serde_json::to_string(anchor)?,
            attr = serde_json::to_string(MARK_ATTR)?,
        );

        self.page.evaluate(script).await?;
        Ok(format!("[{MARK_ATTR}=\"{mark}\"]"))
    }

    async fn first(&self, selector: &Selector) -> Result<Element> {
        self.query_all(selector)
            .await?
            .into_iter()
            .next()
            .map(|el| el.element)
            .ok_or_else(|| AppError::query(selector.as_str(), "no element matches"))
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    type Element = ChromiumElement;

    async fn goto(&self, url: &str) -> Result<()> {
        log::debug!("Navigating to {}", url);
        let events = self.page.event_listener::<EventLifecycleEvent>().await?;
        bounded(self.navigation_timeout, format!("navigation to {url}"), async {
            self.page
                .goto(url)
                .await
                .map(|_| ())
                .map_err(|e| AppError::navigation(url, e))
        })
        .await?;

        let names = events.map(|event| event.name.clone());
        if !reached_lifecycle(names, NETWORK_IDLE, self.navigation_timeout).await {
            log::debug!("No network idle signal from {}, checking ready state", url);
            self.wait_for_ready().await;
        }
        Ok(())
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<ChromiumElement>> {
        let css = match selector.kind() {
            SelectorKind::Css(css) => css.clone(),
            SelectorKind::HasText {
                anchor,
                needle,
                sibling,
            } => self
                .mark_has_text(anchor, needle, sibling.as_deref())
                .await
                .map_err(|e| AppError::query(selector.as_str(), e))?,
        };

        let elements = self
            .page
            .find_elements(css)
            .await
            .map_err(|e| AppError::query(selector.as_str(), e))?;
        Ok(elements
            .into_iter()
            .map(|element| ChromiumElement { element })
            .collect())
    }

    async fn fill(&self, selector: &Selector, text: &str) -> Result<()> {
        let element = self.first(selector).await?;
        element.focus().await?;
        element.call_js_fn(CLEAR_VALUE_FN, false).await?;
        if !text.is_empty() {
            element.type_str(text).await?;
        }
        Ok(())
    }

    async fn press(&self, selector: &Selector, key: &str) -> Result<()> {
        let element = self.first(selector).await?;
        element.press_key(key).await?;
        Ok(())
    }
}

/// An element of a `ChromiumPage`.
pub struct ChromiumElement {
    element: Element,
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn inner_text(&self) -> Result<String> {
        Ok(self.element.inner_text().await?.unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.element.attribute(name).await?)
    }

    async fn query_all(&self, css: &str) -> Result<Vec<ChromiumElement>> {
        let elements = self
            .element
            .find_elements(css)
            .await
            .map_err(|e| AppError::query(css, e))?;
        Ok(elements
            .into_iter()
            .map(|element| ChromiumElement { element })
            .collect())
    }
}

/// Wait until `events` yields `name`. `false` when the stream ends or
/// `limit` runs out first.
async fn reached_lifecycle<S>(mut events: S, name: &str, limit: Duration) -> bool
where
    S: Stream<Item = String> + Unpin,
{
    let wait = async {
        while let Some(event) = events.next().await {
            if event == name {
                return true;
            }
        }
        false
    };
    tokio::time::timeout(limit, wait).await.unwrap_or(false)
}

/// Find a Chrome executable on this machine.
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            log::info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    if let Some(path) = find_on_path(CHROME_NAMES, std::env::var_os("PATH")) {
        log::info!("Found Chrome in PATH: {}", path.display());
        return Ok(path);
    }

    Err(AppError::browser(
        "Chrome/Chromium not found. Install it or set browser.chrome_executable",
    ))
}

/// First of `names` that is an executable file on `search_path`.
fn find_on_path(names: &[&str], search_path: Option<OsString>) -> Option<PathBuf> {
    let search_path = search_path?;
    let cwd = std::env::current_dir().ok()?;
    names
        .iter()
        .find_map(|name| which::which_in(name, Some(&search_path), &cwd).ok())
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use tempfile::TempDir;

    use super::*;

    fn names(list: &[&str]) -> impl Stream<Item = String> + Unpin {
        stream::iter(list.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_network_idle_is_detected() {
        let events = names(&["init", "DOMContentLoaded", "load", "networkIdle"]);
        assert!(reached_lifecycle(events, NETWORK_IDLE, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_closed_stream_without_idle() {
        let events = names(&["init", "load", "networkAlmostIdle"]);
        assert!(!reached_lifecycle(events, NETWORK_IDLE, Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_page_times_out() {
        let started = tokio::time::Instant::now();
        let events = stream::pending::<String>();
        assert!(!reached_lifecycle(events, NETWORK_IDLE, Duration::from_secs(30)).await);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_lookup_skips_non_executable() {
        use std::os::unix::fs::PermissionsExt;

        let shadow = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        std::fs::write(shadow.path().join("chromium"), "not a binary").unwrap();
        let real = install.path().join("chromium");
        std::fs::write(&real, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&real, std::fs::Permissions::from_mode(0o755)).unwrap();

        let search_path = std::env::join_paths([shadow.path(), install.path()]).unwrap();
        let found = find_on_path(&["chromium"], Some(search_path.clone())).unwrap();
        assert!(found.starts_with(install.path()));

        assert!(find_on_path(&["no-such-browser"], Some(search_path)).is_none());
        assert!(find_on_path(CHROME_NAMES, None).is_none());
    }
}
