use anyhow::{anyhow, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// A Chrome session with one tab, reused for a whole crawl or execution
/// batch. Dropping the session closes the browser.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(headless: bool) -> Result<Self> {
        let options = LaunchOptions {
            headless,
            sandbox: false,
            window_size: Some((1440, 900)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };

        eprintln!("[Session] Starting Chrome (headless: {headless})...");
        let browser = Browser::new(options).map_err(|e| {
            eprintln!("[Session] Browser launch failed: {e}");
            anyhow!("Browser launch failed: {e}")
        })?;

        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        eprintln!("[Session] Chrome ready.");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}
