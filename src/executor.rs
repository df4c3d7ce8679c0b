//! Executes generated test cases in a real Chrome session. Each automation
//! step is parsed by an ordered rule table into a tagged action, then applied
//! to the live tab. Recognized failures (element not found, timeout,
//! assertion mismatch) fail the test case; anything else is an unexpected
//! error. Either way the batch keeps going and every test case yields a
//! structured result.

use anyhow::{anyhow, Error as AnyError};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Element, Tab};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::session::BrowserSession;
use crate::types::{ExecutionResult, ExecutionSummary, Status, TestCase};

/// Per-strategy wait while locating an element.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(8);

/// Pause before a failure screenshot so the rendered state settles.
const SCREENSHOT_SETTLE: Duration = Duration::from_millis(400);

/// A failure raised while running one step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    ElementNotFound(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("{0}")]
    AssertionFailed(String),
    #[error(transparent)]
    Unexpected(#[from] AnyError),
}

impl StepError {
    /// Recognized failures fail the test case; unexpected ones error it.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, StepError::Unexpected(_))
    }
}

/// What a step's text asks the browser to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Skip,
    Navigate { url: String },
    Fill { locator: String, value: String },
    Click { label: Option<String> },
    AssertUrl { expected: String },
    AssertText { expected: String },
    SelectOption { option: String },
    ToggleCheckbox,
}

/// Outcome tag recorded per executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped,
    Navigated,
    Filled,
    Clicked,
    Asserted,
    Selected,
    Checked,
}

// The regex crate has no backreferences, so quote pairs are spelled out as
// alternations. The inner classes exclude both quote kinds, which makes the
// first cleanly-quoted span win even when stray quote characters precede it.
static SEND_KEYS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:name|id|name/id)[^'"]*(?:'([^'"]+)'|"([^'"]+)").*?(?:send_keys|enter|type|keys)\s*[(\s]*['"]?(?:'([^'"]*)'|"([^'"]*)")"#,
    )
    .unwrap()
});

static ENTER_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)enter\s+(?:'([^']+)'|"([^"]+)"|([^'"]+?))\s+in\s+(?:the\s+)?['"]?(\w[\w-]*)['"]?\s*field"#)
        .unwrap()
});

static ASSERT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:assert|verify|check|confirm)\b").unwrap());

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^'"]+)'|"([^'"]+)""#).unwrap());

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s"']+"#).unwrap());

/// First cleanly-quoted span in a step, trimmed.
pub fn extract_quoted(s: &str) -> Option<String> {
    QUOTED_RE.captures(s).and_then(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// First literal http(s) URL in a step, with trailing punctuation stripped.
pub fn extract_url(s: &str) -> Option<String> {
    URL_RE
        .find(s)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}

/// Parse one automation step into an action. Rules are tried in a fixed
/// order and the first match wins; text matching no rule is a descriptive
/// no-op, never a failure.
pub fn parse_step(step: &str) -> StepAction {
    let s = step.trim();
    if s.is_empty() || s.starts_with('#') {
        return StepAction::Skip;
    }
    let sl = s.to_lowercase();

    if ["navigate to", "open browser", "go to"].iter().any(|k| sl.contains(k)) {
        return match extract_url(s).or_else(|| extract_quoted(s)) {
            Some(url) => StepAction::Navigate { url },
            None => StepAction::Skip,
        };
    }

    if let Some(c) = SEND_KEYS_RE.captures(s) {
        let locator = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string());
        let value = c.get(3).or_else(|| c.get(4)).map(|m| m.as_str().to_string());
        if let (Some(locator), Some(value)) = (locator, value) {
            return StepAction::Fill { locator, value };
        }
    }

    if let Some(c) = ENTER_FIELD_RE.captures(s) {
        let value = c
            .get(1)
            .or_else(|| c.get(2))
            .or_else(|| c.get(3))
            .map(|m| m.as_str().trim().to_string());
        if let (Some(value), Some(locator)) = (value, c.get(4)) {
            return StepAction::Fill {
                locator: locator.as_str().to_string(),
                value,
            };
        }
    }

    if ["click()", "click the", "click button", "and click"].iter().any(|k| sl.contains(k)) {
        return StepAction::Click {
            label: extract_quoted(s),
        };
    }

    if ASSERT_RE.is_match(&sl) && sl.contains("url") {
        return match extract_quoted(s).or_else(|| extract_url(s)) {
            Some(expected) => StepAction::AssertUrl { expected },
            None => StepAction::Skip,
        };
    }

    if ASSERT_RE.is_match(&sl) {
        return match extract_quoted(s) {
            Some(expected) => StepAction::AssertText { expected },
            None => StepAction::Skip,
        };
    }

    if sl.contains("select") && ["option", "dropdown", "from"].iter().any(|k| sl.contains(k)) {
        return match extract_quoted(s) {
            Some(option) => StepAction::SelectOption { option },
            None => StepAction::Skip,
        };
    }

    if sl.contains("checkbox") || sl.contains("check the") {
        return StepAction::ToggleCheckbox;
    }

    StepAction::Skip
}

/// Parse and apply one step against the live tab.
pub fn run_step(tab: &Tab, step: &str) -> Result<StepOutcome, StepError> {
    match parse_step(step) {
        StepAction::Skip => Ok(StepOutcome::Skipped),
        StepAction::Navigate { url } => {
            tab.navigate_to(&url).map_err(StepError::Unexpected)?;
            tab.wait_until_navigated().map_err(StepError::Unexpected)?;
            Ok(StepOutcome::Navigated)
        }
        StepAction::Fill { locator, value } => {
            fill_input(tab, &locator, &value)?;
            Ok(StepOutcome::Filled)
        }
        StepAction::Click { label } => {
            click_button(tab, label.as_deref())?;
            Ok(StepOutcome::Clicked)
        }
        StepAction::AssertUrl { expected } => {
            let current = tab.get_url();
            if !current.contains(&expected) {
                return Err(StepError::AssertionFailed(format!(
                    "URL mismatch: '{expected}' not in '{current}'"
                )));
            }
            Ok(StepOutcome::Asserted)
        }
        StepAction::AssertText { expected } => {
            let markup = tab.get_content().map_err(StepError::Unexpected)?;
            if !markup.to_lowercase().contains(&expected.to_lowercase()) {
                return Err(StepError::AssertionFailed(format!(
                    "Text '{expected}' not found in page"
                )));
            }
            Ok(StepOutcome::Asserted)
        }
        StepAction::SelectOption { option } => select_option(tab, &option),
        StepAction::ToggleCheckbox => toggle_checkbox(tab),
    }
}

/// Locate an input by name, then id, then placeholder substring, each bounded
/// by the wait timeout. Returns the selector that matched.
fn find_input_selector(tab: &Tab, locator: &str) -> Result<String, StepError> {
    let esc = locator.replace('\'', "\\'");
    let candidates = [
        format!("[name='{esc}']"),
        format!("[id='{esc}']"),
        format!("input[placeholder*='{esc}' i]"),
    ];
    for selector in candidates {
        if tab
            .wait_for_element_with_custom_timeout(&selector, WAIT_TIMEOUT)
            .is_ok()
        {
            return Ok(selector);
        }
    }
    Err(StepError::ElementNotFound(format!(
        "Input '{locator}' not found by name, id, or placeholder"
    )))
}

fn fill_input(tab: &Tab, locator: &str, value: &str) -> Result<(), StepError> {
    let selector = find_input_selector(tab, locator)?;
    let el = tab.find_element(&selector).map_err(StepError::Unexpected)?;
    el.click().map_err(StepError::Unexpected)?;
    let js_sel = selector.replace('\\', "\\\\").replace('"', "\\\"");
    tab.evaluate(
        &format!("document.querySelector(\"{js_sel}\").value = ''"),
        false,
    )
    .map_err(StepError::Unexpected)?;
    if !value.is_empty() {
        tab.type_str(value).map_err(StepError::Unexpected)?;
    }
    Ok(())
}

fn wait_for_xpath<'a>(tab: &'a Tab, xpath: &str, timeout: Duration) -> Option<Element<'a>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(el) = tab.find_element_by_xpath(xpath) {
            return Some(el);
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
}

fn click_button(tab: &Tab, label: Option<&str>) -> Result<(), StepError> {
    if let Some(label) = label {
        let xpath = format!(
            "//button[normalize-space()='{label}']|//input[@value='{label}']|//a[normalize-space()='{label}']"
        );
        if let Some(el) = wait_for_xpath(tab, &xpath, WAIT_TIMEOUT) {
            el.click().map_err(StepError::Unexpected)?;
            std::thread::sleep(Duration::from_millis(1000));
            return Ok(());
        }
    }
    // Fall back to any submit-typed control.
    match tab.wait_for_element_with_custom_timeout(
        "button[type='submit'],input[type='submit']",
        WAIT_TIMEOUT,
    ) {
        Ok(el) => {
            el.click().map_err(StepError::Unexpected)?;
            std::thread::sleep(Duration::from_millis(1000));
            Ok(())
        }
        Err(_) => Err(StepError::ElementNotFound(format!(
            "Button '{}' not found via text or submit selector",
            label.unwrap_or("Submit")
        ))),
    }
}

fn select_option(tab: &Tab, option: &str) -> Result<StepOutcome, StepError> {
    let esc = option.replace('\\', "\\\\").replace('\'', "\\'");
    let js = format!(
        r#"(() => {{
  const sel = document.querySelector('select');
  if (!sel) return 'no-select';
  for (let i = 0; i < sel.options.length; i++) {{
    if (sel.options[i].text.trim() === '{esc}') {{
      sel.selectedIndex = i;
      sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
      return 'ok';
    }}
  }}
  return 'no-option';
}})()"#
    );
    let result = tab.evaluate(&js, false).map_err(StepError::Unexpected)?;
    match result.value.as_ref().and_then(|v| v.as_str()) {
        Some("ok") => Ok(StepOutcome::Selected),
        Some("no-select") => Ok(StepOutcome::Skipped),
        _ => Err(StepError::ElementNotFound(format!(
            "Option '{option}' not found in dropdown"
        ))),
    }
}

fn toggle_checkbox(tab: &Tab) -> Result<StepOutcome, StepError> {
    let js = r#"(() => {
  const cb = document.querySelector("input[type='checkbox']");
  if (!cb) return 'no-checkbox';
  if (!cb.checked) cb.click();
  return 'ok';
})()"#;
    let result = tab.evaluate(js, false).map_err(StepError::Unexpected)?;
    match result.value.as_ref().and_then(|v| v.as_str()) {
        Some("ok") => Ok(StepOutcome::Checked),
        _ => Ok(StepOutcome::Skipped),
    }
}

/// Progress events streamed to the web UI while a batch runs.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    CaseStarted {
        tc_id: String,
        condition: String,
    },
    CaseFinished {
        tc_id: String,
        status: Status,
        duration_seconds: f64,
    },
    BatchFinished {
        summary: ExecutionSummary,
    },
}

/// Runs a batch of test cases against one shared browser session.
pub struct TestExecutor {
    screenshots_dir: PathBuf,
    headless: bool,
    events: Option<broadcast::Sender<ExecEvent>>,
    shot_counter: u32,
}

impl TestExecutor {
    pub fn new(screenshots_dir: PathBuf, headless: bool) -> Self {
        Self {
            screenshots_dir,
            headless,
            events: None,
            shot_counter: 0,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<ExecEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: ExecEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Execute all test cases sequentially against one shared browser.
    /// One result per input test case, in order; a case's failure never
    /// aborts the batch. Blocking; run under `spawn_blocking` from async.
    pub fn execute_all(&mut self, test_cases: &[TestCase]) -> anyhow::Result<Vec<ExecutionResult>> {
        std::fs::create_dir_all(&self.screenshots_dir)?;
        self.shot_counter = 0;

        let session = BrowserSession::launch(self.headless)?;
        let mut results = Vec::with_capacity(test_cases.len());
        for tc in test_cases {
            eprintln!("[Executor] Running {} ({})", tc.tc_id, tc.condition);
            self.emit(ExecEvent::CaseStarted {
                tc_id: tc.tc_id.clone(),
                condition: tc.condition.clone(),
            });
            let result = self.execute_one(tc, &session.tab);
            eprintln!(
                "[Executor] {} {} in {:.2}s",
                tc.tc_id, result.status, result.duration_seconds
            );
            self.emit(ExecEvent::CaseFinished {
                tc_id: tc.tc_id.clone(),
                status: result.status,
                duration_seconds: result.duration_seconds,
            });
            results.push(result);
        }
        self.emit(ExecEvent::BatchFinished {
            summary: ExecutionSummary::from_results(&results),
        });
        Ok(results)
    }

    fn execute_one(&mut self, tc: &TestCase, tab: &Tab) -> ExecutionResult {
        let start = Instant::now();
        let mut log_lines: Vec<String> = Vec::new();

        // Anchor the case on its page before interpreting steps; a failed
        // initial navigation is an unexpected error, not a step failure.
        if let Err(e) = navigate_to_start(tab, &tc.page_url) {
            log_lines.push(format!("💥 Unexpected error: {e:#}"));
            let shot = self.capture_failure(tab, &tc.tc_id);
            return self.build_result(tc, Status::Error, start, Some(format!("{e:#}")), shot, log_lines);
        }
        log_lines.push(format!("✔ Navigated to {}", tc.page_url));

        match run_steps(&tc.automation_steps, &mut log_lines, |step| run_step(tab, step)) {
            Some(err) => {
                let status = if err.is_recognized() { Status::Fail } else { Status::Error };
                let shot = self.capture_failure(tab, &tc.tc_id);
                self.build_result(tc, status, start, Some(err.to_string()), shot, log_lines)
            }
            None => {
                log_lines.push("✅ All steps passed.".to_string());
                self.build_result(tc, Status::Pass, start, None, None, log_lines)
            }
        }
    }

    fn build_result(
        &self,
        tc: &TestCase,
        status: Status,
        start: Instant,
        error_message: Option<String>,
        screenshot_path: Option<String>,
        log_lines: Vec<String>,
    ) -> ExecutionResult {
        ExecutionResult {
            tc_id: tc.tc_id.clone(),
            feature: tc.feature.clone(),
            user_role: tc.user_role.clone(),
            condition: tc.condition.clone(),
            page_url: tc.page_url.clone(),
            status,
            duration_seconds: round2(start.elapsed().as_secs_f64()),
            error_message,
            screenshot_path,
            log: log_lines.join("\n"),
        }
    }

    /// Best-effort failure screenshot; capture problems are swallowed and
    /// recorded as an absent artifact.
    fn capture_failure(&mut self, tab: &Tab, tc_id: &str) -> Option<String> {
        self.shot_counter += 1;
        std::thread::sleep(SCREENSHOT_SETTLE);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let fname = screenshot_filename(self.shot_counter, tc_id, millis);
        let bytes = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .ok()?;
        std::fs::write(self.screenshots_dir.join(&fname), bytes).ok()?;
        Some(format!("screenshots/{fname}"))
    }
}

/// Run steps in order, appending one log line per executed step. Stops at
/// the first failure and returns it; later steps never run.
fn run_steps<F>(steps: &[String], log_lines: &mut Vec<String>, mut run: F) -> Option<StepError>
where
    F: FnMut(&str) -> Result<StepOutcome, StepError>,
{
    for (i, step) in steps.iter().enumerate() {
        let n = i + 1;
        match run(step) {
            Ok(_) => log_lines.push(format!("✔ Step {n}: {}", truncate(step, 90))),
            Err(err) => {
                log_lines.push(format!("✘ Step {n} FAILED: {}", truncate(step, 90)));
                log_lines.push(format!("   Reason: {err}"));
                return Some(err);
            }
        }
    }
    None
}

/// `{index:03}_{sanitized id}_{epoch millis}_failure.png`. The counter keeps
/// names unique within a batch even for colliding ids, the timestamp across
/// batches.
pub fn screenshot_filename(index: u32, tc_id: &str, epoch_millis: u128) -> String {
    let safe_id: String = tc_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{index:03}_{safe_id}_{epoch_millis}_failure.png")
}

fn navigate_to_start(tab: &Tab, url: &str) -> anyhow::Result<()> {
    if url.is_empty() {
        return Err(anyhow!("test case has no page URL"));
    }
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
