//! Builds a self-contained HTML report from execution results: summary
//! cards, per-feature detail sections with inline failure screenshots, and a
//! conclusion with failure patterns and recommended next steps.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{ExecutionResult, ExecutionSummary, Status};

pub fn generate(
    results: &[ExecutionResult],
    summary: Option<&ExecutionSummary>,
    screenshots_dir: &Path,
) -> String {
    let computed;
    let summary = match summary {
        Some(s) => s,
        None => {
            computed = ExecutionSummary::from_results(results);
            &computed
        }
    };
    let rate = if summary.total == 0 {
        0
    } else {
        (summary.passed as f64 / summary.total as f64 * 100.0).round() as i64
    };
    let rate_color = if rate >= 80 {
        "#22c55e"
    } else if rate >= 50 {
        "#f59e0b"
    } else {
        "#ef4444"
    };

    let mut by_feature: BTreeMap<&str, Vec<&ExecutionResult>> = BTreeMap::new();
    for r in results {
        let feature = if r.feature.is_empty() { "General" } else { &r.feature };
        by_feature.entry(feature).or_default().push(r);
    }

    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let comment = overall_comment(rate, summary.failed, summary.errored);
    let patterns = failure_patterns(results);
    let next_steps = next_steps(results);

    let mut sections = String::new();
    for (feature, cases) in &by_feature {
        sections.push_str(&feature_section(feature, cases, screenshots_dir));
    }

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\" />\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n");
    html.push_str("<title>Test Execution Report</title>\n<style>");
    html.push_str(STYLE);
    html.push_str(&format!(".rate-value {{ color: {rate_color}; }}"));
    html.push_str("</style>\n</head>\n<body>\n");

    html.push_str(&format!(
        "<header class=\"report-header\">\n  <div class=\"report-title\">🧪 Test Execution Report</div>\n  <div class=\"report-sub\">Generated by StoryQA · {generated_at}</div>\n</header>\n"
    ));

    html.push_str("<h2 class=\"section-heading\">📊 Summary</h2>\n<div class=\"summary-grid\">\n");
    html.push_str(&summary_card(&summary.total.to_string(), "", "Total"));
    html.push_str(&summary_card(&summary.passed.to_string(), "pass-value", "Passed"));
    html.push_str(&summary_card(&summary.failed.to_string(), "fail-value", "Failed"));
    html.push_str(&summary_card(&summary.errored.to_string(), "error-value", "Errors"));
    html.push_str(&summary_card(&format!("{rate}%"), "rate-value", "Pass Rate"));
    html.push_str("</div>\n");
    html.push_str(&format!("<div class=\"comment-box\">💬 {}</div>\n", esc(&comment)));

    html.push_str("<h2 class=\"section-heading\">🔍 Detailed Results</h2>\n");
    html.push_str(&sections);

    html.push_str("<h2 class=\"section-heading\">📝 Conclusion &amp; Recommendations</h2>\n<div class=\"conclusion-box\">\n");
    html.push_str("<h3>Failure Patterns</h3>\n<ul>");
    html.push_str(&bullets(&patterns));
    html.push_str("</ul>\n<h3>Recommended Next Steps</h3>\n<ul>");
    html.push_str(&bullets(&next_steps));
    html.push_str("</ul>\n</div>\n");

    html.push_str(&format!(
        "<footer>StoryQA · Automated Test Report · {generated_at}</footer>\n</body>\n</html>\n"
    ));
    html
}

fn summary_card(value: &str, value_class: &str, label: &str) -> String {
    format!(
        "  <div class=\"summary-card\"><div class=\"value {value_class}\">{}</div><div class=\"label\">{label}</div></div>\n",
        esc(value)
    )
}

fn feature_section(feature: &str, cases: &[&ExecutionResult], screenshots_dir: &Path) -> String {
    let mut rows = String::new();
    for r in cases {
        let status_cls = match r.status {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Error => "error",
        };
        let err_block = match &r.error_message {
            Some(msg) => format!("<div class=\"error-block\"><strong>Error:</strong> {}</div>", esc(msg)),
            None => String::new(),
        };
        rows.push_str(&format!(
            "<div class=\"tc-card {status_cls}-card\">\n  <div class=\"tc-header\">\n    <span class=\"tc-id\">{}</span>\n    <span class=\"tc-condition\">{}</span>\n    <span class=\"status-badge {status_cls}\">{}</span>\n    <span class=\"duration\">{} s</span>\n  </div>\n  <div class=\"tc-meta\">\n    <span>👤 {}</span>\n    <span>🌐 <a href=\"{}\" target=\"_blank\">{}</a></span>\n  </div>\n  {err_block}\n  <div class=\"log-block\">{}</div>\n  {}\n</div>\n",
            esc(&r.tc_id),
            esc(&r.condition),
            r.status,
            r.duration_seconds,
            esc(&r.user_role),
            esc(&r.page_url),
            esc(&r.page_url),
            esc(&r.log),
            screenshot_block(r, screenshots_dir),
        ));
    }
    format!(
        "<section class=\"feature-section\">\n  <h2 class=\"feature-heading\">📂 {}</h2>\n{rows}</section>\n",
        esc(feature)
    )
}

fn screenshot_block(r: &ExecutionResult, screenshots_dir: &Path) -> String {
    let Some(rel) = &r.screenshot_path else {
        return String::new();
    };
    let file_name = Path::new(rel).file_name().map(|f| f.to_os_string()).unwrap_or_default();
    let abs = screenshots_dir.join(file_name);
    match std::fs::read(&abs) {
        Ok(bytes) => {
            let data = BASE64.encode(bytes);
            format!(
                "<div class=\"screenshot-block\"><p class=\"screenshot-label\">📸 Failure Screenshot</p><img src=\"data:image/png;base64,{data}\" alt=\"Failure screenshot\" /></div>"
            )
        }
        Err(_) => format!(
            "<p class=\"missing-shot\">⚠️ Screenshot referenced but file not found: {}</p>",
            esc(rel)
        ),
    }
}

fn overall_comment(rate: i64, failed: usize, errored: usize) -> String {
    if rate == 100 {
        return "All test cases passed. The feature appears stable and ready for review.".to_string();
    }
    if rate >= 80 {
        return format!(
            "Most tests passed ({rate}%). {} case(s) need attention before release.",
            failed + errored
        );
    }
    if rate >= 50 {
        return format!("Only {rate}% of tests passed. Several failures detected; investigate before proceeding.");
    }
    format!(
        "Critical failure rate detected ({}% failures). The feature requires immediate fixes.",
        100 - rate
    )
}

fn failure_patterns(results: &[ExecutionResult]) -> Vec<String> {
    let failures: Vec<&ExecutionResult> = results
        .iter()
        .filter(|r| matches!(r.status, Status::Fail | Status::Error))
        .collect();
    if failures.is_empty() {
        return vec!["No failures detected - all test cases passed.".to_string()];
    }

    let mut patterns = Vec::new();
    let mut features: Vec<&str> = failures.iter().map(|r| r.feature.as_str()).collect();
    features.sort_unstable();
    features.dedup();
    patterns.push(format!("Failures observed in feature(s): {}.", features.join(", ")));

    let mut url_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &failures {
        *url_counts.entry(r.page_url.as_str()).or_default() += 1;
    }
    if let Some((url, count)) = url_counts.iter().max_by_key(|(_, c)| **c) {
        if *count > 1 {
            patterns.push(format!("Most failures originate from: {url} ({count} cases)."));
        }
    }

    let messages: Vec<String> = failures
        .iter()
        .filter_map(|r| r.error_message.as_ref())
        .map(|m| m.to_lowercase())
        .collect();
    if messages.iter().any(|m| m.contains("not found")) {
        patterns.push(
            "Several steps failed because expected UI elements were not found; possible selector mismatch or page structure change.".to_string(),
        );
    }
    if messages.iter().any(|m| m.contains("url mismatch")) {
        patterns.push("URL assertion failures detected; redirect or navigation behaviour may have changed.".to_string());
    }
    if messages.iter().any(|m| m.contains("timeout") || m.contains("timed out")) {
        patterns.push("Timeout errors present; page may be slow or elements not rendering in time.".to_string());
    }
    patterns
}

fn next_steps(results: &[ExecutionResult]) -> Vec<String> {
    let failures: Vec<&ExecutionResult> = results
        .iter()
        .filter(|r| matches!(r.status, Status::Fail | Status::Error))
        .collect();
    if failures.is_empty() {
        return vec![
            "No action required - all tests pass. Consider expanding the test suite with more edge cases."
                .to_string(),
        ];
    }
    let mut steps = vec![
        "Review failure screenshots and logs to pinpoint the root cause for each failing test.".to_string(),
        "Fix identified bugs in the application and re-run the failing test cases.".to_string(),
        "Check that all form selectors (name, id) in automation_steps match the current page HTML.".to_string(),
    ];
    if failures.iter().any(|r| r.status == Status::Error) {
        steps.push(
            "Investigate 'Error' status cases - these indicate unexpected exceptions such as navigation or driver failures.".to_string(),
        );
    }
    steps.push("Once fixes are applied, regenerate combined test cases and run the full execution again.".to_string());
    steps
}

fn bullets(items: &[String]) -> String {
    items.iter().map(|i| format!("<li>{}</li>", esc(i))).collect()
}

fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

const STYLE: &str = r#"
*, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: 'Segoe UI', Arial, sans-serif; background: #0d0f1a; color: #e2e4f0; line-height: 1.6; }
a { color: #5eead4; }
.report-header { background: #12162a; padding: 2.5rem 3rem; border-bottom: 1px solid rgba(255,255,255,0.08); }
.report-title { font-size: 1.8rem; font-weight: 800; margin-bottom: .25rem; color: #a5b4fc; }
.report-sub { font-size: .85rem; color: #8b90a8; }
.summary-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 1rem; margin: 2rem 3rem; }
.summary-card { background: rgba(255,255,255,0.04); border: 1px solid rgba(255,255,255,0.08); border-radius: 12px; padding: 1.2rem; text-align: center; }
.summary-card .value { font-size: 2.2rem; font-weight: 800; }
.summary-card .label { font-size: .78rem; color: #8b90a8; text-transform: uppercase; letter-spacing: .08em; margin-top: .25rem; }
.pass-value { color: #22c55e; }
.fail-value { color: #ef4444; }
.error-value { color: #f59e0b; }
.comment-box { margin: 0 3rem 2rem; background: rgba(124,111,255,0.08); border: 1px solid rgba(124,111,255,0.25); border-radius: 10px; padding: 1rem 1.4rem; font-size: .9rem; color: #c4c8e8; }
.section-heading { font-size: 1.2rem; font-weight: 700; margin: 2.5rem 3rem 1rem; padding-bottom: .5rem; border-bottom: 1px solid rgba(255,255,255,0.08); color: #a5b4fc; }
.feature-section { margin: 0 3rem 2rem; }
.feature-heading { font-size: 1rem; font-weight: 700; margin-bottom: 1rem; color: #c4b5fd; background: rgba(255,255,255,0.03); padding: .5rem .9rem; border-radius: 6px; border-left: 3px solid #7c6fff; }
.tc-card { border: 1px solid rgba(255,255,255,0.07); border-radius: 10px; margin-bottom: .9rem; overflow: hidden; background: rgba(255,255,255,0.02); }
.pass-card { border-left: 4px solid #22c55e; }
.fail-card { border-left: 4px solid #ef4444; }
.error-card { border-left: 4px solid #f59e0b; }
.tc-header { display: flex; flex-wrap: wrap; align-items: center; gap: .7rem; padding: .75rem 1rem; background: rgba(255,255,255,0.025); }
.tc-id { font-family: monospace; font-size: .78rem; color: #8b90a8; min-width: 60px; }
.tc-condition { font-size: .87rem; flex: 1; min-width: 160px; }
.duration { font-size: .75rem; color: #8b90a8; margin-left: auto; }
.status-badge { font-size: .72rem; font-weight: 700; padding: .2rem .6rem; border-radius: 999px; }
.pass { background: rgba(34,197,94,0.15); color: #86efac; }
.fail { background: rgba(239,68,68,0.15); color: #fca5a5; }
.error { background: rgba(245,158,11,0.15); color: #fde68a; }
.tc-meta { display: flex; gap: 1.5rem; flex-wrap: wrap; padding: .4rem 1rem; font-size: .75rem; color: #8b90a8; }
.error-block { margin: .5rem 1rem; padding: .6rem .9rem; background: rgba(239,68,68,0.08); border: 1px solid rgba(239,68,68,0.2); border-radius: 6px; font-size: .82rem; color: #fca5a5; }
.log-block { margin: .5rem 1rem 0; padding: .55rem .9rem; background: rgba(0,0,0,0.25); border-radius: 6px; font-family: monospace; font-size: .72rem; color: #8b90a8; white-space: pre-wrap; max-height: 120px; overflow-y: auto; }
.screenshot-block { margin: .75rem 1rem 1rem; }
.screenshot-label { font-size: .75rem; color: #f59e0b; margin-bottom: .4rem; }
.screenshot-block img { max-width: 100%; border-radius: 6px; border: 1px solid rgba(255,255,255,0.1); }
.missing-shot { margin: .5rem 1rem; font-size: .78rem; color: #f59e0b; }
.conclusion-box { margin: 0 3rem; background: rgba(255,255,255,0.025); border: 1px solid rgba(255,255,255,0.07); border-radius: 10px; padding: 1.5rem; }
.conclusion-box h3 { font-size: .9rem; color: #a5b4fc; margin: 0 0 .75rem; text-transform: uppercase; letter-spacing: .07em; }
.conclusion-box ul { padding-left: 1.3rem; }
.conclusion-box li { font-size: .87rem; margin-bottom: .4rem; color: #c4c8e8; }
footer { text-align: center; padding: 2rem; font-size: .75rem; color: #4b5180; margin-top: 3rem; border-top: 1px solid rgba(255,255,255,0.06); }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(tc_id: &str, status: Status, error: Option<&str>) -> ExecutionResult {
        ExecutionResult {
            tc_id: tc_id.into(),
            feature: "Login".into(),
            user_role: "user".into(),
            condition: "empty password field → validation error".into(),
            page_url: "https://x.test/login".into(),
            status,
            duration_seconds: 1.23,
            error_message: error.map(str::to_string),
            screenshot_path: None,
            log: "✔ Navigated to https://x.test/login".into(),
        }
    }

    #[test]
    fn report_carries_summary_numbers_and_ids() {
        let results = vec![
            result("TC-001", Status::Pass, None),
            result("TC-002", Status::Fail, Some("Text 'x' not found in page")),
        ];
        let html = generate(&results, None, &PathBuf::from("screenshots"));
        assert!(html.contains("TC-001"));
        assert!(html.contains("TC-002"));
        assert!(html.contains("50%"));
        assert!(html.contains("not found"));
    }

    #[test]
    fn all_pass_report_has_no_failure_patterns() {
        let results = vec![result("TC-001", Status::Pass, None)];
        let html = generate(&results, None, &PathBuf::from("screenshots"));
        assert!(html.contains("100%"));
        assert!(html.contains("No failures detected"));
        assert!(html.contains("No action required"));
    }

    #[test]
    fn markup_in_results_is_escaped() {
        let mut r = result("TC-001", Status::Fail, Some("<script>alert(1)</script>"));
        r.condition = "XSS <img src=x> in field".into();
        let html = generate(&[r], None, &PathBuf::from("screenshots"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn missing_screenshot_file_is_reported_inline() {
        let mut r = result("TC-001", Status::Fail, Some("boom"));
        r.screenshot_path = Some("screenshots/001_TC-001_0_failure.png".into());
        let html = generate(&[r], None, &PathBuf::from("/nonexistent-dir"));
        assert!(html.contains("Screenshot referenced but file not found"));
    }

    #[test]
    fn inline_screenshot_is_embedded_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let fname = "001_TC-001_0_failure.png";
        std::fs::write(dir.path().join(fname), b"pngbytes").unwrap();
        let mut r = result("TC-001", Status::Error, Some("boom"));
        r.screenshot_path = Some(format!("screenshots/{fname}"));
        let html = generate(&[r], None, dir.path());
        assert!(html.contains("data:image/png;base64,"));
    }
}
