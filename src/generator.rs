//! Turns analyzed conditions plus crawled page structure into concrete test
//! cases: a category/priority classification, synthesized input values, and
//! paired manual/automation step sequences.

use crate::matcher;
use crate::types::{
    Button, Category, CategoryCounts, Field, Form, GenerationSummary, Page, Priority, SiteMap,
    StoryAnalysis, TestCase, NO_FORM,
};

/// Keyword tables for condition classification. Checked most-specific first:
/// edge-case and boundary phrasing often contains negative-sounding words
/// ("invalid", "exceed"), so the generic Negative bucket is tested last.
pub const EDGE_KEYWORDS: &[&str] = &[
    "special char",
    "sql injection",
    "xss",
    "whitespace",
    "emoji",
    "concurrent",
    "timeout",
    "network",
    "interrupt",
    "very long",
    "script",
    "injection",
];

pub const BOUNDARY_KEYWORDS: &[&str] = &[
    "minimum", "maximum", "exactly", "at least", "at most", "length", "size", "limit", "min",
    "max", "boundary",
];

pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "invalid",
    "wrong",
    "empty",
    "blank",
    "missing",
    "error",
    "rejected",
    "fail",
    "no ",
    "without",
    "not ",
    "expired",
    "duplicate",
    "exceed",
    "locked",
    "disabled",
    "below",
    "unregistered",
    "incorrect",
];

/// Marker values produced by the synthesizer. Step text embeds these
/// verbatim; the interpreter later recovers the intended keystrokes from the
/// quoted span inside them.
pub const EMPTY_VALUE: &str = "\"\"  (leave empty)";
pub const SQL_INJECTION_VALUE: &str = "\"' OR '1'='1\"  (SQL injection payload)";
pub const XSS_VALUE: &str = "\"<script>alert(1)</script>\"";
pub const SPECIAL_CHARS_VALUE: &str = "\"!@#$%^&*()\"";
pub const LONG_INPUT_VALUE: &str = "\"A\" * 500  (500-character string)";
pub const WHITESPACE_VALUE: &str = "\"   \"  (whitespace only)";

/// Classify a condition into (category, priority) by case-insensitive
/// keyword search, edge-case keywords first, then boundary, then negative.
pub fn classify(condition: &str) -> (Category, Priority) {
    let cl = condition.to_lowercase();
    if EDGE_KEYWORDS.iter().any(|k| cl.contains(k)) {
        return (Category::EdgeCase, Priority::Medium);
    }
    if BOUNDARY_KEYWORDS.iter().any(|k| cl.contains(k)) {
        return (Category::Boundary, Priority::Medium);
    }
    if NEGATIVE_KEYWORDS.iter().any(|k| cl.contains(k)) {
        return (Category::Negative, Priority::High);
    }
    (Category::Positive, Priority::High)
}

/// Choose a concrete input value for one field. The rules form an ordered
/// decision table: the first match wins, so adversarial hints take
/// precedence over type-based defaults, which take precedence over
/// name-based defaults.
pub fn pick_value(field_name: &str, field_type: &str, action_hint: &str, category: Category) -> String {
    let fl = field_name.to_lowercase();
    let al = action_hint.to_lowercase();

    if matches!(category, Category::Negative | Category::EdgeCase) {
        if al.contains("empty") || al.contains("blank") || al.contains("missing") {
            return EMPTY_VALUE.to_string();
        }
        if al.contains("sql") || al.contains("injection") {
            return SQL_INJECTION_VALUE.to_string();
        }
        if al.contains("xss") || al.contains("script") {
            return XSS_VALUE.to_string();
        }
        if al.contains("special") {
            return SPECIAL_CHARS_VALUE.to_string();
        }
        if al.contains("very long") || al.contains("exceed") {
            return LONG_INPUT_VALUE.to_string();
        }
        if al.contains("whitespace") {
            return WHITESPACE_VALUE.to_string();
        }
        if field_type == "email" {
            return "\"not-a-valid-email\"".to_string();
        }
        if field_type == "password" {
            return "\"wrongpassword123\"".to_string();
        }
        return "\"invalid_test_value\"".to_string();
    }

    if category == Category::Boundary {
        if al.contains("minimum") || al.contains("min") {
            return "\"a\"  (1 character — minimum boundary)".to_string();
        }
        if al.contains("maximum") || al.contains("max") {
            return "\"A\" * max_allowed  (at max boundary)".to_string();
        }
        return "\"boundary_value\"".to_string();
    }

    // Positive: realistic values by type, then by field-name hints.
    match field_type {
        "email" => return "\"testuser@example.com\"".to_string(),
        "password" => return "\"ValidPass@123\"".to_string(),
        "tel" => return "\"9876543210\"".to_string(),
        "number" => return "\"42\"".to_string(),
        "checkbox" => return "check the checkbox".to_string(),
        "select" => return "select a valid option from dropdown".to_string(),
        _ => {}
    }
    if fl.contains("name") {
        return "\"John Doe\"".to_string();
    }
    if fl.contains("user") {
        return "\"testuser\"".to_string();
    }
    if fl.contains("title") {
        return "\"Senior Software Engineer\"".to_string();
    }
    if fl.contains("desc") || fl.contains("bio") {
        return "\"Sample description text\"".to_string();
    }
    if fl.contains("salary") || fl.contains("pay") {
        return "\"75000\"".to_string();
    }
    if fl.contains("location") || fl.contains("city") {
        return "\"New York, NY\"".to_string();
    }
    format!("\"{field_name}_test_value\"")
}

fn default_expected(category: Category) -> &'static str {
    match category {
        Category::Positive => "the operation completes successfully and a confirmation is shown",
        Category::Negative => {
            "an appropriate error/validation message is displayed and the action is rejected"
        }
        Category::Boundary => "the system accepts or rejects the input correctly at the boundary value",
        Category::EdgeCase => "the system handles the edge case safely without errors or security issues",
    }
}

/// Split a condition on the `→` separator into (action hint, outcome hint).
/// The outcome is empty when the separator is absent.
pub fn split_condition(condition: &str) -> (&str, &str) {
    match condition.split_once('→') {
        Some((action, outcome)) => (action.trim(), outcome.trim()),
        None => (condition.trim(), ""),
    }
}

/// Build the paired manual/automation step sequences for a mapped condition.
pub fn generate_steps(
    condition: &str,
    url: &str,
    page_title: &str,
    form_name: &str,
    fields: &[Field],
    buttons: &[Button],
    category: Category,
) -> (Vec<String>, Vec<String>) {
    let (action_hint, outcome_hint) = split_condition(condition);

    let mut manual = vec![format!("Open the browser and navigate to {url}.")];
    let mut auto = vec![format!("Open browser and navigate to '{url}'.")];

    if fields.is_empty() {
        manual.push(format!("Locate the relevant input area on '{page_title}'."));
        auto.push(format!("# No form fields extracted - locate inputs manually on {url}."));
    } else {
        for field in fields {
            let value = pick_value(&field.name, &field.kind, action_hint, category);
            manual.push(format!(
                "In the '{form_name}' form, locate the '{}' field ({}) and enter: {value}.",
                field.name, field.kind
            ));
            auto.push(format!(
                "Find element by name/id '{}' and send_keys('{value}').",
                field.name
            ));
        }
    }

    let btn_text = buttons.first().map(|b| b.text.as_str()).unwrap_or("Submit");
    manual.push(format!("Click the '{btn_text}' button."));
    auto.push(format!("Find button with text '{btn_text}' and click()."));

    let expected = if outcome_hint.is_empty() {
        default_expected(category).to_string()
    } else {
        outcome_hint.to_string()
    };
    manual.push(format!("Verify that: {expected}."));
    auto.push(format!("Assert that the page/response reflects: '{expected}'."));

    (manual, auto)
}

fn build_mapped(
    tc_id: String,
    story: &StoryAnalysis,
    condition: &str,
    category: Category,
    priority: Priority,
    page: &Page,
    form: Option<&Form>,
) -> TestCase {
    let form_name = form.map(|f| f.name.clone()).unwrap_or_else(|| NO_FORM.to_string());
    let empty: (&[Field], &[Button]) = (&[], &[]);
    let (fields, buttons) = form.map(|f| (f.fields.as_slice(), f.buttons.as_slice())).unwrap_or(empty);

    let (manual_steps, automation_steps) = generate_steps(
        condition,
        &page.url,
        &page.title,
        &form_name,
        fields,
        buttons,
        category,
    );

    TestCase {
        tc_id,
        feature: story.feature.clone(),
        user_role: story.user_role.clone(),
        condition: condition.to_string(),
        page_url: page.url.clone(),
        page_title: page.title.clone(),
        form_name,
        category,
        priority,
        manual_steps,
        automation_steps,
        mapped: true,
    }
}

fn build_unmapped(
    tc_id: String,
    story: &StoryAnalysis,
    condition: &str,
    category: Category,
    priority: Priority,
    start_url: &str,
) -> TestCase {
    let (action_hint, outcome_hint) = split_condition(condition);
    let note = "⚠️ Assumption: No matching page/form found in explored data. Generic steps used.";
    let target = if start_url.is_empty() { "the application" } else { start_url };
    let verify = if outcome_hint.is_empty() { "system responds correctly" } else { outcome_hint };

    let manual = vec![
        format!("Open the browser and navigate to {target}."),
        format!("Locate the area related to '{}'.", story.feature),
        format!("Perform the action: {action_hint}."),
        "Submit or confirm the action.".to_string(),
        format!("Verify: {verify}."),
        note.to_string(),
    ];
    let auto_target = if start_url.is_empty() { "the application URL" } else { start_url };
    let auto = vec![
        format!("Open browser and navigate to {auto_target}."),
        format!("Locate element related to '{}' feature.", story.feature),
        format!("Perform action for condition: {action_hint}."),
        "Submit the form or trigger the action.".to_string(),
        "Assert the response matches the expected outcome.".to_string(),
        format!("# {note}"),
    ];

    TestCase {
        tc_id,
        feature: story.feature.clone(),
        user_role: story.user_role.clone(),
        condition: condition.to_string(),
        page_url: start_url.to_string(),
        page_title: "Unknown".to_string(),
        form_name: NO_FORM.to_string(),
        category,
        priority,
        manual_steps: manual,
        automation_steps: auto,
        mapped: false,
    }
}

/// Generate one test case per condition, in input order, ids `TC-001..`.
pub fn generate(story: &StoryAnalysis, site: &SiteMap) -> Vec<TestCase> {
    let mut cases = Vec::with_capacity(story.conditions.len());
    for (idx, condition) in story.conditions.iter().enumerate() {
        let tc_id = format!("TC-{:03}", idx + 1);
        let (category, priority) = classify(condition);
        let tc = match matcher::match_condition(condition, &story.feature, &site.pages) {
            Some((page, form)) => build_mapped(tc_id, story, condition, category, priority, page, form),
            None => build_unmapped(tc_id, story, condition, category, priority, &site.start_url),
        };
        cases.push(tc);
    }
    cases
}

pub fn summarize(cases: &[TestCase]) -> GenerationSummary {
    let mut by_type = CategoryCounts::default();
    for tc in cases {
        match tc.category {
            Category::Positive => by_type.positive += 1,
            Category::Negative => by_type.negative += 1,
            Category::Boundary => by_type.boundary += 1,
            Category::EdgeCase => by_type.edge_case += 1,
        }
    }
    let mapped = cases.iter().filter(|tc| tc.mapped).count();
    GenerationSummary {
        total: cases.len(),
        mapped,
        unmapped: cases.len() - mapped,
        by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classify_edge_beats_negative() {
        // "invalid" is a Negative keyword, but injection phrasing is more
        // specific and must win.
        let (cat, prio) = classify("SQL injection on invalid field");
        assert_eq!(cat, Category::EdgeCase);
        assert_eq!(prio, Priority::Medium);
    }

    #[test]
    fn classify_boundary_beats_negative() {
        let (cat, prio) = classify("password exceeding maximum length → rejected");
        assert_eq!(cat, Category::Boundary);
        assert_eq!(prio, Priority::Medium);
    }

    #[test]
    fn classify_defaults_to_positive_high() {
        let (cat, prio) = classify("valid email and valid password → successful login");
        assert_eq!(cat, Category::Positive);
        assert_eq!(prio, Priority::High);
    }

    #[test]
    fn classify_negative_high() {
        let (cat, prio) = classify("wrong password → rejected");
        assert_eq!(cat, Category::Negative);
        assert_eq!(prio, Priority::High);
    }

    #[test]
    fn empty_hint_wins_for_any_field_type() {
        for ftype in ["text", "email", "password", "number", "select"] {
            let v = pick_value("whatever", ftype, "empty password field", Category::Negative);
            assert_eq!(v, EMPTY_VALUE);
        }
    }

    #[test]
    fn negative_email_without_adversarial_hint_is_malformed_address() {
        let v = pick_value("email", "email", "unregistered email", Category::Negative);
        assert_eq!(v, "\"not-a-valid-email\"");
    }

    #[test]
    fn injection_hint_beats_field_type_rule() {
        let v = pick_value("email", "email", "sql injection in email field", Category::EdgeCase);
        assert_eq!(v, SQL_INJECTION_VALUE);
    }

    #[test]
    fn boundary_minimum_is_single_char() {
        let v = pick_value("password", "password", "password at minimum allowed length", Category::Boundary);
        assert!(v.starts_with("\"a\""), "got {v}");
    }

    #[test]
    fn positive_values_dispatch_on_type_then_name() {
        assert_eq!(pick_value("email", "email", "valid data", Category::Positive), "\"testuser@example.com\"");
        assert_eq!(pick_value("full_name", "text", "valid data", Category::Positive), "\"John Doe\"");
        assert_eq!(pick_value("city", "text", "valid data", Category::Positive), "\"New York, NY\"");
        assert_eq!(pick_value("zip", "text", "valid data", Category::Positive), "\"zip_test_value\"");
    }

    #[test]
    fn split_condition_handles_missing_arrow() {
        assert_eq!(split_condition("a → b"), ("a", "b"));
        assert_eq!(split_condition("password field masks characters"), ("password field masks characters", ""));
    }

    fn login_site() -> SiteMap {
        SiteMap {
            start_url: "https://x.test".into(),
            pages: vec![Page {
                url: "https://x.test/login".into(),
                title: "Login".into(),
                error: None,
                forms: vec![Form {
                    name: "login".into(),
                    action: "/login".into(),
                    method: "POST".into(),
                    fields: vec![
                        Field { name: "email".into(), kind: "email".into(), required: true, placeholder: String::new() },
                        Field { name: "password".into(), kind: "password".into(), required: true, placeholder: String::new() },
                    ],
                    buttons: vec![Button { text: "Login".into(), kind: "submit".into() }],
                }],
                links: vec![],
            }],
        }
    }

    fn story(conditions: &[&str]) -> StoryAnalysis {
        StoryAnalysis {
            feature: "Login".into(),
            user_role: "user".into(),
            conditions: conditions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn ids_are_sequential_and_unique() {
        let story = story(&["a → b", "c → d", "e → f", "g", "h", "i", "j", "k", "l", "m", "n", "o"]);
        let cases = generate(&story, &login_site());
        assert_eq!(cases.len(), 12);
        for (i, tc) in cases.iter().enumerate() {
            assert_eq!(tc.tc_id, format!("TC-{:03}", i + 1));
            assert_eq!(tc.condition, story.conditions[i]);
        }
        let mut ids: Vec<_> = cases.iter().map(|tc| tc.tc_id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn no_pages_means_every_case_unmapped() {
        let site = SiteMap { start_url: "https://x.test".into(), pages: vec![] };
        let cases = generate(&story(&["valid login → ok", "empty password field → validation error"]), &site);
        assert_eq!(cases.len(), 2);
        for tc in &cases {
            assert!(!tc.mapped);
            assert_eq!(tc.form_name, NO_FORM);
            assert_eq!(tc.page_title, "Unknown");
            assert_eq!(tc.page_url, "https://x.test");
            assert_eq!(tc.manual_steps.len(), 6);
            assert!(tc.automation_steps.last().unwrap().starts_with('#'));
        }
    }

    #[test]
    fn empty_password_condition_end_to_end() {
        let cases = generate(&story(&["empty password field → validation error"]), &login_site());
        assert_eq!(cases.len(), 1);
        let tc = &cases[0];
        assert_eq!(tc.category, Category::Negative);
        assert_eq!(tc.priority, Priority::High);
        assert!(tc.mapped);
        assert_eq!(tc.form_name, "login");

        let password_step = tc
            .automation_steps
            .iter()
            .find(|s| s.contains("'password'"))
            .expect("password fill step");
        assert!(password_step.contains("send_keys"));
        assert!(password_step.contains(EMPTY_VALUE), "got {password_step}");

        assert!(tc.automation_steps.iter().any(|s| s.contains("'Login'") && s.contains("click()")));
        let assert_step = tc.automation_steps.last().unwrap();
        assert!(assert_step.contains("Assert"));
        assert!(assert_step.contains("'validation error'"));
    }

    #[test]
    fn formless_page_gets_generic_locate_step() {
        let site = SiteMap {
            start_url: "https://x.test".into(),
            pages: vec![Page {
                url: "https://x.test/welcome".into(),
                title: "Welcome".into(),
                error: None,
                forms: vec![],
                links: vec![],
            }],
        };
        let cases = generate(&story(&["zzz"]), &site);
        let tc = &cases[0];
        assert!(tc.mapped);
        assert_eq!(tc.form_name, NO_FORM);
        assert!(tc.manual_steps[1].contains("relevant input area"));
        assert!(tc.automation_steps[1].starts_with('#'));
        // Even with no fields there is still a click and an assertion pair.
        assert!(tc.automation_steps.iter().any(|s| s.contains("'Submit'")));
    }

    #[test]
    fn summary_counts_by_category() {
        let cases = generate(
            &story(&[
                "valid email and valid password → successful login",
                "empty password field → validation error",
                "password exceeding maximum length → rejected",
                "SQL injection in email field → safely handled",
            ]),
            &login_site(),
        );
        let s = summarize(&cases);
        assert_eq!(s.total, 4);
        assert_eq!(s.mapped, 4);
        assert_eq!(s.unmapped, 0);
        assert_eq!(s.by_type.positive, 1);
        assert_eq!(s.by_type.negative, 1);
        assert_eq!(s.by_type.boundary, 1);
        assert_eq!(s.by_type.edge_case, 1);
    }
}
