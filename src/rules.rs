//! Rule-based analysis engine. Works entirely offline, so the pipeline keeps
//! functioning when the LLM is unavailable or over quota.

use regex::Regex;
use std::sync::LazyLock;

use crate::generator;
use crate::types::{Category, StoryAnalysis, StoryTestCase, TestSuite};

const FEATURE_KEYWORDS: &[(&str, &[&str])] = &[
    ("Login", &["login", "sign in", "signin", "log in", "authenticate"]),
    ("Registration", &["register", "sign up", "signup", "create account"]),
    ("Search", &["search", "find", "filter", "query", "look up"]),
    ("Password Reset", &["reset password", "forgot password", "change password"]),
    ("Checkout", &["checkout", "purchase", "buy", "order", "payment"]),
    ("Profile", &["profile", "account settings", "update profile"]),
    ("Logout", &["logout", "sign out", "log out"]),
];

const ROLE_KEYWORDS: &[&str] = &["admin", "recruiter", "employer", "job seeker", "candidate", "guest"];

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"as an?\s+([a-zA-Z\s]+?)(?:,|\s+i\s+want|\s+i\s+would|\s+i\s+can|\s+i\s+need)")
        .unwrap()
});

static WANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:want to|able to|can)\s+([a-zA-Z\s]{3,25}?)(?:\s+so that|\.|$)").unwrap()
});

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(the|a|an)\b").unwrap());

/// Analyse a user story without any LLM: detect the feature, extract the
/// role, and pull a canned condition library for that feature.
pub fn analyze(user_story: &str) -> StoryAnalysis {
    let sl = user_story.to_lowercase();
    let feature = detect_feature(&sl);
    let user_role = detect_role(&sl);
    let conditions = conditions_for(&feature);
    StoryAnalysis { feature, user_role, conditions }
}

fn detect_feature(sl: &str) -> String {
    for (name, keywords) in FEATURE_KEYWORDS {
        if keywords.iter().any(|kw| sl.contains(kw)) {
            return (*name).to_string();
        }
    }
    if let Some(cap) = WANT_RE.captures(sl) {
        return title_case(cap[1].trim());
    }
    "Feature".to_string()
}

fn detect_role(sl: &str) -> String {
    if let Some(cap) = ROLE_RE.captures(sl) {
        let role = ARTICLE_RE.replace_all(&cap[1], "");
        let role = role.trim();
        if !role.is_empty() {
            return role.to_lowercase();
        }
    }
    for kw in ROLE_KEYWORDS {
        if sl.contains(kw) {
            return (*kw).to_string();
        }
    }
    "user".to_string()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn conditions_for(feature: &str) -> Vec<String> {
    let f = feature.to_lowercase();
    let canned: Option<&[&str]> = if f.contains("login") {
        Some(LOGIN_CONDITIONS)
    } else if f.contains("registration") {
        Some(REGISTRATION_CONDITIONS)
    } else if f.contains("search") {
        Some(SEARCH_CONDITIONS)
    } else if f.contains("password reset") {
        Some(PASSWORD_RESET_CONDITIONS)
    } else {
        None
    };

    match canned {
        Some(list) => list.iter().map(|s| s.to_string()).collect(),
        None => generic_conditions(feature),
    }
}

const LOGIN_CONDITIONS: &[&str] = &[
    "valid email and valid password → successful login",
    "valid email and invalid password → error message shown",
    "invalid email and valid password → error message shown",
    "empty email field → validation error",
    "empty password field → validation error",
    "both fields empty → validation error",
    "email without @ symbol → rejected",
    "password at minimum allowed length → accepted",
    "password exceeding maximum length → rejected",
    "username with special characters → handled per policy",
    "SQL injection in email field → safely handled",
    "XSS script in email field → safely handled",
    "whitespace-only password → rejected",
    "multiple failed attempts (5+) → account locked or CAPTCHA triggered",
    "locked/disabled account login → appropriate error",
    "session expires → redirect to login page",
    "password field masks characters",
    "remember-me checkbox persists session",
    "forgot-password link navigates correctly",
];

const REGISTRATION_CONDITIONS: &[&str] = &[
    "all valid fields → account created successfully",
    "empty first name → validation error",
    "empty last name → validation error",
    "empty email → validation error",
    "empty password → validation error",
    "empty confirm-password → validation error",
    "email without @ → rejected",
    "duplicate email address → rejected with message",
    "password shorter than minimum length → rejected",
    "password and confirm-password mismatch → rejected",
    "name exceeding maximum length → rejected",
    "phone number with non-numeric characters → rejected",
    "name with special characters/emojis → handled",
    "SQL injection in email → safely handled",
    "submitting without accepting terms → rejected",
    "confirmation email sent after successful registration",
];

const SEARCH_CONDITIONS: &[&str] = &[
    "valid keyword matching results → results displayed",
    "keyword with no matches → 'no results found' message",
    "empty search field → validation error or all results shown",
    "whitespace-only search → treated as empty",
    "partial keyword → relevant results shown",
    "keyword with special characters → safely handled",
    "SQL injection in search field → safely handled",
    "very long search string (>255 chars) → truncated or rejected",
    "apply filter with valid criteria → filtered results",
    "apply multiple filters → correctly combined",
    "clear filters → original results restored",
    "navigate to next/previous page of results",
    "search result count matches actual results",
];

const PASSWORD_RESET_CONDITIONS: &[&str] = &[
    "valid registered email → reset link sent",
    "unregistered email → generic message (no account reveal)",
    "empty email field → validation error",
    "invalid email format → validation error",
    "expired reset link → appropriate error",
    "reset link used more than once → rejected",
    "new password below minimum length → rejected",
    "new and confirm password mismatch → rejected",
    "valid new password → updated and confirmation shown",
    "login with old password after reset → rejected",
    "login with new password after reset → successful",
];

fn generic_conditions(feature: &str) -> Vec<String> {
    vec![
        format!("all required fields valid → {feature} successful"),
        "one required field empty → validation error".to_string(),
        "all required fields empty → validation error".to_string(),
        "input at minimum allowed length → accepted".to_string(),
        "input at maximum allowed length → accepted".to_string(),
        "input exceeding maximum length → rejected".to_string(),
        "input with special characters → handled per policy".to_string(),
        "SQL injection attempt → safely handled".to_string(),
        "XSS script attempt → safely handled".to_string(),
        "duplicate submission → handled gracefully".to_string(),
        "network failure during action → error handled".to_string(),
        format!("unauthenticated user attempts {feature} → redirected to login"),
        format!("success confirmation shown after {feature}"),
    ]
}

/// Build a story-only test suite from an analysis, one case per condition.
pub fn generate_suite(analysis: &StoryAnalysis) -> TestSuite {
    let cases = analysis
        .conditions
        .iter()
        .enumerate()
        .map(|(idx, condition)| build_case(idx + 1, condition, analysis))
        .collect();
    TestSuite::new(analysis.feature.clone(), analysis.user_role.clone(), cases)
}

fn build_case(idx: usize, condition: &str, analysis: &StoryAnalysis) -> StoryTestCase {
    let (category, priority) = generator::classify(condition);
    let (title_raw, expected_hint) = generator::split_condition(condition);

    StoryTestCase {
        id: format!("TC-{idx:03}"),
        title: format!("{}: {title_raw}", analysis.feature),
        category,
        priority,
        preconditions: preconditions(&analysis.feature, &analysis.user_role),
        steps: suite_steps(title_raw, &analysis.feature),
        expected_result: expected_result(expected_hint, condition, category, &analysis.feature),
    }
}

fn preconditions(feature: &str, role: &str) -> Vec<String> {
    let mut base = vec![
        "Application is running and accessible".to_string(),
        format!("User has '{role}' role"),
    ];
    match feature.to_lowercase().as_str() {
        "login" | "password reset" => {
            base.push("A registered test account exists with known credentials".to_string());
        }
        "checkout" => {
            base.push("User is logged in".to_string());
            base.push("Required items/services are available".to_string());
        }
        "profile" | "logout" => base.push("User is logged in".to_string()),
        "search" => base.push("Database contains relevant test data".to_string()),
        _ => {}
    }
    base
}

fn suite_steps(condition_text: &str, feature: &str) -> Vec<String> {
    let c = condition_text.to_lowercase();
    if feature.to_lowercase() == "login" {
        if c.contains("empty email") || c.contains("empty username") {
            return vec![
                "Navigate to the login page".to_string(),
                "Leave the email/username field empty".to_string(),
                "Enter a valid password".to_string(),
                "Click 'Login'".to_string(),
            ];
        }
        if c.contains("empty password") {
            return vec![
                "Navigate to the login page".to_string(),
                "Enter a valid email/username".to_string(),
                "Leave the password field empty".to_string(),
                "Click 'Login'".to_string(),
            ];
        }
        if c.contains("sql injection") {
            return vec![
                "Navigate to the login page".to_string(),
                "Enter SQL injection payload in email field (e.g. ' OR '1'='1)".to_string(),
                "Enter any value in password".to_string(),
                "Click 'Login'".to_string(),
            ];
        }
        if c.contains("locked") || c.contains("disabled") {
            return vec![
                "Navigate to the login page".to_string(),
                "Enter username of a locked/disabled account".to_string(),
                "Enter the correct password".to_string(),
                "Click 'Login'".to_string(),
            ];
        }
        return vec![
            "Navigate to the login page".to_string(),
            "Enter the test email in the email field".to_string(),
            "Enter the test password in the password field".to_string(),
            "Click the 'Login' button".to_string(),
        ];
    }
    vec![
        format!("Navigate to the {feature} page"),
        format!("Perform the action: '{condition_text}'"),
        "Submit or confirm the action".to_string(),
        "Observe the system response".to_string(),
    ]
}

fn expected_result(hint: &str, full_condition: &str, category: Category, feature: &str) -> String {
    if !hint.is_empty() {
        let mut chars = hint.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => hint.to_string(),
        };
    }
    let c = full_condition.to_lowercase();
    if category == Category::Positive {
        return format!("{feature} operation completes successfully; confirmation is shown.");
    }
    if c.contains("empty") || c.contains("missing") {
        return "Inline validation error is shown; form is NOT submitted.".to_string();
    }
    if c.contains("invalid") || c.contains("incorrect") {
        return "Appropriate error message is displayed; action is rejected.".to_string();
    }
    if c.contains("sql injection") || c.contains("xss") {
        return "Input is safely sanitised; no script executes; no DB error exposed.".to_string();
    }
    if c.contains("exceed") || c.contains("maximum") {
        return "Input is rejected with a message indicating the limit was exceeded.".to_string();
    }
    if c.contains("minimum") || c.contains("boundary") {
        return "Input at the boundary is accepted/rejected correctly per specification.".to_string();
    }
    if c.contains("locked") || c.contains("disabled") {
        return "Login is rejected; informative account-status message is shown.".to_string();
    }
    "System responds correctly as per the specification for this condition.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Priority};

    #[test]
    fn detects_login_feature_and_role() {
        let a = analyze("As a registered user, I want to log in so that I can see my dashboard.");
        assert_eq!(a.feature, "Login");
        assert_eq!(a.user_role, "registered user");
        assert!(a.conditions.iter().any(|c| c.contains("empty password")));
    }

    #[test]
    fn unknown_feature_falls_back_to_want_phrase() {
        let a = analyze("As an admin, I want to archive old records so that the list stays short.");
        assert_eq!(a.feature, "Archive Old Records");
        assert_eq!(a.user_role, "admin");
        // Generic library interpolates the feature name.
        assert!(a.conditions[0].contains("Archive Old Records"));
    }

    #[test]
    fn role_defaults_to_user() {
        let a = analyze("I want to search for blue widgets.");
        assert_eq!(a.user_role, "user");
        assert_eq!(a.feature, "Search");
    }

    #[test]
    fn suite_ids_follow_condition_order() {
        let a = analyze("As a user, I want to log in.");
        let suite = generate_suite(&a);
        assert_eq!(suite.total_test_cases, a.conditions.len());
        assert_eq!(suite.test_cases[0].id, "TC-001");
        assert_eq!(
            suite.test_cases.last().unwrap().id,
            format!("TC-{:03}", a.conditions.len())
        );
    }

    #[test]
    fn suite_case_uses_hint_as_expected_result() {
        let a = StoryAnalysis {
            feature: "Login".into(),
            user_role: "user".into(),
            conditions: vec!["empty password field → validation error".into()],
        };
        let suite = generate_suite(&a);
        let tc = &suite.test_cases[0];
        assert_eq!(tc.category, Category::Negative);
        assert_eq!(tc.priority, Priority::High);
        assert_eq!(tc.expected_result, "Validation error");
        assert!(tc.steps.iter().any(|s| s.contains("Leave the password field empty")));
    }
}
