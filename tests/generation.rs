//! End-to-end generation properties: condition in, fully-formed test case
//! out, with automation steps the interpreter actually understands.

use pretty_assertions::assert_eq;

use storyqa::executor::{parse_step, StepAction};
use storyqa::generator::{self, EMPTY_VALUE};
use storyqa::types::{Button, Category, Field, Form, Page, Priority, SiteMap, StoryAnalysis, NO_FORM};

fn login_site() -> SiteMap {
    SiteMap {
        start_url: "https://x.test".into(),
        pages: vec![Page {
            url: "https://x.test/login".into(),
            title: "Login".into(),
            error: None,
            forms: vec![Form {
                name: "login-form".into(),
                action: "/session".into(),
                method: "POST".into(),
                fields: vec![
                    Field {
                        name: "email".into(),
                        kind: "email".into(),
                        required: true,
                        placeholder: "you@example.com".into(),
                    },
                    Field {
                        name: "password".into(),
                        kind: "password".into(),
                        required: true,
                        placeholder: String::new(),
                    },
                ],
                buttons: vec![Button {
                    text: "Login".into(),
                    kind: "submit".into(),
                }],
            }],
            links: vec![],
        }],
    }
}

fn login_story(conditions: &[&str]) -> StoryAnalysis {
    StoryAnalysis {
        feature: "Login".into(),
        user_role: "user".into(),
        conditions: conditions.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn n_conditions_produce_n_ordered_unique_ids() {
    let conditions: Vec<String> = (0..15).map(|i| format!("condition number {i} → outcome {i}")).collect();
    let refs: Vec<&str> = conditions.iter().map(String::as_str).collect();
    let cases = generator::generate(&login_story(&refs), &login_site());

    assert_eq!(cases.len(), 15);
    for (i, tc) in cases.iter().enumerate() {
        assert_eq!(tc.tc_id, format!("TC-{:03}", i + 1));
        assert_eq!(tc.condition, conditions[i]);
    }
    let mut seen = std::collections::HashSet::new();
    assert!(cases.iter().all(|tc| seen.insert(tc.tc_id.clone())));
}

#[test]
fn empty_password_login_example() {
    let cases = generator::generate(
        &login_story(&["empty password field → validation error"]),
        &login_site(),
    );
    let tc = &cases[0];

    assert_eq!(tc.category, Category::Negative);
    assert_eq!(tc.priority, Priority::High);
    assert!(tc.mapped);
    assert_eq!(tc.page_url, "https://x.test/login");
    assert_eq!(tc.form_name, "login-form");

    let password_step = tc
        .automation_steps
        .iter()
        .find(|s| s.contains("'password'"))
        .expect("password step present");
    assert!(password_step.contains(EMPTY_VALUE));

    assert!(tc
        .automation_steps
        .iter()
        .any(|s| s.contains("'Login'") && s.contains("click()")));
    assert!(tc
        .automation_steps
        .last()
        .unwrap()
        .contains("'validation error'"));
}

#[test]
fn generated_steps_parse_into_executable_actions() {
    // The interpreter must understand what the generator writes: this is the
    // handshake the whole pipeline relies on.
    let cases = generator::generate(
        &login_story(&["empty password field → validation error"]),
        &login_site(),
    );
    let actions: Vec<StepAction> = cases[0].automation_steps.iter().map(|s| parse_step(s)).collect();

    assert_eq!(
        actions,
        vec![
            StepAction::Navigate {
                url: "https://x.test/login".into()
            },
            StepAction::Fill {
                locator: "email".into(),
                // Negative category + empty hint: every field gets the empty
                // marker, which reads back as no keystrokes.
                value: String::new()
            },
            StepAction::Fill {
                locator: "password".into(),
                value: String::new()
            },
            StepAction::Click {
                label: Some("Login".into())
            },
            StepAction::AssertText {
                expected: "validation error".into()
            },
        ]
    );
}

#[test]
fn positive_login_steps_parse_with_realistic_values() {
    let cases = generator::generate(
        &login_story(&["valid credentials entered → dashboard shown"]),
        &login_site(),
    );
    let actions: Vec<StepAction> = cases[0].automation_steps.iter().map(|s| parse_step(s)).collect();

    assert_eq!(
        actions[1],
        StepAction::Fill {
            locator: "email".into(),
            value: "testuser@example.com".into()
        }
    );
    assert_eq!(
        actions[2],
        StepAction::Fill {
            locator: "password".into(),
            value: "ValidPass@123".into()
        }
    );
    assert_eq!(
        *actions.last().unwrap(),
        StepAction::AssertText {
            expected: "dashboard shown".into()
        }
    );
}

#[test]
fn zero_pages_yields_unmapped_cases_anchored_to_start_url() {
    let site = SiteMap {
        start_url: "https://x.test".into(),
        pages: vec![],
    };
    let cases = generator::generate(
        &login_story(&["valid login → ok", "empty email field → validation error"]),
        &site,
    );
    for tc in &cases {
        assert!(!tc.mapped);
        assert_eq!(tc.form_name, NO_FORM);
        assert_eq!(tc.page_url, "https://x.test");
        // Generic templates: navigation parses, annotation line is a no-op.
        assert!(matches!(
            parse_step(&tc.automation_steps[0]),
            StepAction::Navigate { .. }
        ));
        assert_eq!(parse_step(tc.automation_steps.last().unwrap()), StepAction::Skip);
    }
}

#[test]
fn classifier_precedence_flows_through_generation() {
    let cases = generator::generate(
        &login_story(&[
            "SQL injection in email field → safely handled",
            "password exceeding maximum length → rejected",
            "invalid email and valid password → error message shown",
        ]),
        &login_site(),
    );
    assert_eq!(cases[0].category, Category::EdgeCase);
    assert_eq!(cases[1].category, Category::Boundary);
    assert_eq!(cases[2].category, Category::Negative);

    let summary = generator::summarize(&cases);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.by_type.edge_case, 1);
    assert_eq!(summary.by_type.boundary, 1);
    assert_eq!(summary.by_type.negative, 1);
    assert_eq!(summary.by_type.positive, 0);
}

#[test]
fn serialized_test_case_uses_wire_field_names() {
    let cases = generator::generate(
        &login_story(&["empty password field → validation error"]),
        &login_site(),
    );
    let v = serde_json::to_value(&cases[0]).unwrap();
    assert_eq!(v["tc_id"], "TC-001");
    assert_eq!(v["type"], "Negative");
    assert_eq!(v["priority"], "High");
    assert_eq!(v["mapped"], true);
    assert!(v["manual_steps"].is_array());
    assert!(v["automation_steps"].is_array());
}
