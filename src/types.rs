use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned to a generated test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Positive,
    Negative,
    Boundary,
    #[serde(rename = "Edge Case")]
    EdgeCase,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Positive => write!(f, "Positive"),
            Category::Negative => write!(f, "Negative"),
            Category::Boundary => write!(f, "Boundary"),
            Category::EdgeCase => write!(f, "Edge Case"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

/// What the story analyst extracts from a user story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryAnalysis {
    pub feature: String,
    pub user_role: String,
    pub conditions: Vec<String>,
}

/// A story-only test case (no page mapping), part of the `/analyze` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryTestCase {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub priority: Priority,
    pub preconditions: Vec<String>,
    pub steps: Vec<String>,
    pub expected_result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    pub feature: String,
    pub user_role: String,
    pub total_test_cases: usize,
    pub test_cases: Vec<StoryTestCase>,
}

impl TestSuite {
    pub fn new(feature: String, user_role: String, test_cases: Vec<StoryTestCase>) -> Self {
        Self {
            feature,
            user_role,
            total_test_cases: test_cases.len(),
            test_cases,
        }
    }
}

/// Analysis plus the story-only suite, returned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub analysis: StoryAnalysis,
    pub test_suite: TestSuite,
}

/// Crawl output: the start URL plus every page reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMap {
    pub start_url: String,
    pub pages: Vec<Page>,
}

/// One crawled page. A page that failed to load carries `error` and empty
/// forms/links, and downstream code must tolerate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub name: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub buttons: Vec<Button>,
}

/// A form input. `name` follows the fallback chain name -> id -> placeholder
/// -> type, resolved at extraction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// A test case mapped (or not) onto crawled UI structure.
///
/// `manual_steps` and `automation_steps` run in parallel: step i of one is
/// the counterpart of step i of the other for the shared prefix, though the
/// unmapped template appends an extra annotation line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub tc_id: String,
    pub feature: String,
    pub user_role: String,
    pub condition: String,
    pub page_url: String,
    pub page_title: String,
    pub form_name: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub priority: Priority,
    pub manual_steps: Vec<String>,
    pub automation_steps: Vec<String>,
    pub mapped: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryCounts {
    #[serde(rename = "Positive")]
    pub positive: usize,
    #[serde(rename = "Negative")]
    pub negative: usize,
    #[serde(rename = "Boundary")]
    pub boundary: usize,
    #[serde(rename = "Edge Case")]
    pub edge_case: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub total: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub by_type: CategoryCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "Pass"),
            Status::Fail => write!(f, "Fail"),
            Status::Error => write!(f, "Error"),
        }
    }
}

/// Outcome of running one test case in the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tc_id: String,
    pub feature: String,
    pub user_role: String,
    pub condition: String,
    pub page_url: String,
    pub status: Status,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
    pub screenshot_path: Option<String>,
    pub log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl ExecutionSummary {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        Self {
            total: results.len(),
            passed: results.iter().filter(|r| r.status == Status::Pass).count(),
            failed: results.iter().filter(|r| r.status == Status::Fail).count(),
            errored: results.iter().filter(|r| r.status == Status::Error).count(),
        }
    }
}

/// Form name shown on test cases that could not be mapped to a real form.
pub const NO_FORM: &str = "—";
