//! LLM-backed story analysis. One Gemini call returns both the analysis and
//! a story-only test suite; any API, parse, or validation failure falls back
//! to the rule engine so the pipeline always produces output.

use anyhow::{anyhow, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::Config;
use crate::rules;
use crate::types::{AnalysisBundle, Category, Priority, StoryAnalysis, StoryTestCase, TestSuite};

const SYSTEM_PROMPT: &str = r#"You are a combined QA Story Analyst and Test Case Generator.

Given a user story, return ONE JSON object:
{
  "analysis": {
    "feature": "<one short phrase>",
    "user_role": "<role: user / admin / recruiter ...>",
    "conditions": ["<condition 1: description → expected outcome>", ...]
  },
  "test_suite": {
    "test_cases": [
      {
        "id": "TC-001",
        "title": "<Feature>: <short title>",
        "type": "<Positive | Negative | Boundary | Edge Case>",
        "priority": "<High | Medium | Low>",
        "preconditions": ["..."],
        "steps": ["step 1", "step 2", "..."],
        "expected_result": "<clear outcome>"
      }
    ]
  }
}

Conditions must cover: valid/happy-path, invalid input, empty fields (each separately),
boundary (min/max), edge cases (special chars, SQL injection, XSS, whitespace, very long input),
security (unauthorized access, session expiry, locked accounts), and any error messages implied.

One test case per condition. Positive/Negative → High. Boundary/Edge → Medium.
Return ONLY valid JSON - no markdown, no code fences."#;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?").unwrap());
static JSON_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

pub struct Orchestrator {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        }
    }

    /// Try the LLM; fall back to the rule engine on any failure.
    pub async fn run(&self, user_story: &str) -> AnalysisBundle {
        if let Some(api_key) = self.api_key.clone() {
            match self.try_llm(user_story, &api_key).await {
                Ok(bundle) => return bundle,
                Err(e) => {
                    eprintln!("[Analyst] LLM analysis failed: {e:#}. Falling back to rule engine.");
                }
            }
        } else {
            eprintln!("[Analyst] GEMINI_API_KEY not set, using rule engine.");
        }
        rule_based(user_story)
    }

    async fn try_llm(&self, user_story: &str, api_key: &str) -> Result<AnalysisBundle> {
        let raw = self.call_with_retry(user_story, api_key).await?;
        let data = parse_json_response(&raw);
        bundle_from_llm(&data)
            .ok_or_else(|| anyhow!("LLM response missing analysis/test_suite: {raw}"))
    }

    async fn call_with_retry(&self, user_story: &str, api_key: &str) -> Result<String> {
        let prompt = format!(
            "Analyze this user story and generate comprehensive test cases:\n\nUSER STORY:\n\"\"\"{user_story}\"\"\"\n\nReturn the complete JSON object."
        );
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, api_key
        );
        let body = json!({
            "system_instruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.2},
        });

        let mut wait = Duration::from_secs(3);
        let max_retries = 2;
        for attempt in 0..max_retries {
            let response = self.client.post(&url).json(&body).send().await?;
            let status = response.status();
            let json_resp: Value = response.json().await?;

            if !status.is_success() {
                let err_msg = json_resp["error"]["message"].as_str().unwrap_or("Unknown API error");
                let quota = status.as_u16() == 429 || err_msg.to_lowercase().contains("quota");
                if quota && attempt < max_retries - 1 {
                    eprintln!("[Analyst] Rate limited, retrying in {}s...", wait.as_secs());
                    tokio::time::sleep(wait).await;
                    wait *= 2;
                    continue;
                }
                return Err(anyhow!("Gemini API error ({status}): {err_msg}"));
            }

            let text = json_resp["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .ok_or_else(|| anyhow!("No text in LLM response: {json_resp}"))?;
            return Ok(text.trim().to_string());
        }
        Err(anyhow!("Gemini API retries exhausted"))
    }
}

fn rule_based(user_story: &str) -> AnalysisBundle {
    let analysis = rules::analyze(user_story);
    let test_suite = rules::generate_suite(&analysis);
    AnalysisBundle { analysis, test_suite }
}

/// Parse the LLM reply into JSON, stripping markdown fences and, failing a
/// direct parse, retrying on the outermost `{...}` block.
pub fn parse_json_response(raw: &str) -> Value {
    let cleaned = FENCE_RE.replace_all(raw, "");
    let cleaned = cleaned.trim_matches('`').trim();
    if let Ok(v) = serde_json::from_str(cleaned) {
        return v;
    }
    if let Some(m) = JSON_BLOCK_RE.find(cleaned) {
        if let Ok(v) = serde_json::from_str(m.as_str()) {
            return v;
        }
    }
    Value::Null
}

/// Build the bundle from parsed LLM output, or None when the shape is
/// unusable (missing analysis, empty conditions).
pub fn bundle_from_llm(data: &Value) -> Option<AnalysisBundle> {
    let analysis = data.get("analysis")?;
    let conditions: Vec<String> = analysis
        .get("conditions")?
        .as_array()?
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect();
    if conditions.is_empty() {
        return None;
    }

    let story = StoryAnalysis {
        feature: str_or(analysis, "feature", "Feature"),
        user_role: str_or(analysis, "user_role", "user"),
        conditions,
    };

    let empty = vec![];
    let raw_cases = data
        .pointer("/test_suite/test_cases")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let test_cases: Vec<StoryTestCase> = raw_cases
        .iter()
        .enumerate()
        .map(|(i, tc)| StoryTestCase {
            id: str_or(tc, "id", &format!("TC-{:03}", i + 1)),
            title: str_or(tc, "title", &format!("TC-{:03}", i + 1)),
            category: serde_json::from_value(tc["type"].clone()).unwrap_or(Category::Positive),
            priority: serde_json::from_value(tc["priority"].clone()).unwrap_or(Priority::Medium),
            preconditions: string_list(tc, "preconditions"),
            steps: string_list(tc, "steps"),
            expected_result: str_or(tc, "expected_result", ""),
        })
        .collect();

    let suite = TestSuite::new(story.feature.clone(), story.user_role.clone(), test_cases);
    Some(AnalysisBundle { analysis: story, test_suite: suite })
}

fn str_or(v: &Value, key: &str, default: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

fn string_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"analysis\": {\"feature\": \"Login\", \"user_role\": \"user\", \"conditions\": [\"a → b\"]}, \"test_suite\": {\"test_cases\": []}}\n```";
        let v = parse_json_response(raw);
        assert_eq!(v["analysis"]["feature"], "Login");
    }

    #[test]
    fn recovers_embedded_json_object() {
        let raw = "Here you go:\n{\"analysis\": {\"feature\": \"Search\", \"conditions\": [\"x\"]}}\nHope that helps!";
        let v = parse_json_response(raw);
        assert_eq!(v["analysis"]["feature"], "Search");
    }

    #[test]
    fn garbage_parses_to_null() {
        assert_eq!(parse_json_response("no json here"), Value::Null);
    }

    #[test]
    fn bundle_requires_nonempty_conditions() {
        let v: Value = serde_json::json!({
            "analysis": {"feature": "Login", "user_role": "user", "conditions": []},
            "test_suite": {"test_cases": []},
        });
        assert!(bundle_from_llm(&v).is_none());
    }

    #[test]
    fn bundle_fills_defaults_for_sparse_cases() {
        let v: Value = serde_json::json!({
            "analysis": {"feature": "Login", "user_role": "user", "conditions": ["a → b"]},
            "test_suite": {"test_cases": [{"title": "Login: something", "type": "Bogus"}]},
        });
        let bundle = bundle_from_llm(&v).unwrap();
        assert_eq!(bundle.analysis.conditions.len(), 1);
        let tc = &bundle.test_suite.test_cases[0];
        assert_eq!(tc.id, "TC-001");
        assert_eq!(tc.category, Category::Positive);
        assert_eq!(tc.priority, Priority::Medium);
        assert!(tc.steps.is_empty());
    }
}
