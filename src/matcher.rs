//! Scores a test condition against crawled pages to pick the page and form
//! the condition most plausibly targets.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Form, Page};

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Pick the best (page, form) pair for a condition.
///
/// Scoring per page: +3 per feature keyword (len > 3) appearing in the URL or
/// title, +1 per condition keyword (len > 3) appearing the same way, plus
/// every form's field score. A form scores +2 for each condition keyword
/// (len > 2) contained in a field's `name + " " + type` string. Ties break
/// toward the first page / first form encountered.
///
/// When nothing scores above zero, falls back to the first page that has a
/// form (paired with its first form), then the first page at all, so callers
/// always get an anchor whenever any page exists.
pub fn match_condition<'a>(
    condition: &str,
    feature: &str,
    pages: &'a [Page],
) -> Option<(&'a Page, Option<&'a Form>)> {
    let condition_l = condition.to_lowercase();
    let feature_l = feature.to_lowercase();
    let cond_words: Vec<&str> = WORD_RE.find_iter(&condition_l).map(|m| m.as_str()).collect();
    let feat_words: Vec<&str> = WORD_RE.find_iter(&feature_l).map(|m| m.as_str()).collect();

    let mut best: Option<(&Page, Option<&Form>)> = None;
    let mut best_score = -1i64;

    for page in pages {
        let url_l = page.url.to_lowercase();
        let title_l = page.title.to_lowercase();

        let mut score = 0i64;
        for w in &feat_words {
            if w.len() > 3 && (url_l.contains(w) || title_l.contains(w)) {
                score += 3;
            }
        }
        for w in &cond_words {
            if w.len() > 3 && (url_l.contains(w) || title_l.contains(w)) {
                score += 1;
            }
        }

        let mut page_best_form: Option<&Form> = None;
        let mut page_best_form_score = -1i64;
        for form in &page.forms {
            let fs = form_score(form, &cond_words);
            if fs > page_best_form_score {
                page_best_form_score = fs;
                page_best_form = Some(form);
            }
            score += fs;
        }

        if score > best_score {
            best_score = score;
            best = Some((page, page_best_form));
        }
    }

    if best_score <= 0 {
        for page in pages {
            if !page.forms.is_empty() {
                return Some((page, page.forms.first()));
            }
        }
        return pages.first().map(|p| (p, None));
    }

    best
}

fn form_score(form: &Form, cond_words: &[&str]) -> i64 {
    let mut fs = 0;
    for field in &form.fields {
        let haystack = format!("{} {}", field.name, field.kind).to_lowercase();
        for w in cond_words {
            if w.len() > 2 && haystack.contains(*w) {
                fs += 2;
            }
        }
    }
    fs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Button, Field, Form, Page};

    fn field(name: &str, kind: &str) -> Field {
        Field {
            name: name.into(),
            kind: kind.into(),
            required: false,
            placeholder: String::new(),
        }
    }

    fn form(name: &str, fields: Vec<Field>) -> Form {
        Form {
            name: name.into(),
            action: "/submit".into(),
            method: "POST".into(),
            fields,
            buttons: vec![Button {
                text: "Submit".into(),
                kind: "submit".into(),
            }],
        }
    }

    fn page(url: &str, title: &str, forms: Vec<Form>) -> Page {
        Page {
            url: url.into(),
            title: title.into(),
            error: None,
            forms,
            links: vec![],
        }
    }

    #[test]
    fn prefers_page_with_matching_fields() {
        let pages = vec![
            page("https://x.test/about", "About Us", vec![]),
            page(
                "https://x.test/login",
                "Sign In",
                vec![form("login", vec![field("email", "email"), field("password", "password")])],
            ),
        ];
        let (p, f) = match_condition("empty password field → validation error", "Login", &pages).unwrap();
        assert_eq!(p.url, "https://x.test/login");
        assert_eq!(f.unwrap().name, "login");
    }

    #[test]
    fn deterministic_on_repeat() {
        let pages = vec![
            page("https://x.test/a", "Search", vec![form("f1", vec![field("query", "text")])]),
            page("https://x.test/b", "Search", vec![form("f2", vec![field("query", "text")])]),
        ];
        let first = match_condition("valid query → results shown", "Search", &pages).unwrap();
        for _ in 0..5 {
            let again = match_condition("valid query → results shown", "Search", &pages).unwrap();
            assert_eq!(again.0.url, first.0.url);
            assert_eq!(again.1.unwrap().name, first.1.unwrap().name);
        }
        // Ties break toward the first page encountered.
        assert_eq!(first.0.url, "https://x.test/a");
    }

    #[test]
    fn zero_overlap_falls_back_to_first_page_with_form() {
        let pages = vec![
            page("https://x.test/1", "One", vec![]),
            page("https://x.test/2", "Two", vec![]),
            page("https://x.test/3", "Three", vec![form("contact", vec![field("msg", "textarea")])]),
        ];
        let (p, f) = match_condition("zzzz → qqqq", "yyyy", &pages).unwrap();
        assert_eq!(p.url, "https://x.test/3");
        assert_eq!(f.unwrap().name, "contact");
    }

    #[test]
    fn zero_overlap_no_forms_anywhere_picks_first_page() {
        let pages = vec![
            page("https://x.test/1", "One", vec![]),
            page("https://x.test/2", "Two", vec![]),
        ];
        let (p, f) = match_condition("zzzz", "yyyy", &pages).unwrap();
        assert_eq!(p.url, "https://x.test/1");
        assert!(f.is_none());
    }

    #[test]
    fn empty_page_list_yields_none() {
        assert!(match_condition("anything", "Login", &[]).is_none());
    }

    #[test]
    fn error_page_scores_like_formless_page() {
        let mut broken = page("https://x.test/login", "Error", vec![]);
        broken.error = Some("connect timeout".into());
        let pages = vec![
            broken,
            page(
                "https://x.test/login/form",
                "Login",
                vec![form("login", vec![field("password", "password")])],
            ),
        ];
        let (p, f) = match_condition("empty password field → validation error", "Login", &pages).unwrap();
        assert_eq!(p.url, "https://x.test/login/form");
        assert!(f.is_some());
    }
}
