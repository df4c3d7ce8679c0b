//! Site explorer: crawls the start URL (plus same-domain links up to the
//! requested depth) and extracts a structural page model. Structure is read
//! straight from the served DOM via an injected script; there is no attempt
//! to wait out client-side rendering.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::session::BrowserSession;
use crate::types::{Form, Link, Page, SiteMap};

/// Max internal pages to visit per crawl.
pub const MAX_PAGES: usize = 6;

const NAV_TIMEOUT: Duration = Duration::from_secs(10);

/// Injected into each page to extract forms, fields, buttons, and links as
/// one JSON payload.
///
/// Field rules: skip hidden/submit/button/image/reset inputs; field name
/// falls back name -> id -> placeholder -> type; form name falls back
/// id -> name -> first class -> "form". Links skip fragment/mailto/tel/
/// javascript targets, are absolutized by the browser, deduplicated, and
/// capped at 30.
const EXTRACT_JS: &str = r#"
(() => {
  const SKIP_TYPES = new Set(['hidden','submit','button','image','reset']);

  const forms = [];
  for (const formEl of document.querySelectorAll('form')) {
    const name = formEl.getAttribute('id')
      || formEl.getAttribute('name')
      || (formEl.classList.length ? formEl.classList[0] : '')
      || 'form';

    const fields = [];
    for (const inp of formEl.querySelectorAll('input, select, textarea')) {
      const type = (inp.getAttribute('type') || inp.tagName).toLowerCase();
      if (SKIP_TYPES.has(type)) continue;
      fields.push({
        name: inp.getAttribute('name') || inp.getAttribute('id') || inp.getAttribute('placeholder') || type,
        type: type,
        required: inp.hasAttribute('required'),
        placeholder: inp.getAttribute('placeholder') || '',
      });
    }

    const buttons = [];
    for (const btn of formEl.querySelectorAll('button, input')) {
      const btnType = (btn.getAttribute('type') || 'button').toLowerCase();
      if (btnType !== 'submit' && btnType !== 'button') continue;
      const text = (btn.textContent || '').trim() || btn.getAttribute('value') || btn.getAttribute('aria-label') || 'Button';
      buttons.push({ text: text, type: btnType });
    }

    forms.push({
      name: name,
      action: formEl.getAttribute('action') || '',
      method: (formEl.getAttribute('method') || 'get').toUpperCase(),
      fields: fields,
      buttons: buttons,
    });
  }

  const links = [];
  const seen = new Set();
  for (const a of document.querySelectorAll('a[href]')) {
    const raw = (a.getAttribute('href') || '').trim();
    if (!raw || raw.startsWith('#') || raw.startsWith('mailto:') || raw.startsWith('tel:') || raw.startsWith('javascript:')) continue;
    const href = a.href;
    if (seen.has(href)) continue;
    seen.add(href);
    const text = (a.textContent || '').trim();
    links.push({ text: text || href, href: href });
    if (links.length >= 30) break;
  }

  let title = (document.title || '').trim();
  if (!title) {
    const h1 = document.querySelector('h1');
    title = h1 ? h1.textContent.trim() : '';
  }

  return JSON.stringify({ title: title || 'Untitled', forms: forms, links: links });
})()
"#;

#[derive(Debug, Deserialize)]
struct ExtractedPage {
    title: String,
    #[serde(default)]
    forms: Vec<Form>,
    #[serde(default)]
    links: Vec<Link>,
}

/// Crawl from `start_url`. depth 0 visits only the start page, depth 1 adds
/// its direct internal links. Blocking; callers on the async side wrap this
/// in `spawn_blocking`.
pub fn explore(start_url: &str, depth: usize) -> Result<SiteMap> {
    let start_url = normalise_url(start_url);
    let base_domain = host_of(&start_url).unwrap_or_default();

    eprintln!("[Explorer] Crawling {start_url} (depth {depth})...");
    let session = BrowserSession::launch(true)?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((start_url.clone(), 0));
    let mut pages = Vec::new();

    loop {
        if visited.len() >= MAX_PAGES {
            break;
        }
        let Some((url, current_depth)) = queue.pop_front() else {
            break;
        };
        if visited.contains(&url) {
            continue;
        }
        visited.insert(url.clone());

        let page = scrape_page(&session, &url);
        if current_depth < depth {
            for link in &page.links {
                if host_of(&link.href).as_deref() == Some(base_domain.as_str())
                    && !visited.contains(&link.href)
                {
                    queue.push_back((link.href.clone(), current_depth + 1));
                }
            }
        }
        pages.push(page);
    }

    eprintln!("[Explorer] ✔ Crawled {} page(s).", pages.len());
    Ok(SiteMap { start_url, pages })
}

fn scrape_page(session: &BrowserSession, url: &str) -> Page {
    match extract_page(session, url) {
        Ok(page) => {
            eprintln!("[Explorer] ✔ {} ({} forms, {} links)", url, page.forms.len(), page.links.len());
            page
        }
        Err(e) => {
            eprintln!("[Explorer] ✘ {url}: {e:#}");
            Page {
                url: url.to_string(),
                title: "Error".to_string(),
                error: Some(format!("{e:#}")),
                forms: vec![],
                links: vec![],
            }
        }
    }
}

fn extract_page(session: &BrowserSession, url: &str) -> Result<Page> {
    let tab = &session.tab;
    tab.navigate_to(url)?;
    tab.wait_for_element_with_custom_timeout("body", NAV_TIMEOUT)?;

    let result = tab.evaluate(EXTRACT_JS, false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .ok_or_else(|| anyhow!("extraction script returned no data"))?;
    let extracted: ExtractedPage = serde_json::from_str(&raw)?;

    Ok(Page {
        url: url.to_string(),
        title: extracted.title,
        error: None,
        forms: extracted.forms,
        links: extracted.links,
    })
}

/// Prefix bare hostnames with https://.
pub fn normalise_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Host part of a URL, lowercased. None when the string has no scheme.
pub fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_adds_scheme_once() {
        assert_eq!(normalise_url("example.com"), "https://example.com");
        assert_eq!(normalise_url("  http://example.com "), "http://example.com");
        assert_eq!(normalise_url("https://example.com/login"), "https://example.com/login");
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://Example.COM/a/b?q=1"), Some("example.com".into()));
        assert_eq!(host_of("http://localhost:8080/x"), Some("localhost:8080".into()));
        assert_eq!(host_of("not a url"), None);
        assert_eq!(host_of("https:///nohost"), None);
    }

    #[test]
    fn extracted_page_parses_script_output() {
        let raw = r#"{
            "title": "Login",
            "forms": [{
                "name": "login",
                "action": "/session",
                "method": "POST",
                "fields": [{"name": "email", "type": "email", "required": true, "placeholder": ""}],
                "buttons": [{"text": "Sign in", "type": "submit"}]
            }],
            "links": [{"text": "Forgot password?", "href": "https://x.test/reset"}]
        }"#;
        let page: ExtractedPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.title, "Login");
        assert_eq!(page.forms[0].fields[0].kind, "email");
        assert_eq!(page.links.len(), 1);
    }

    // Live crawl against a real site; needs Chrome on the machine.
    #[test]
    #[ignore]
    fn live_crawl_start_page_only() {
        let site = explore("https://example.com", 0).expect("crawl");
        assert_eq!(site.pages.len(), 1);
        assert!(site.pages[0].error.is_none());
    }
}
