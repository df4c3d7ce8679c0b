//! Web face: JSON API over the pipeline plus a single-page UI and an SSE
//! stream of execution progress events.

use anyhow::anyhow;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::analyst::Orchestrator;
use crate::config::Config;
use crate::executor::{ExecEvent, TestExecutor};
use crate::types::{ExecutionResult, ExecutionSummary, TestCase};
use crate::{explorer, generator, report};

pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub events: broadcast::Sender<ExecEvent>,
    pub last_report: Mutex<String>,
}

/// Bind the first free port starting at `port` and serve until shutdown.
pub async fn serve(config: Config, port: u16) -> anyhow::Result<()> {
    let (event_tx, _) = broadcast::channel::<ExecEvent>(64);
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(&config),
        config,
        events: event_tx,
        last_report: Mutex::new(String::new()),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/analyze", post(analyze_handler))
        .route("/explore", post(explore_handler))
        .route("/generate", post(generate_handler))
        .route("/execute", post(execute_handler))
        .route("/report", post(report_handler))
        .route("/report/download", get(download_handler))
        .route("/screenshots/{file}", get(screenshot_handler))
        .route("/events", get(sse_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state);

    let mut listener = None;
    for p in port..port + 10 {
        match tokio::net::TcpListener::bind(format!("127.0.0.1:{p}")).await {
            Ok(l) => {
                eprintln!("[Web] UI running at http://localhost:{p}");
                listener = Some(l);
                break;
            }
            Err(_) => continue,
        }
    }
    let listener = listener
        .ok_or_else(|| anyhow!("could not bind any port in {port}..{}", port + 10))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    story: String,
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    let story = req.story.trim().to_string();
    if story.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No user story provided.");
    }
    eprintln!("[Web] POST /analyze");
    let bundle = state.orchestrator.run(&story).await;
    Json(bundle).into_response()
}

#[derive(Deserialize)]
struct ExploreRequest {
    url: String,
    #[serde(default)]
    depth: Option<usize>,
}

async fn explore_handler(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<ExploreRequest>,
) -> Response {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No URL provided.");
    }
    eprintln!("[Web] POST /explore: {url}");
    let depth = req.depth.unwrap_or(1).min(2);
    match tokio::task::spawn_blocking(move || explorer::explore(&url, depth)).await {
        Ok(Ok(site)) => Json(site).into_response(),
        Ok(Err(e)) => error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("crawl task failed: {e}")),
    }
}

#[derive(Deserialize)]
struct GenerateRequest {
    story: String,
    url: String,
    #[serde(default)]
    depth: Option<usize>,
}

async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Response {
    let story = req.story.trim().to_string();
    let url = req.url.trim().to_string();
    if story.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No user story provided.");
    }
    if url.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No website URL provided.");
    }
    eprintln!("[Web] POST /generate: {url}");

    let bundle = state.orchestrator.run(&story).await;
    let depth = req.depth.unwrap_or(1).min(2);
    let site = match tokio::task::spawn_blocking(move || explorer::explore(&url, depth)).await {
        Ok(Ok(site)) => site,
        Ok(Err(e)) => return error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
        Err(e) => {
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("crawl task failed: {e}"))
        }
    };

    let test_cases = generator::generate(&bundle.analysis, &site);
    let summary = generator::summarize(&test_cases);
    Json(json!({
        "story_data": bundle.analysis,
        "page_data": site,
        "test_cases": test_cases,
        "summary": summary,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ExecuteRequest {
    test_cases: Vec<TestCase>,
    #[serde(default)]
    headless: Option<bool>,
}

async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Response {
    if req.test_cases.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No test cases provided.");
    }
    eprintln!("[Web] POST /execute: {} case(s)", req.test_cases.len());

    let headless = req.headless.unwrap_or(true);
    let mut executor = TestExecutor::new(state.config.screenshots_dir.clone(), headless)
        .with_events(state.events.clone());
    let test_cases = req.test_cases;
    match tokio::task::spawn_blocking(move || executor.execute_all(&test_cases)).await {
        Ok(Ok(results)) => {
            let summary = ExecutionSummary::from_results(&results);
            Json(json!({ "results": results, "summary": summary })).into_response()
        }
        Ok(Err(e)) => error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
        Err(e) => error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("execution task failed: {e}"),
        ),
    }
}

#[derive(Deserialize)]
struct ReportRequest {
    results: Vec<ExecutionResult>,
    #[serde(default)]
    summary: Option<ExecutionSummary>,
}

async fn report_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> Response {
    if req.results.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No execution results provided.");
    }
    eprintln!("[Web] POST /report: {} result(s)", req.results.len());
    let html = report::generate(&req.results, req.summary.as_ref(), &state.config.screenshots_dir);
    if let Ok(mut cached) = state.last_report.lock() {
        *cached = html.clone();
    }
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response()
}

async fn download_handler(State(state): State<Arc<AppState>>) -> Response {
    let cached = state.last_report.lock().map(|c| c.clone()).unwrap_or_default();
    if cached.is_empty() {
        return error_json(StatusCode::NOT_FOUND, "No report generated yet. Run /report first.");
    }
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=test_report.html",
            ),
        ],
        cached,
    )
        .into_response()
}

async fn screenshot_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(file): UrlPath<String>,
) -> Response {
    // Serve only plain filenames from the screenshots directory.
    if file.contains('/') || file.contains('\\') || file.contains("..") {
        return error_json(StatusCode::BAD_REQUEST, "Invalid screenshot name.");
    }
    match tokio::fs::read(state.config.screenshots_dir.join(&file)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => error_json(StatusCode::NOT_FOUND, "Screenshot not found."),
    }
}

fn event_to_sse(event: &ExecEvent) -> Event {
    match event {
        ExecEvent::CaseStarted { tc_id, condition } => Event::default()
            .event("case_started")
            .data(json!({ "tc_id": tc_id, "condition": condition }).to_string()),
        ExecEvent::CaseFinished {
            tc_id,
            status,
            duration_seconds,
        } => Event::default().event("case_finished").data(
            json!({ "tc_id": tc_id, "status": status, "duration_seconds": duration_seconds })
                .to_string(),
        ),
        ExecEvent::BatchFinished { summary } => Event::default()
            .event("batch_finished")
            .data(json!({ "summary": summary }).to_string()),
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<_, std::convert::Infallible>(event_to_sse(&event))),
        Err(_) => None,
    });
    Sse::new(stream)
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>StoryQA</title>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body {
    background: #0a0a0f;
    color: #e0e0e0;
    font-family: 'Segoe UI', system-ui, -apple-system, sans-serif;
    min-height: 100vh;
    display: flex;
    flex-direction: column;
  }
  header {
    padding: 20px 32px;
    border-bottom: 1px solid #1a1a2e;
    display: flex;
    align-items: center;
    gap: 12px;
  }
  header h1 { font-size: 20px; font-weight: 600; color: #fff; }
  header .dot {
    width: 8px; height: 8px;
    border-radius: 50%;
    background: #22c55e;
  }
  header .dot.busy { background: #f59e0b; }
  .main {
    flex: 1;
    display: flex;
    flex-direction: column;
    max-width: 920px;
    width: 100%;
    margin: 0 auto;
    padding: 24px 32px;
    gap: 14px;
  }
  textarea, input[type=text] {
    width: 100%;
    background: #111118;
    border: 1px solid #222;
    border-radius: 8px;
    padding: 12px 16px;
    color: #fff;
    font-size: 15px;
    outline: none;
  }
  textarea { min-height: 90px; resize: vertical; }
  textarea:focus, input:focus { border-color: #6366f1; }
  .row { display: flex; gap: 8px; align-items: center; }
  button {
    background: #6366f1;
    color: #fff;
    border: none;
    border-radius: 8px;
    padding: 10px 20px;
    font-size: 14px;
    font-weight: 600;
    cursor: pointer;
  }
  button:hover { background: #4f46e5; }
  button:disabled { background: #333; cursor: not-allowed; }
  button.secondary { background: #1a1a2e; }
  #log {
    display: flex;
    flex-direction: column;
    gap: 8px;
  }
  .entry {
    padding: 10px 14px;
    border-radius: 8px;
    font-size: 13px;
    line-height: 1.5;
    background: #111118;
    border-left: 3px solid #3b82f6;
    font-family: 'Cascadia Code', 'Fira Code', monospace;
    white-space: pre-wrap;
  }
  .entry.error { border-left-color: #ef4444; color: #fca5a5; background: #1a0a0a; }
  .entry.ok { border-left-color: #22c55e; color: #86efac; background: #0a1a0a; }
  .entry.fail { border-left-color: #ef4444; }
</style>
</head>
<body>
  <header>
    <div class="dot" id="status-dot"></div>
    <h1>StoryQA</h1>
  </header>
  <div class="main">
    <textarea id="story" placeholder="Paste a user story, e.g. 'As a user, I want to log in so that I can see my dashboard.'"></textarea>
    <div class="row">
      <input type="text" id="url" placeholder="https://example.com/login" />
      <select id="depth">
        <option value="0">Depth 0</option>
        <option value="1" selected>Depth 1</option>
        <option value="2">Depth 2</option>
      </select>
    </div>
    <div class="row">
      <button id="generate" onclick="generate()">Generate Test Cases</button>
      <button id="execute" onclick="execute()" disabled>Execute</button>
      <button id="report" class="secondary" onclick="buildReport()" disabled>Report</button>
      <label style="font-size:13px;color:#888"><input type="checkbox" id="headless" checked /> headless</label>
    </div>
    <div id="log"></div>
  </div>
<script>
  const log = document.getElementById('log');
  const dot = document.getElementById('status-dot');
  let testCases = null;
  let results = null;

  function addEntry(cls, text) {
    const div = document.createElement('div');
    div.className = 'entry ' + cls;
    div.textContent = text;
    log.prepend(div);
    return div;
  }

  function setBusy(b) {
    dot.className = b ? 'dot busy' : 'dot';
    for (const id of ['generate', 'execute', 'report']) {
      document.getElementById(id).disabled = b;
    }
    if (!b) {
      document.getElementById('execute').disabled = !testCases;
      document.getElementById('report').disabled = !results;
    }
  }

  async function post(path, body) {
    const resp = await fetch(path, {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify(body),
    });
    if (!resp.ok) {
      const err = await resp.json().catch(() => ({error: resp.statusText}));
      throw new Error(err.error || resp.statusText);
    }
    return resp;
  }

  async function generate() {
    setBusy(true);
    try {
      const resp = await post('/generate', {
        story: document.getElementById('story').value,
        url: document.getElementById('url').value,
        depth: parseInt(document.getElementById('depth').value, 10),
      });
      const data = await resp.json();
      testCases = data.test_cases;
      results = null;
      const s = data.summary;
      addEntry('ok', 'Generated ' + s.total + ' test case(s): ' + s.mapped + ' mapped, ' + s.unmapped + ' unmapped.');
      for (const tc of data.test_cases) {
        addEntry('', tc.tc_id + ' [' + tc.type + '/' + tc.priority + '] ' + tc.condition +
          (tc.mapped ? '\n  page: ' + tc.page_url + '  form: ' + tc.form_name : '\n  (unmapped)'));
      }
    } catch (e) {
      addEntry('error', 'Generation failed: ' + e.message);
    } finally {
      setBusy(false);
    }
  }

  async function execute() {
    if (!testCases) return;
    setBusy(true);
    try {
      const resp = await post('/execute', {
        test_cases: testCases,
        headless: document.getElementById('headless').checked,
      });
      const data = await resp.json();
      results = data.results;
      const s = data.summary;
      addEntry('ok', 'Execution done: ' + s.passed + ' passed, ' + s.failed + ' failed, ' + s.errored + ' errored.');
    } catch (e) {
      addEntry('error', 'Execution failed: ' + e.message);
    } finally {
      setBusy(false);
    }
  }

  async function buildReport() {
    if (!results) return;
    try {
      await post('/report', {results: results});
      window.open('/report/download', '_blank');
    } catch (e) {
      addEntry('error', 'Report failed: ' + e.message);
    }
  }

  const es = new EventSource('/events');
  es.addEventListener('case_started', e => {
    const d = JSON.parse(e.data);
    addEntry('', '▶ ' + d.tc_id + ': ' + d.condition);
  });
  es.addEventListener('case_finished', e => {
    const d = JSON.parse(e.data);
    const cls = d.status === 'Pass' ? 'ok' : 'fail';
    addEntry(cls, d.tc_id + ' → ' + d.status + ' (' + d.duration_seconds + 's)');
  });
  es.addEventListener('batch_finished', e => {
    const d = JSON.parse(e.data).summary;
    addEntry('ok', 'Batch finished: ' + d.passed + '/' + d.total + ' passed.');
  });

  addEntry('ok', 'StoryQA ready. Paste a story and a URL, then generate.');
</script>
</body>
</html>
"##;
