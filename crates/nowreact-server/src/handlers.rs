//! REST endpoint handlers for the canvas.
//!
//! All handlers go through the shared [`StateStore`](nowreact_core::StateStore)
//! held in [`AppState`]. Paths match the ones the web client already uses.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page with a read-only canvas |
//! | `GET` | `/status` | Current height |
//! | `GET` | `/getSquare` | All cells, row-major |
//! | `POST` | `/postEmoji` | Set one cell |

use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use nowreact_types::{HeightResponse, Submission};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the canvas and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.load().await;
    let height = snapshot.height;
    let namespace = escape_html(&snapshot.namespace);
    let side = snapshot.grid.size().side();
    let cell_count = snapshot.grid.cells().len();
    let filled = snapshot.grid.filled();

    let mut cells = String::new();
    for cell in snapshot.grid.cells() {
        let _ = write!(cells, "<div class=\"cell\">{}</div>", escape_html(cell));
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>nowreact</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        .grid {{
            display: grid;
            grid-template-columns: repeat({side}, 1.75rem);
            gap: 1px;
            background: #30363d;
            width: max-content;
        }}
        .cell {{
            background: #161b22;
            height: 1.75rem;
            text-align: center;
            line-height: 1.75rem;
            overflow: hidden;
        }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>nowreact</h1>
    <p class="subtitle">Namespace {namespace}</p>

    <div>
        <div class="metric">
            <div class="label">Height</div>
            <div class="value">{height}</div>
        </div>
        <div class="metric">
            <div class="label">Cells</div>
            <div class="value">{cell_count}</div>
        </div>
        <div class="metric">
            <div class="label">Filled</div>
            <div class="value">{filled}</div>
        </div>
    </div>

    <hr>

    <div class="grid">{cells}</div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li>GET <a href="/status">/status</a> -- Current height</li>
        <li>GET <a href="/getSquare">/getSquare</a> -- All cells</li>
        <li>POST /postEmoji -- <code>{{"emoji": "...", "index": n}}</code></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /status -- current height
// ---------------------------------------------------------------------------

/// Return the current canvas height.
pub async fn get_height(State(state): State<Arc<AppState>>) -> Json<HeightResponse> {
    Json(HeightResponse {
        height: state.store.height().await,
    })
}

// ---------------------------------------------------------------------------
// GET /getSquare -- all cells
// ---------------------------------------------------------------------------

/// Return every cell in row-major order.
pub async fn get_square(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.store.cells().await)
}

// ---------------------------------------------------------------------------
// POST /postEmoji -- set one cell
// ---------------------------------------------------------------------------

/// Set one cell from a [`Submission`].
///
/// An undecodable body is rejected before the store is touched. The
/// checkpointer picks the change up from the store's revision counter.
///
/// # Errors
///
/// - [`ApiError::MalformedRequest`] if the body is not a submission.
/// - [`ApiError::InvalidIndex`] if the index is outside the grid.
pub async fn post_emoji(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(submission) = payload?;
    state
        .store
        .set_cell(submission.index, submission.emoji)
        .await?;
    Ok(StatusCode::OK)
}

/// Escape text for inclusion in HTML element content.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
