//! Browser UI
//!
//! `GET /ui` renders every batch with its recordings as a single HTML
//! page. The key is entered in the page and carried as a query parameter.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::status::BatchStatusReader;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UiQuery {
    pub key: Option<String>,
}

fn key_form_page(error: Option<&str>) -> String {
    let error_html = match error {
        Some(msg) => format!(r#"<p class="error">{}</p>"#, msg),
        None => String::new(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Recbatch Ingest</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            padding: 24px;
        }}
        input, button {{ padding: 8px; }}
        .error {{ color: #e05555; }}
    </style>
</head>
<body>
    <h2>Enter API key</h2>
    {error_html}
    <form method="GET" action="/ui">
        <input type="password" name="key" placeholder="X-API-Key" />
        <button type="submit">Open</button>
    </form>
</body>
</html>
"#
    )
}

/// GET /ui
pub async fn ui_page(
    State(state): State<AppState>,
    Query(query): Query<UiQuery>,
) -> ApiResult<Response> {
    let key = match query.key {
        Some(key) => key,
        None => return Ok(Html(key_form_page(None)).into_response()),
    };
    if key != state.config.api_key {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(key_form_page(Some("Invalid key"))),
        )
            .into_response());
    }

    let reader = BatchStatusReader::new(state.db.clone());
    let batches = reader.list_batches().await?;

    let mut sections = String::new();
    for batch in &batches {
        let mut rows = String::new();
        for rec in &batch.recordings {
            let metadata = serde_json::to_string_pretty(&rec.metadata)
                .unwrap_or_else(|_| "{}".to_string());
            rows.push_str(&format!(
                r#"<tr>
              <td>{id}</td>
              <td><code>{blob_ref}</code></td>
              <td>{content_type}</td>
              <td>{byte_length}</td>
              <td><pre>{metadata}</pre></td>
              <td><audio controls src="/media/{id}?key={key}"></audio></td>
            </tr>
"#,
                id = rec.recording_id,
                blob_ref = rec.blob_ref,
                content_type = rec.content_type.as_deref().unwrap_or(""),
                byte_length = rec.byte_length.unwrap_or(0),
                metadata = metadata,
                key = key,
            ));
        }
        if rows.is_empty() {
            rows = r#"<tr><td colspan="6">No recordings in this batch yet.</td></tr>"#.to_string();
        }
        sections.push_str(&format!(
            r#"<section>
          <h2>Batch: {batch_id} <small>({status})</small></h2>
          <table>
            <thead>
              <tr><th>Recording</th><th>Blob ref</th><th>Type</th><th>Size</th><th>Metadata</th><th>Preview</th></tr>
            </thead>
            <tbody>
              {rows}
            </tbody>
          </table>
        </section>
"#,
            batch_id = batch.batch_id,
            status = batch.status.as_str(),
            rows = rows,
        ));
    }
    if sections.is_empty() {
        sections = "<p>No batches yet.</p>".to_string();
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Recbatch Ingest</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            padding: 24px;
            line-height: 1.6;
        }}
        section {{
            margin: 20px 0;
            border: 1px solid #3a3a3a;
            border-radius: 8px;
            padding: 12px;
            background-color: #2a2a2a;
        }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ border: 1px solid #3a3a3a; padding: 6px; text-align: left; }}
        pre {{ margin: 0; }}
        small {{ color: #999; }}
    </style>
</head>
<body>
    <h1>Recordings (grouped by batch)</h1>
    {sections}
    <p><a href="/ui">Change key</a></p>
</body>
</html>
"#
    );

    Ok(Html(html).into_response())
}

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/ui", get(ui_page))
}
