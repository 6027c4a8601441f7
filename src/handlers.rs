use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::GatewayError;
use crate::jail::{self, ResolvedPath};
use crate::listing::list_directory;
use crate::pages;
use crate::range::parse_range;
use crate::stream::stream_file;
use crate::upload::receive_upload;
use crate::ws;
use crate::AppState;

/// Query parameters understood on any path
#[derive(Debug, Deserialize, Default)]
pub struct PathQuery {
    /// Present: serve the live follow page instead of the file
    pub tail_f: Option<String>,
    /// Present: list a directory as JSON instead of HTML
    pub json: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Every request lands here: upgrades, downloads, listings and uploads.
pub async fn dispatch(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, GatewayError> {
    if ws::is_upgrade_request(req.headers()) {
        return ws::upgrade(state, req).await;
    }

    if req.method() == Method::GET
        && req.uri().path_and_query().map(|pq| pq.as_str()) == Some("/?stamp=now")
    {
        return Ok(datestamp());
    }

    let query = Query::<PathQuery>::try_from_uri(req.uri())
        .map(|Query(query)| query)
        .unwrap_or_default();
    // Request bodies are not Sync; keep borrows of `req` off await points
    let url_path = req.uri().path().to_string();
    let resolved = jail::resolve(&url_path, &state.root_dir).await?;

    let method = req.method().clone();
    match method {
        Method::GET => {
            let range = req.headers().get(header::RANGE).cloned();
            get_path(&state, resolved, &query, range).await
        }
        Method::POST => upload(state, resolved, req).await,
        _ => Err(GatewayError::MethodNotAllowed),
    }
}

/// GET /?stamp=now - current server time
fn datestamp() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    )
        .into_response()
}

/// GET /<path> - directory listing, follow page, or file bytes
async fn get_path(
    state: &AppState,
    resolved: ResolvedPath,
    query: &PathQuery,
    range: Option<HeaderValue>,
) -> Result<Response, GatewayError> {
    let request = &resolved.request;

    if resolved.metadata.is_dir() {
        let entries = list_directory(&request.absolute, &request.url_path(), &state.config).await?;
        if query.json.is_some() {
            return Ok(Json(entries).into_response());
        }
        let title = format!("{}/", request.decoded);
        let html = pages::index_page(&title, &entries).map_err(render_error)?;
        return Ok(Html(html).into_response());
    }

    if !resolved.metadata.is_file() {
        return Err(GatewayError::NotAFile(request.display()));
    }

    if query.tail_f.is_some() {
        let html =
            pages::tail_f_page(&request.url_path(), &request.url_path()).map_err(render_error)?;
        return Ok(Html(html).into_response());
    }

    let size = resolved.metadata.len();
    let range = match range {
        None => None,
        Some(value) => {
            let range = value.to_str().ok().and_then(|value| parse_range(value, size));
            if range.is_none() {
                debug!("download: unsatisfiable range {:?} for {}", value, request.display());
                return Err(GatewayError::RangeNotSatisfiable { size });
            }
            range
        }
    };

    stream_file(&request.absolute, size, range).await
}

/// POST /<dir> - upload the multipart field `up` into a directory
async fn upload(
    state: AppState,
    resolved: ResolvedPath,
    req: Request,
) -> Result<Response, GatewayError> {
    if !resolved.metadata.is_dir() {
        return Err(GatewayError::NotADirectory(resolved.request.display()));
    }

    let multipart = Multipart::from_request(req, &state).await.map_err(|e| {
        error!("upload: {}/ failed: {}", resolved.request.display(), e.body_text());
        GatewayError::Upload(e.body_text())
    })?;

    let path = receive_upload(&resolved.request, multipart, state.config.max_upload_size).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        format!("{} uploaded.", path),
    )
        .into_response())
}

fn render_error(err: serde_json::Error) -> GatewayError {
    GatewayError::Io(std::io::Error::other(err))
}
