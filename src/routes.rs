use axum::{extract::DefaultBodyLimit, routing::any, Router};

use crate::handlers;
use crate::AppState;

/// Create gateway routes: every path of the served tree goes through dispatch
pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/", any(handlers::dispatch))
        .route("/*path", any(handlers::dispatch))
        // Upload size is enforced while streaming to disk
        .layer(DefaultBodyLimit::disable())
}
