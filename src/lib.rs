//! Directory gateway: browse, download (with ranges), upload, and follow
//! growing log files live in the browser.
//!
//! Every path a request names is confined to the served root by [`jail`]
//! before anything touches the filesystem.

pub mod config;
pub mod error;
pub mod handlers;
pub mod jail;
pub mod listing;
pub mod pages;
pub mod range;
pub mod routes;
pub mod stream;
pub mod upload;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::GatewayError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Canonical root directory; nothing outside it is ever served
    pub root_dir: PathBuf,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState with the given root directory and default config.
    pub fn new(root_dir: PathBuf) -> Self {
        Self::with_config(root_dir, Config::default())
    }

    /// Create a new AppState with the given root directory and config.
    ///
    /// The root is canonicalized when it exists, since containment checks
    /// compare canonical paths against it.
    pub fn with_config(root_dir: PathBuf, config: Config) -> Self {
        let root_dir = std::fs::canonicalize(&root_dir).unwrap_or(root_dir);
        Self {
            root_dir,
            config: Arc::new(config),
        }
    }
}

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::file_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
