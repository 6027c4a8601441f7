//! Test utilities and common setup.

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use tailserve::{AppState, Config};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----tailserve-test-boundary";

/// A served root in a temporary directory and the router serving it.
pub struct TestGateway {
    pub dir: TempDir,
    pub app: Router,
}

impl TestGateway {
    pub fn root(&self) -> std::path::PathBuf {
        self.dir.path().canonicalize().unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

/// Create a test application over a fresh empty root.
pub fn test_app() -> TestGateway {
    test_app_with_config(Config::default())
}

pub fn test_app_with_config(config: Config) -> TestGateway {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let app = tailserve::app(AppState::with_config(root, config));
    TestGateway { dir, app }
}

/// Multipart body with one file field.
pub fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(Method::POST)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
