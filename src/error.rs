use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    NotFound(String),

    #[error("Not allowed to break the jail")]
    PathTraversal,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("File can only be uploaded to a directory, but {0} is not.")]
    NotADirectory(String),

    #[error("{0} is neither directory nor regular file.")]
    NotAFile(String),

    #[error("No file selected yet to be uploaded")]
    NoFileSelected,

    #[error("Range Not Satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("{0}")]
    Upload(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("WebSocket upgrade rejected")]
    UpgradeRejected,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::PathTraversal
            | GatewayError::NotADirectory(_)
            | GatewayError::NotAFile(_)
            | GatewayError::NoFileSelected
            | GatewayError::MethodNotAllowed
            | GatewayError::UpgradeRejected => StatusCode::FORBIDDEN,
            GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            GatewayError::Io(_) | GatewayError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            GatewayError::MethodNotAllowed | GatewayError::UpgradeRejected => {
                status.into_response()
            }
            GatewayError::RangeNotSatisfiable { size } => (
                status,
                [
                    (header::CONTENT_TYPE, "text/plain; charset=UTF-8".to_string()),
                    (header::CONTENT_RANGE, format!("bytes */{}", size)),
                ],
                self.to_string(),
            )
                .into_response(),
            _ => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
                self.to_string(),
            )
                .into_response(),
        }
    }
}
