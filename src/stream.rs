use std::io::SeekFrom;
use std::path::Path;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::range::ByteRange;

const OCTET_STREAM: &str = "application/octet-stream";

/// Stream a regular file of `size` bytes, or the `range` of it.
///
/// The body is pulled from disk only as fast as the client consumes it. A
/// read error mid-transfer ends the body with an error, which aborts the
/// connection; bytes already sent are not resent.
pub async fn stream_file(
    path: &Path,
    size: u64,
    range: Option<ByteRange>,
) -> Result<Response, GatewayError> {
    let mut file = fs::File::open(path).await.map_err(GatewayError::Io)?;

    match range {
        None => {
            info!("download: streaming {} to downloader...", path.display());

            // Log files keep growing; never send more than Content-Length promised
            let body = file_body(file.take(size), path);

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
                    (header::CONTENT_LENGTH, size.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response())
        }
        Some(range) => {
            info!(
                "download: streaming {} range {}-{} to downloader...",
                path.display(),
                range.start,
                range.end
            );

            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(GatewayError::Io)?;
            let body = file_body(file.take(range.content_length()), path);

            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
                    (header::CONTENT_RANGE, range.content_range()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                    (header::CONTENT_LENGTH, range.content_length().to_string()),
                ],
                body,
            )
                .into_response())
        }
    }
}

fn file_body<R>(reader: R, path: &Path) -> Body
where
    R: AsyncRead + Send + 'static,
{
    let path = path.display().to_string();
    let stream = ReaderStream::new(reader).inspect_err(move |err| {
        warn!(
            "download: error occurs during piping {} to http response: {}",
            path, err
        );
    });
    Body::from_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::parse_range;
    use tempfile::TempDir;

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn fixture(dir: &TempDir) -> (std::path::PathBuf, Vec<u8>) {
        let data: Vec<u8> = (0..100u8).collect();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, &data).unwrap();
        (path, data)
    }

    #[tokio::test]
    async fn test_full_file() {
        let dir = TempDir::new().unwrap();
        let (path, data) = fixture(&dir);

        let response = stream_file(&path, 100, None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::CONTENT_TYPE], OCTET_STREAM);
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_partial_content() {
        let dir = TempDir::new().unwrap();
        let (path, data) = fixture(&dir);
        let range = parse_range("bytes=10-19", 100);

        let response = stream_file(&path, 100, range).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 10-19/100");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert_eq!(body_bytes(response).await, data[10..20].to_vec());
    }

    #[tokio::test]
    async fn test_suffix_range_body() {
        let dir = TempDir::new().unwrap();
        let (path, data) = fixture(&dir);
        let range = parse_range("bytes=-3", 100);

        let response = stream_file(&path, 100, range).await.unwrap();
        assert_eq!(body_bytes(response).await, data[97..].to_vec());
    }

    #[tokio::test]
    async fn test_growing_file_is_cut_at_known_size() {
        let dir = TempDir::new().unwrap();
        let (path, data) = fixture(&dir);

        let response = stream_file(&path, 100, None).await.unwrap();
        std::fs::write(&path, [data.clone(), b"appended".to_vec()].concat()).unwrap();
        assert_eq!(body_bytes(response).await.len(), 100);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = stream_file(&dir.path().join("nope"), 0, None).await;
        assert!(matches!(result, Err(GatewayError::Io(_))));
    }
}
