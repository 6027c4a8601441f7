use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::GatewayError;
use crate::jail::{lexical_join, RequestPath};

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "up";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store the `up` field of `multipart` in the directory `dir` under the
/// client-declared file name.
///
/// The caller must have checked that `dir` is a directory. Returns the path
/// of the new file relative to the served root.
pub async fn receive_upload(
    dir: &RequestPath,
    mut multipart: Multipart,
    max_size: u64,
) -> Result<String, GatewayError> {
    info!("upload: {}/ receiving a new upload...", dir.display());

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("upload: {}/ failed: {}", dir.display(), e);
        GatewayError::Upload(e.to_string())
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        return store_field(dir, field, max_size).await;
    }

    Err(GatewayError::NoFileSelected)
}

async fn store_field(
    dir: &RequestPath,
    field: Field<'_>,
    max_size: u64,
) -> Result<String, GatewayError> {
    let declared = field.file_name().unwrap_or_default().to_string();
    if declared.is_empty() {
        return Err(GatewayError::NoFileSelected);
    }

    let staged = dir.absolute.join(staging_name());
    let size = match stage(&staged, field, max_size).await {
        Ok(size) => size,
        Err(err) => {
            discard(&staged).await;
            return Err(err);
        }
    };

    // The declared name must not move the file out of the target directory
    let target = lexical_join(&dir.absolute, Path::new(&declared));
    if staged.parent() != target.parent() {
        warn!(
            "upload: declared name {:?} escapes {}",
            declared,
            dir.absolute.display()
        );
        discard(&staged).await;
        return Err(GatewayError::PathTraversal);
    }

    if let Err(err) = fs::rename(&staged, &target).await {
        discard(&staged).await;
        return Err(GatewayError::Io(err));
    }

    let relative = relative_display(&dir.relative, &target);
    info!("upload: finished {} ({} bytes)", relative, size);
    Ok(relative)
}

async fn stage(path: &Path, mut field: Field<'_>, max_size: u64) -> Result<u64, GatewayError> {
    let mut file = fs::File::create(path).await.map_err(GatewayError::Io)?;

    let mut total_size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        error!("upload: failed to read upload data: {}", e);
        GatewayError::Upload(e.to_string())
    })? {
        total_size = total_size.saturating_add(chunk.len() as u64);
        if total_size > max_size {
            return Err(GatewayError::FileTooLarge {
                size: total_size,
                limit: max_size,
            });
        }
        file.write_all(&chunk).await.map_err(GatewayError::Io)?;
    }
    file.flush().await.map_err(GatewayError::Io)?;

    Ok(total_size)
}

async fn discard(staged: &Path) {
    if let Err(err) = fs::remove_file(staged).await {
        warn!("upload: could not remove {}: {}", staged.display(), err);
    }
}

fn staging_name() -> String {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(".upload-{}-{}-{}", std::process::id(), nonce, seq)
}

fn relative_display(dir: &Path, target: &Path) -> String {
    let name = target
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default();
    if dir == Path::new(".") {
        name.to_string_lossy().to_string()
    } else {
        dir.join(name).to_string_lossy().to_string()
    }
}
