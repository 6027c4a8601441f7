//! Containment of request paths inside the served root.
//!
//! A URL path is turned into a filesystem path twice: once by joining the
//! decoded path straight onto the root, and once by first normalizing it into
//! a relative path (where `..` can never climb above the top) and joining
//! that. Both derivations agree only when the request stays inside the root,
//! so any disagreement is a jail violation. This check is purely lexical and
//! runs before the filesystem is touched.

use std::ffi::OsString;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::warn;

use crate::error::GatewayError;

/// A URL path that passed the lexical containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    /// Percent-decoded URL path without a trailing separator (`""` for the root).
    pub decoded: String,
    /// Normalized path relative to the root (`"."` for the root itself).
    pub relative: PathBuf,
    /// Absolute path inside the root.
    pub absolute: PathBuf,
}

/// A request path that exists and is readable.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub request: RequestPath,
    pub metadata: Metadata,
}

impl RequestPath {
    pub fn parse(url_path: &str, root: &Path) -> Result<Self, GatewayError> {
        let decoded = urlencoding::decode(url_path)
            .map_err(|_| GatewayError::InvalidPath(url_path.to_string()))?
            .into_owned();

        if decoded.contains('\0') {
            warn!("Path contains null byte: {:?}", url_path);
            return Err(GatewayError::PathTraversal);
        }

        let decoded = match decoded.strip_suffix('/') {
            Some(stripped) => stripped.to_string(),
            None => decoded,
        };

        let relative = normalize_relative(Path::new(&decoded))?;
        let direct = lexical_join(root, Path::new(&decoded));
        let jailed = lexical_join(root, &relative);

        if direct != jailed || !jailed.starts_with(root) {
            warn!(
                "Jail break attempt: {:?} resolves to {:?}, outside {:?}",
                url_path, direct, root
            );
            return Err(GatewayError::PathTraversal);
        }

        Ok(Self {
            decoded,
            relative,
            absolute: jailed,
        })
    }

    /// URL path of this entry, always starting with `/`.
    pub fn url_path(&self) -> String {
        format!("/{}", self.decoded.trim_start_matches('/'))
    }

    /// Human readable path relative to the root, as used in response messages.
    pub fn display(&self) -> String {
        self.relative.to_string_lossy().to_string()
    }
}

/// Resolve a URL path and verify it exists and is readable.
pub async fn resolve(url_path: &str, root: &Path) -> Result<ResolvedPath, GatewayError> {
    let request = RequestPath::parse(url_path, root)?;

    let metadata = fs::metadata(&request.absolute)
        .await
        .map_err(|e| GatewayError::NotFound(e.to_string()))?;

    // Symlinks may still point outside the root
    let canonical = fs::canonicalize(&request.absolute)
        .await
        .map_err(|e| GatewayError::NotFound(e.to_string()))?;
    if !canonical.starts_with(root) {
        warn!(
            "Symlink escape attempt: {:?} resolved to {:?} which is outside {:?}",
            request.absolute, canonical, root
        );
        return Err(GatewayError::PathTraversal);
    }

    check_readable(&request.absolute, &metadata)
        .await
        .map_err(|e| GatewayError::NotFound(e.to_string()))?;

    Ok(ResolvedPath { request, metadata })
}

async fn check_readable(path: &Path, metadata: &Metadata) -> std::io::Result<()> {
    if metadata.is_dir() {
        fs::read_dir(path).await.map(|_| ())
    } else if metadata.is_file() {
        fs::File::open(path).await.map(|_| ())
    } else {
        // Opening a FIFO would block until a writer shows up
        Ok(())
    }
}

/// Normalize `./<path>`: leading separators are dropped and `..` never
/// survives, even at the top.
fn normalize_relative(path: &Path) -> Result<PathBuf, GatewayError> {
    let mut parts: Vec<OsString> = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_os_string()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir => {}
            Component::Prefix(_) => return Err(GatewayError::PathTraversal),
        }
    }

    if parts.is_empty() {
        return Ok(PathBuf::from("."));
    }
    Ok(parts.iter().collect())
}

/// Join `tail` onto `base` and collapse `.`/`..` without touching the
/// filesystem. Unlike [`normalize_relative`], `..` may climb above `base`.
pub(crate) fn lexical_join(base: &Path, tail: &Path) -> PathBuf {
    let mut result = base.to_path_buf();

    for component in tail.components() {
        match component {
            Component::Normal(name) => result.push(name),
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    result
}
