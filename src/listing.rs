use std::path::Path;
use std::time::UNIX_EPOCH;

use futures::future::join_all;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GatewayError;

/// One child of a listed directory
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub href: String,
    pub kind: EntryKind,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
    /// Offers the live follow view
    pub follow: bool,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Unreadable,
}

/// List `dir` in filesystem enumeration order.
///
/// `url_dir` is the URL path of `dir` and is used to build each entry's
/// href. Entries are stat'ed concurrently; an entry that cannot be stat'ed
/// is reported as [`EntryKind::Unreadable`] instead of failing the listing.
pub async fn list_directory(
    dir: &Path,
    url_dir: &str,
    config: &Config,
) -> Result<Vec<DirectoryEntry>, GatewayError> {
    let mut reader = fs::read_dir(dir)
        .await
        .map_err(|e| GatewayError::NotFound(e.to_string()))?;

    let mut names = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| GatewayError::NotFound(e.to_string()))?
    {
        names.push(entry.file_name().to_string_lossy().to_string());
    }

    debug!("directory: {} has {} entries", dir.display(), names.len());

    let stats = names
        .into_iter()
        .map(|name| stat_entry(dir, url_dir, name, config));
    Ok(join_all(stats).await)
}

async fn stat_entry(dir: &Path, url_dir: &str, name: String, config: &Config) -> DirectoryEntry {
    let path = dir.join(&name);
    let href = entry_href(url_dir, &name);

    let metadata = match fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!("directory: stat({}) failed: {}", path.display(), err);
            return DirectoryEntry {
                name,
                href,
                kind: EntryKind::Unreadable,
                size: 0,
                modified: None,
                follow: false,
            };
        }
    };

    // FIFOs, sockets and devices can never be downloaded
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else if metadata.is_file() {
        EntryKind::File
    } else {
        EntryKind::Unreadable
    };

    let follow = metadata.is_file()
        && config.is_followable(&name)
        && fs::File::open(&path).await.is_ok();

    DirectoryEntry {
        name,
        href,
        kind,
        size: metadata.len(),
        modified: metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs()),
        follow,
    }
}

/// Percent-encoded URL path of `name` inside the directory at `url_dir`.
pub fn entry_href(url_dir: &str, name: &str) -> String {
    let mut href = String::new();
    for segment in url_dir.split('/').filter(|s| !s.is_empty()) {
        href.push('/');
        href.push_str(&urlencoding::encode(segment));
    }
    href.push('/');
    href.push_str(&urlencoding::encode(name));
    href
}
