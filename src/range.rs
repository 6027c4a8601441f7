//! `Range` request header parsing.
//!
//! Only single byte ranges are served. When a client asks for several ranges
//! the first one wins and the rest are ignored.

/// Inclusive byte interval `[start, end]` of a file of `size` bytes.
///
/// Always satisfies `start <= end < size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub size: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.size)
    }
}

/// Parse a `Range` header against a file of `size` bytes.
///
/// Returns `None` when the header is malformed or the range cannot be
/// satisfied; the caller must answer 416 without opening the file.
pub fn parse_range(header: &str, size: u64) -> Option<ByteRange> {
    let ranges = header.trim().strip_prefix("bytes=")?;
    let first = ranges.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;

    let start = parse_bound(start)?;
    let end = parse_bound(end)?;

    let (start, end) = match (start, end) {
        (None, None) => return None,
        // bytes=-N: the last N bytes
        (None, Some(suffix)) => {
            if suffix == 0 || suffix >= size {
                return None;
            }
            (size - suffix, size - 1)
        }
        // bytes=N-: from N to the end
        (Some(start), None) => {
            if start >= size {
                return None;
            }
            (start, size - 1)
        }
        (Some(start), Some(end)) => {
            if end >= size || start > end {
                return None;
            }
            (start, end)
        }
    };

    Some(ByteRange { start, end, size })
}

/// `Some(None)` for an absent bound, `None` for garbage.
fn parse_bound(value: &str) -> Option<Option<u64>> {
    let value = value.trim();
    if value.is_empty() {
        return Some(None);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok().map(Some)
}
