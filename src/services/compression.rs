//! Compression codec for TabVault.
//!
//! Tab lists and whole sessions are stored as text: JSON-serialized,
//! zstd-compressed, then base64-wrapped so the result survives any
//! text-typed storage column. Decompression of corrupt input degrades to an
//! empty list / `None` instead of erroring — a damaged blob must never take
//! the rest of the store down with it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::warn;

use crate::types::errors::CompressionError;
use crate::types::session::Session;
use crate::types::tab::TabRecord;

/// Compresses a tab list to a text-safe string.
pub fn compress_tabs(tabs: &[TabRecord]) -> Result<String, CompressionError> {
    compress_value(&serde_json::to_vec(tabs).map_err(|e| CompressionError::Codec(e.to_string()))?)
}

/// Inverse of [`compress_tabs`]. Corrupt or invalid input returns an empty
/// list rather than an error.
pub fn decompress_tabs(data: &str) -> Vec<TabRecord> {
    match decompress_value(data) {
        Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!("discarding corrupt compressed tab list: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}

/// Compresses a whole session snapshot to a text-safe string.
pub fn compress_session(session: &Session) -> Result<String, CompressionError> {
    compress_value(
        &serde_json::to_vec(session).map_err(|e| CompressionError::Codec(e.to_string()))?,
    )
}

/// Inverse of [`compress_session`]. Corrupt or invalid input returns `None`.
pub fn decompress_session(data: &str) -> Option<Session> {
    let bytes = decompress_value(data)?;
    match serde_json::from_slice(&bytes) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("discarding corrupt compressed session: {}", e);
            None
        }
    }
}

/// True iff a tab list of this length should be stored compressed.
/// A threshold of zero means "always compress", including empty lists.
pub fn should_compress(tab_count: usize, threshold: usize) -> bool {
    tab_count >= threshold
}

/// Space saving as a percentage: `100 * (1 - compressed/original)`.
/// Zero when the original size is zero; negative when compression expanded
/// the data — telemetry, not an error.
pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    100.0 * (1.0 - compressed as f64 / original as f64)
}

fn compress_value(bytes: &[u8]) -> Result<String, CompressionError> {
    let compressed = zstd::encode_all(bytes, zstd::DEFAULT_COMPRESSION_LEVEL)
        .map_err(|e| CompressionError::Codec(e.to_string()))?;
    Ok(BASE64.encode(compressed))
}

fn decompress_value(data: &str) -> Option<Vec<u8>> {
    let raw = match BASE64.decode(data) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("compressed blob is not valid base64: {}", e);
            return None;
        }
    };
    match zstd::decode_all(raw.as_slice()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("compressed blob failed to inflate: {}", e);
            None
        }
    }
}
