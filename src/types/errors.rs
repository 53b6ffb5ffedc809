use std::fmt;

// === StoreError ===

/// Errors raised by the persistent store.
///
/// Storage backend rejections propagate uncaught to the RPC boundary, which
/// converts them to an error response; nothing below retries them.
#[derive(Debug)]
pub enum StoreError {
    /// Database operation failed.
    Database(String),
    /// Failed to serialize or deserialize a stored record.
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Store database error: {}", msg),
            StoreError::Serialization(msg) => {
                write!(f, "Store serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StoreError {}

// === CompressionError ===

/// Errors raised while compressing tab data. Decompression never errors —
/// corrupt input degrades to an empty list or `None` at the call site.
#[derive(Debug)]
pub enum CompressionError {
    /// Serialization or codec failure on the compress path.
    Codec(String),
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::Codec(msg) => write!(f, "Compression error: {}", msg),
        }
    }
}

impl std::error::Error for CompressionError {}

// === WindowError ===

/// Errors related to the live window/tab model.
#[derive(Debug)]
pub enum WindowError {
    /// Window with the given ID was not found.
    WindowNotFound(String),
    /// Tab with the given ID was not found.
    TabNotFound(String),
    /// Tab group with the given ID was not found.
    GroupNotFound(i64),
    /// The provided tab index is out of bounds.
    InvalidIndex(usize),
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::WindowNotFound(id) => write!(f, "Window not found: {}", id),
            WindowError::TabNotFound(id) => write!(f, "Tab not found: {}", id),
            WindowError::GroupNotFound(id) => write!(f, "Tab group not found: {}", id),
            WindowError::InvalidIndex(index) => write!(f, "Invalid tab index: {}", index),
        }
    }
}

impl std::error::Error for WindowError {}

// === SessionError ===

/// Errors raised by session lifecycle operations.
#[derive(Debug)]
pub enum SessionError {
    /// Capture yielded zero valid tabs, so there is nothing to save.
    NoValidTabs,
    /// Emergency capture yielded zero tabs.
    NoTabsToBackup,
    /// Session with the given ID was not found.
    NotFound(String),
    /// Version with the given ID was not found in the session's history.
    VersionNotFound(String),
    /// Merging requires at least two source sessions.
    MergeRequiresTwo(usize),
    /// The stored tab data is inconsistent (e.g. an uncompressed session
    /// with no tabs but a leftover compressed blob).
    CorruptTabData(String),
    /// Underlying store failure.
    Storage(String),
    /// Live window/tab operation failed.
    Window(String),
    /// Compression failed while preparing the session body.
    Compression(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoValidTabs => write!(f, "No valid tabs to save"),
            SessionError::NoTabsToBackup => write!(f, "No tabs to backup"),
            SessionError::NotFound(id) => write!(f, "Session not found: {}", id),
            SessionError::VersionNotFound(id) => write!(f, "Version not found: {}", id),
            SessionError::MergeRequiresTwo(n) => {
                write!(f, "Need at least 2 sessions to merge, got {}", n)
            }
            SessionError::CorruptTabData(id) => {
                write!(f, "Corrupt tab data for session: {}", id)
            }
            SessionError::Storage(msg) => write!(f, "Session storage error: {}", msg),
            SessionError::Window(msg) => write!(f, "Session window error: {}", msg),
            SessionError::Compression(msg) => {
                write!(f, "Session compression error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SessionError {}

// === CrashError ===

/// Errors related to crash detection and emergency-backup scheduling.
#[derive(Debug)]
pub enum CrashError {
    /// Underlying store failure while reading or writing the crash marker.
    Storage(String),
    /// Failed to read or write the volatile running flag.
    Io(String),
}

impl fmt::Display for CrashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashError::Storage(msg) => write!(f, "Crash recovery storage error: {}", msg),
            CrashError::Io(msg) => write!(f, "Crash recovery I/O error: {}", msg),
        }
    }
}

impl std::error::Error for CrashError {}

// === PageStateError ===

/// Raised when the page-state provider cannot reach a page. Callers treat
/// this as "no data available", never as fatal.
#[derive(Debug)]
pub enum PageStateError {
    /// The page has no injectable content agent or is otherwise unreachable.
    Unavailable(String),
}

impl fmt::Display for PageStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStateError::Unavailable(msg) => {
                write!(f, "Page state unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for PageStateError {}
