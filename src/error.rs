/// Request-level failures. Anything that only affects a single packet is
/// absorbed by the pipeline and never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum SeqError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("packet source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("retained sequence values exceeded limit of {limit}")]
    RetainedOverflow { limit: usize },
    #[error("capture download failed: {0}")]
    Acquire(String),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Errors reported by a packet source for a single read.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The record could not be read; the caller skips it and keeps going.
    #[error("unreadable packet record: {0}")]
    Transient(String),
    /// The source cannot continue.
    #[error("{0}")]
    Fatal(String),
}
