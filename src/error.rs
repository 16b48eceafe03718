use std::path::PathBuf;

/// Every way a chart request can fail.
///
/// Only `RequestValidation` is the caller's fault; the transport turns it into a 400.
/// `ResourceLoad` is normally logged and swallowed by the renderer, it only escapes
/// when a resource the document cannot do without (the layout file) is missing.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("badly formed request: {0}")]
    RequestValidation(String),
    #[error("invalid layout configuration: {0}")]
    ConfigValidation(String),
    #[error("failed to load {}: {source}", path.display())]
    ResourceLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write PDF: {0}")]
    Pdf(String),
    #[error("rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ChartError {
    pub fn is_bad_request(&self) -> bool {
        matches!(self, ChartError::RequestValidation(_))
    }
}

pub type ChartResult<T> = std::result::Result<T, ChartError>;
