use thiserror::Error;

/// Boxed cause carried by transport errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum GraphliftError {
    // Streaming contract errors
    #[error("invalid range: offset {offset} is not a multiple of {bytes_per_vector} bytes per vector")]
    InvalidRange { offset: u64, bytes_per_vector: usize },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    // Storage errors
    #[error("object already exists: {key}")]
    AlreadyExists { key: String },

    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("transfer failed for {key}: {source}")]
    Transfer {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("partial transfer of {key}: chunk {chunk} failed: {reason}")]
    PartialTransfer {
        key: String,
        chunk: usize,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("storage path error: {0}")]
    StoragePath(#[from] object_store::path::Error),

    // Build service errors
    #[error("build service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("job {job_id} did not finish within {elapsed_ms}ms")]
    PollTimeout { job_id: String, elapsed_ms: u64 },

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("job {job_id} completed without a result")]
    MissingResult { job_id: String },

    // Serialization errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // Local build errors
    #[error("local build failed: {0}")]
    LocalBuild(String),

    // Internal
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for GraphliftError {
    fn from(e: toml::de::Error) -> Self {
        GraphliftError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphliftError>;

impl GraphliftError {
    /// Wrap any transport failure with the key it was moving.
    pub fn transfer(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        GraphliftError::Transfer {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Misuse of the streaming contract. Never expected on production paths,
    /// since the orchestrator computes every offset itself.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            GraphliftError::InvalidRange { .. } | GraphliftError::UnsupportedOperation(_)
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphliftError::InvalidRange { .. } => "invalid_range",
            GraphliftError::UnsupportedOperation(_) => "unsupported_operation",
            GraphliftError::AlreadyExists { .. } => "already_exists",
            GraphliftError::NotFound { .. } => "not_found",
            GraphliftError::Transfer { .. } => "transfer",
            GraphliftError::PartialTransfer { .. } => "partial_transfer",
            GraphliftError::Storage(_) | GraphliftError::StoragePath(_) => "storage",
            GraphliftError::Service { .. } => "service",
            GraphliftError::Http(_) => "http",
            GraphliftError::PollTimeout { .. } => "poll_timeout",
            GraphliftError::JobFailed { .. } => "job_failed",
            GraphliftError::MissingResult { .. } => "missing_result",
            GraphliftError::Json(_) => "json",
            GraphliftError::Io(_) => "io",
            GraphliftError::Config(_) => "config",
            GraphliftError::LocalBuild(_) => "local_build",
            GraphliftError::Internal(_) => "internal",
        }
    }
}
