use thiserror::Error;

/// Per-document failure. None of these abort a batch.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unsupported document format: {name}")]
    UnsupportedFormat { name: String },

    #[error("text extraction failed for {name}: {reason}")]
    ExtractionFailure { name: String, reason: String },

    #[error("scoring service failed after {attempts} attempt(s): {source}")]
    ScoringServiceFailure {
        attempts: u32,
        #[source]
        source: ScoringError,
    },

    #[error("malformed scoring response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("schema violation at `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("scoring call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::UnsupportedFormat { .. } => "unsupported_format",
            AnalysisError::ExtractionFailure { .. } => "extraction_failure",
            AnalysisError::ScoringServiceFailure { .. } => "scoring_service_failure",
            AnalysisError::MalformedResponse { .. } => "malformed_response",
            AnalysisError::SchemaViolation { .. } => "schema_violation",
            AnalysisError::Timeout { .. } => "timeout",
        }
    }

    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("content policy refusal: {0}")]
    ContentPolicy(String),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl ScoringError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScoringError::Transport(_)
                | ScoringError::RateLimited(_)
                | ScoringError::ServerError { .. }
        )
    }
}

impl From<reqwest::Error> for ScoringError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ScoringError::InvalidBody(value.to_string())
        } else {
            ScoringError::Transport(value.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
