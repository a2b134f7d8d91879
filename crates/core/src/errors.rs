use serde::Serialize;
use thiserror::Error;

pub const FAILURE_MESSAGE: &str = "Error processing file";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unsupported event format: {0}")]
    UnsupportedTrigger(String),
    #[error("could not read csv content: {0}")]
    MalformedCsv(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("could not fetch `{key}` from bucket `{bucket}`: {reason}")]
    Fetch { bucket: String, key: String, reason: String },
    #[error("could not copy `{source_key}` to `{destination_key}`: {reason}")]
    Copy { source_key: String, destination_key: String, reason: String },
    #[error(
        "copied `{source_key}` to `{destination_key}` but could not delete the original: {reason}"
    )]
    Delete { source_key: String, destination_key: String, reason: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("workflow start failed: {0}")]
    Workflow(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::UnsupportedTrigger(_)) => "input_shape",
            Self::Domain(DomainError::MalformedCsv(_)) => "parse",
            Self::Fetch { .. } | Self::Copy { .. } | Self::Delete { .. } => "storage_io",
            Self::Persistence(_) => "store",
            Self::Workflow(_) => "downstream_trigger",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_failure(self) -> HandlerFailure {
        HandlerFailure::from(self)
    }
}

/// Failure payload surfaced to the invoking trigger framework.
///
/// `Display` renders the JSON text `{"message": ..., "error": ...}`, which is
/// what the runtime reports as the invocation error message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HandlerFailure {
    pub message: String,
    pub error: String,
}

impl HandlerFailure {
    pub fn to_json(&self) -> String {
        // Two string fields, so serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl std::error::Error for HandlerFailure {}

impl From<ApplicationError> for HandlerFailure {
    fn from(value: ApplicationError) -> Self {
        Self { message: FAILURE_MESSAGE.to_owned(), error: value.to_string() }
    }
}
