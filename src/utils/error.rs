use crate::domain::model::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Store error: {message}")]
    StoreError { message: String },

    #[error("Browser error: {message}")]
    BrowserError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Storage,
    Data,
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScoutError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScoutError::HttpError(_) => ErrorCategory::Network,
            ScoutError::ConfigError { .. }
            | ScoutError::MissingConfigError { .. }
            | ScoutError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ScoutError::CsvError(_) | ScoutError::IoError(_) | ScoutError::StoreError { .. } => {
                ErrorCategory::Storage
            }
            ScoutError::SerializationError(_) => ErrorCategory::Data,
            ScoutError::BrowserError { .. } => ErrorCategory::Browser,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Browser => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and retry the run",
            ErrorCategory::Configuration => {
                "Check the TOML config file and the environment variables it references"
            }
            ErrorCategory::Storage => "Check that the sheet files exist and are writable",
            ErrorCategory::Data => "The source returned unexpected data; inspect the debug log",
            ErrorCategory::Browser => {
                "Install Chromium or set browser.chrome_path, or disable the DOM sources"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ScoutError::MissingConfigError { field } => {
                format!("Required setting '{}' is missing", field)
            }
            ScoutError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;

/// A classified failure inside one source adapter. Never escapes the
/// orchestrator: it is folded into a `FetchOutcome` for that source.
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct SourceError {
    pub kind: FailureKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConfigMissing, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(FailureKind::SchemaMismatch, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::SourceUnavailable, message)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_decode() {
            FailureKind::SchemaMismatch
        } else {
            FailureKind::SourceUnavailable
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ScoutError> for SourceError {
    fn from(err: ScoutError) -> Self {
        Self::unavailable(err.to_string())
    }
}
