use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersonaError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Missing required field(s): {}", .fields.join(", "))]
    MissingField { fields: Vec<String> },

    #[error("Invalid URL: {0} (expected an http/https URL or localhost)")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History writer unavailable: {0}")]
    Enqueue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersonaError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for the failures a file-selection flow should answer by picking another file.
    pub fn is_settings_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Parse { .. } | Self::MissingField { .. } | Self::InvalidUrl(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PersonaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_lists_names() {
        let err = PersonaError::MissingField {
            fields: vec!["api_key".to_string(), "url".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required field(s): api_key, url");
        assert!(err.is_settings_rejection());
    }

    #[test]
    fn test_enqueue_is_not_settings_rejection() {
        let err = PersonaError::Enqueue("closed".into());
        assert!(!err.is_settings_rejection());
    }
}
