use thiserror::Error;

/// Failures that abort an analyze request before any metrics exist.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Failed to read upload: {0}")]
    Upload(String),

    #[error("{0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn parse(file: &str, message: impl ToString) -> Self {
        AnalysisError::Parse {
            file: file.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Report {0} not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("Request to completion service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion service error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Completion service returned no text")]
    EmptyResponse,
}
