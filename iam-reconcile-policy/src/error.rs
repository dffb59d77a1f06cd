use thiserror::Error;

/// Errors surfaced while parsing or serializing policy documents.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The input is not a well-formed policy document.
    #[error("failed to parse policy document: {0}")]
    Parse(#[source] serde_json::Error),

    /// The document could not be rendered back to JSON.
    #[error("failed to serialize policy document: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Result type for policy document operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
