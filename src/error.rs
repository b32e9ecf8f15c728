//! Error types for inteval.

use thiserror::Error;

/// Result type for inteval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for inteval operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A corpus required for the run contained no usable utterances.
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// The label universe collapsed to nothing (corrupted or empty input).
    #[error("Empty label set: {0}")]
    EmptyLabelSet(String),

    /// The scoring adapter failed or returned a malformed response.
    #[error("Scoring failed: {0}")]
    Scoring(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Evaluation error.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an empty-corpus error.
    pub fn empty_corpus(msg: impl Into<String>) -> Self {
        Error::EmptyCorpus(msg.into())
    }

    /// Create an empty-label-set error.
    pub fn empty_label_set(msg: impl Into<String>) -> Self {
        Error::EmptyLabelSet(msg.into())
    }

    /// Create a scoring error.
    pub fn scoring(msg: impl Into<String>) -> Self {
        Error::Scoring(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::Evaluation(msg.into())
    }
}
