use std::time::Duration;
use thiserror::Error as ThisError;

/// Different errors that the application can raise
#[derive(Debug, ThisError)]
pub enum RuntimeError {
    /// Error returned when the log payload is not valid base64
    #[error("log payload is not valid base64")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// Error returned when the log payload is not valid gzip
    #[error("unable to decompress log payload")]
    Decompression(#[source] std::io::Error),
    /// Error returned when a batch cannot be compressed for delivery
    #[error("unable to compress log payload")]
    Compression(#[source] std::io::Error),
    /// Error returned when the decompressed payload is not valid JSON
    #[error("malformed log payload")]
    MalformedPayload(#[source] serde_json::Error),
    /// Error returned when a log entry cannot be turned into an alert
    #[error("unable to parse log entry {id}: {reason}")]
    EntryParse {
        /// id of the offending log entry
        id: String,
        /// what was wrong with it
        reason: String,
    },
    /// Error returned when a workflow state is reached without the data it reads
    #[error("invalid workflow transition: {0}")]
    InvalidTransition(String),
    /// Error returned when a workflow execution runs out of time
    #[error("workflow execution {0} exceeded its time budget of {1:?}")]
    WorkflowTimeout(String, Duration),
    /// Error returned when a subscription filter pattern cannot be parsed
    #[error("invalid filter pattern at offset {offset}: {reason}")]
    InvalidFilterPattern {
        /// byte offset in the pattern
        offset: usize,
        /// what the parser expected
        reason: String,
    },
    /// Error returned when the environment is missing or has invalid settings
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Error returned by the SNS API
    #[error("unexpected sns error")]
    Sns(#[from] aws_sdk_sns::Error),
}
