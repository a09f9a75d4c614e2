//! Error types for the httptrap backend.
//!
//! None of these abort the hosting process: a cert bootstrap failure
//! permanently disables the transport, submission and encoding failures
//! drop one cycle's data.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, Report<BackendError>>;

/// Failure taxonomy for the backend.
#[derive(Debug, Display)]
pub enum BackendError {
    /// Invalid or unusable configuration detected at startup
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Broker CA certificate could not be fetched or parsed
    #[display("Broker CA certificate bootstrap failed")]
    CertFetch,

    /// One cycle's submission was not accepted
    #[display("Submission failed: {message}")]
    Submission { message: String },

    /// The flattened payload could not be serialized
    #[display("Payload encoding failed")]
    Encoding,
}

impl Error for BackendError {}
