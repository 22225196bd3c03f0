// Error types for the Switchback routing engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed route pattern, raised at registration time
    #[error("invalid route pattern '{0}': {1}")]
    Pattern(String, String),

    /// Ambiguous parameter naming detected at registration time
    #[error("duplicate parameter name '{0}': {1}")]
    DuplicateParamName(String, String),

    /// A pipeline completed without any stage producing a response
    #[error("Context is not finalized. Did you forget to return a response or call next()?")]
    ContextNotFinalized,

    /// Failure raised by a middleware or terminal handler during dispatch
    #[error("handler failure: {0}")]
    Handler(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Deserialization(_) => 400,
            // Registration-time errors never reach dispatch; everything that
            // does is a server-side fault.
            _ => 500,
        }
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
