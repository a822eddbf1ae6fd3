//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Boxed error returned by component factories and `register()` hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("unknown service: {0} is not part of the dependency plan")]
    UnknownService(String),

    #[error("{0} does not expose a register() method")]
    NotAService(String),

    #[error("factory for {class} failed")]
    FactoryFailed {
        class: String,
        #[source]
        source: BoxError,
    },

    #[error("register() of {class} failed")]
    RegistrationFailed {
        class: String,
        #[source]
        source: BoxError,
    },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl ApplicationError {
    /// Domain condition behind this error, if any.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ApplicationError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
