//! Error types and result handling for exoquic-pg-setup.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Errors fall into two classes. Fatal errors stop the run before any
//! further provisioning happens; everything else is reported as a warning
//! and the run moves on to the next step. See [`Error::is_fatal`].
//!
//! # Example
//!
//! ```rust
//! use exoquic_pg_setup::{Error, Result};
//!
//! fn load() -> Result<()> {
//!     Err(Error::Config("PGHOST environment variable is required".to_string()))
//! }
//!
//! match load() {
//!     Ok(()) => println!("Loaded"),
//!     Err(e) if e.is_fatal() => eprintln!("Fatal: {}", e),
//!     Err(e) => eprintln!("Warning: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for exoquic-pg-setup operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, typically from missing or invalid environment variables.
    #[error("Configuration error: {0}")]
    Config(String),

    /// PostgreSQL client or query error.
    #[error("PostgreSQL error: {}", postgres_message(.0))]
    Postgres(#[from] tokio_postgres::Error),

    /// HTTP client error when talking to the registration endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The database could not be reached after all retries.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connecting role lacks the privileges required to reconfigure the server.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// A provisioning step failed in a way later steps cannot recover from.
    #[error("Provisioning error in {step}: {message}")]
    Provisioning {
        /// Name of the step that failed
        step: &'static str,
        /// Description of the failure
        message: String,
    },

    /// A server setting had a value that could not be interpreted.
    #[error("Unexpected value '{value}' for setting {parameter}")]
    InvalidSetting {
        /// Name of the server setting
        parameter: String,
        /// Raw value as reported by the server
        value: String,
    },

    /// The registration endpoint answered with a non-success status.
    #[error("API registration failed with status {status}: {body}")]
    Registration {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Response body, as text
        body: String,
    },
}

impl Error {
    /// Whether this error must terminate the run.
    ///
    /// Missing configuration, exhausted connection retries, a non-superuser
    /// role and a failed role provisioning step are fatal. Any other error
    /// only fails the step that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Connection(_)
                | Error::Authorization(_)
                | Error::Provisioning { .. }
        )
    }

    pub(crate) fn provisioning(step: &'static str, message: impl Into<String>) -> Self {
        Error::Provisioning {
            step,
            message: message.into(),
        }
    }
}

/// Renders a PostgreSQL error with the server's own message.
///
/// The `Display` of a server-side `tokio_postgres::Error` is only `db error`,
/// so the message, detail and hint are taken from the `DbError` instead.
pub fn postgres_message(e: &tokio_postgres::Error) -> String {
    let Some(db) = e.as_db_error() else {
        return e.to_string();
    };

    let mut message = db.message().to_string();
    if let Some(detail) = db.detail() {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db.hint() {
        message.push_str(&format!(" (hint: {})", hint));
    }
    message
}

/// A convenient Result type alias for exoquic-pg-setup operations.
///
/// This is equivalent to `std::result::Result<T, exoquic_pg_setup::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
