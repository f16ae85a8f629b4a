//! Error types for dbprobe

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration value is absent (strict mode only)
    #[error("missing required configuration value: {key}")]
    MissingConfig {
        /// Name of the missing variable
        key: &'static str,
    },

    /// Configuration is present but malformed, or a TLS bundle file is unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A single connection attempt failed (unreachable server, bad credentials, TLS handshake)
    #[error("{prefix}: {message}", prefix = connection_prefix(.tls_required))]
    Connection {
        /// Driver-provided failure text
        message: String,
        /// Whether the attempt was made with TLS required
        tls_required: bool,
    },

    /// The attempt budget ran out; wraps the last observed failure
    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last connection failure
        #[source]
        source: Box<Error>,
    },

    /// A diagnostic query was rejected by the server
    #[error("{0}")]
    Query(String),

    /// Connection used in a state that does not allow the operation
    #[error("invalid connection state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state description
        expected: String,
        /// Actual state description
        actual: String,
    },
}

fn connection_prefix(tls_required: &bool) -> &'static str {
    if *tls_required {
        "SSL connection required but failed"
    } else {
        "Connection failed"
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a connection failure
    pub fn connection(message: impl Into<String>, tls_required: bool) -> Self {
        Self::Connection {
            message: message.into(),
            tls_required,
        }
    }

    /// Whether another connection attempt could succeed where this one failed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Stable label used for metrics and structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingConfig { .. } => "missing_config",
            Self::Config(_) => "config",
            Self::Connection { .. } => "connection",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Query(_) => "query",
            Self::InvalidState { .. } => "invalid_state",
        }
    }

    /// Map a driver error raised while establishing a connection.
    ///
    /// Configuration problems detected by the driver are not worth retrying;
    /// everything else (network, TLS handshake, authentication) is.
    pub(crate) fn from_connect(err: sqlx::Error, tls_required: bool) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Config(e.to_string()),
            sqlx::Error::Database(db) => Self::connection(db.message(), tls_required),
            other => Self::connection(other.to_string(), tls_required),
        }
    }

    /// Map a driver error raised by a diagnostic query
    pub(crate) fn from_query(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Query(db.message().to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}
