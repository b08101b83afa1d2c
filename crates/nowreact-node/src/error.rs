//! Error types for the node binary.
//!
//! [`NodeError`] is the top-level error type that wraps all possible
//! failure modes during node startup and shutdown.

/// Top-level error for the node binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: nowreact_core::ConfigError,
    },

    /// The state file could not be loaded, or the final checkpoint failed.
    #[error("state error: {source}")]
    State {
        /// The underlying persistence error.
        #[from]
        source: nowreact_core::PersistError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: nowreact_server::ServerError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
