//! Error types for tracklogd

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tracklogd error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parse error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Filename template produced nothing usable
    #[error("Bad filename template {0:?}")]
    BadTemplate(String),

    /// Document writer operation invoked outside its required state
    #[error("Writer called out of state: {op} while {state}")]
    WriterState {
        /// Operation that was attempted
        op: &'static str,
        /// State the writer was in
        state: &'static str,
    },

    /// Fix source closed the connection
    #[error("Fix source disconnected")]
    Disconnected,

    /// Signal handling setup failed
    #[error("Signal setup failed: {0}")]
    Signal(String),
}
