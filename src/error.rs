use thiserror::Error;

/// Error type for the remuxer core.
///
/// `remux()` itself never returns `Result`: allocation failures, missing
/// keyframes, and timestamp repair are reported through the observer or
/// folded into the returned `RemuxOutput` (see `spec.md` §7). This type
/// only covers construction and configuration failures.
#[derive(Error, Debug)]
pub enum RemuxError {
    /// A TOML configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A standard I/O error, surfaced while loading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the remuxer core's fallible construction paths.
pub type Result<T> = std::result::Result<T, RemuxError>;
