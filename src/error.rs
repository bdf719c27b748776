//! Errors raised by validation and launch checks.

use std::fmt;

/// Error type for the multiply pipeline.
///
/// All variants are fatal to the current invocation and are raised before
/// the offending kernel launch; no partial results are exposed.
#[derive(Debug)]
pub enum GemmError {
    /// Tiling configuration violates an invariant.
    Config(String),
    /// A matrix dimension is zero or the operands do not conform.
    Dimension(String),
    /// The configuration exceeds what the device can launch.
    Launch(String),
}

impl fmt::Display for GemmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid tiling configuration: {msg}"),
            Self::Dimension(msg) => write!(f, "invalid dimensions: {msg}"),
            Self::Launch(msg) => write!(f, "launch rejected: {msg}"),
        }
    }
}

impl std::error::Error for GemmError {}
