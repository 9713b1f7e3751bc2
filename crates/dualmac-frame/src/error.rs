//! Error types for frame parsing and encoding

use thiserror::Error;

/// Errors that can occur while decoding frame fields or payloads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer is incomplete - need more data
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Textual MAC address could not be parsed
    #[error("invalid MAC address: {0}")]
    InvalidAddress(String),

    /// CTS payload does not carry a start-time grant
    #[error("invalid CTS grant: expected 8 bytes, got {len}")]
    InvalidGrant { len: usize },
}
