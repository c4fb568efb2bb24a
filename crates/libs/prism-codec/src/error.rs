use thiserror::Error;

/// Errors surfaced while reading a wire buffer.
///
/// Encoding is infallible; every variant here comes from the decode side.
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("buffer truncated: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("string field is not valid utf-8")]
    InvalidString,

    #[error("invalid length prefix {0}")]
    InvalidLength(i32),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}
