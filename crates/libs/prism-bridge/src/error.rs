use prism_codec::CodecError;
use prism_transport::TransportError;
use thiserror::Error;

/// Errors returned by bridge operations.
///
/// Misconfiguration and lifecycle misuse come back synchronously from the
/// call site. Protocol anomalies on the receipt path never surface here; they
/// go to the warning hook and the offending message is dropped.
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("owner name must not be empty")]
    EmptyOwner,

    #[error("message id must not be empty")]
    EmptyId,

    #[error("message id '{0}' uses the reserved '@' prefix")]
    ReservedId(String),

    #[error("channel name must not be empty")]
    EmptyChannelName,

    #[error("{0} hook is already set")]
    HookAlreadySet(&'static str),

    #[error("backend is already attached to channel '{0}'")]
    AlreadyAttached(String),

    #[error("type registry for channel '{0}' is frozen: traffic has already started")]
    RegistryFrozen(String),

    #[error("type {0} is not registered as a {1} shape")]
    UnregisteredType(&'static str, &'static str),

    #[error("owner '{0}' is not registered")]
    UnknownOwner(String),

    #[error("link is down")]
    LinkDown,

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("codec: {0}")]
    Codec(#[from] CodecError),
}
