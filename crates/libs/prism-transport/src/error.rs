use thiserror::Error;

/// Errors surfaced by a transport endpoint.
///
/// `PeerClosed` is the only variant a live endpoint reports asynchronously;
/// the rest come back synchronously from [`send`] or [`attach`].
///
/// [`send`]: crate::Transport::send
/// [`attach`]: crate::QueueLink::attach
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("channel '{0}' is unavailable")]
    ChannelUnavailable(String),

    #[error("role already attached on channel '{0}'")]
    RoleTaken(String),

    #[error("queue full: {frame} byte frame exceeds {remaining} bytes of remaining capacity")]
    QueueFull { frame: usize, remaining: u64 },

    #[error("peer closed the channel")]
    PeerClosed,

    #[error("link is closed")]
    Closed,
}
