//! Transport boundary for the prism messaging core.
//!
//! The core talks to its peer through the [`Transport`] trait: whole frames,
//! delivered in sending order, without loss, to a single peer. Inbound frames
//! and asynchronous failures arrive through the [`TransportEvents`] handlers
//! supplied at attach time, invoked sequentially on the endpoint's own
//! delivery thread.
//!
//! [`QueueLink`] is the in-process implementation: a process-global table of
//! named channels, each a pair of bounded byte queues, standing in for the
//! memory-mapped queue two cooperating processes would share. Channel
//! parameters for the default link come from [`discover_default_channel`].

mod discovery;
mod error;
mod link;

pub use discovery::{
    discover_default_channel, load_params, ChannelParams, CHANNEL_CONFIG_ENV,
    DEFAULT_CAPACITY, DEFAULT_CHANNEL_NAME,
};
pub use error::TransportError;
pub use link::{LinkRole, QueueLink, TransportEvents};

/// One endpoint of a frame-oriented channel.
///
/// Implementations must be safe to share across threads; `send` may be called
/// concurrently with frame delivery.
pub trait Transport: Send + Sync {
    /// Queues one whole frame for the peer. Fails fast instead of blocking.
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Closes this endpoint. Idempotent; the peer observes the closure as a
    /// failure after draining what was already in flight.
    fn close(&self);

    fn is_open(&self) -> bool;
}
