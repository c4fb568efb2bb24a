//! Typed command dispatch between two cooperating processes over a shared
//! queue.
//!
//! Two sides, a renderer and its host engine, exchange typed values, strings,
//! structured objects and collections through named, owner-scoped channels.
//! Every payload shape carries a stable wire index assigned by a per-channel
//! type registry; every message travels inside one uniform envelope; incoming
//! envelopes are routed to the callback registered for their `(owner, id)`
//! pair and payload kind.
//!
//! The two sides start at different times, so the whole surface is safe to
//! use before the link is up: operations issued early are queued and replayed
//! in order once the ready handshake completes. The side that owns the
//! channel (the authority) is ready as soon as it attaches; the other side
//! announces itself with an internal ready signal.
//!
//! ```no_run
//! use prism_bridge::{Bridge, LinkRole};
//!
//! # fn main() -> Result<(), prism_bridge::Error> {
//! let bridge = Bridge::new(LinkRole::Authority);
//! let game = bridge.messenger("Game")?;
//! game.receive_value::<i32>("Health", |health| {
//!     println!("health is now {health}");
//! })?;
//! bridge.start()?;
//! game.send_string("Status", Some("ready"))?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod bridge;
mod envelope;
mod error;
mod handler;
mod hooks;
mod lifecycle;
mod messenger;
mod registry;
mod shape;

pub use bridge::Bridge;
pub use error::Error;
pub use messenger::Messenger;

// The pieces callers need to define payload types and name channels.
pub use prism_codec::{CodecError, FixedPack, Packable, Packer, Unpacker};
pub use prism_transport::{ChannelParams, LinkRole, TransportError};
