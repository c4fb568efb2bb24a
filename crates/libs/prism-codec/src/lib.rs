//! Byte-level codec for the prism shared-queue wire format.
//!
//! Everything that crosses the queue is written with [`Packer`] and read back
//! with [`Unpacker`], field by field, in the same order. The format is fixed:
//!
//! - integers and floats are little-endian, fixed width
//! - strings carry an `i32` byte-length prefix; `-1` encodes null, `0`
//!   encodes the empty string, so the two survive a round trip distinctly
//! - timestamps and durations travel as `i64` microseconds
//!
//! Payload types plug in through two traits: [`FixedPack`] for fixed-layout
//! scalars and [`Packable`] for user-defined structured objects, which may
//! nest other `Packable` fields.

mod error;
mod packer;
mod traits;
mod unpacker;

pub use error::CodecError;
pub use packer::Packer;
pub use traits::{FixedPack, Packable};
pub use unpacker::Unpacker;
