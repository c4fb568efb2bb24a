use std::time::{Duration, SystemTime};

use crate::error::CodecError;
use crate::packer::Packer;
use crate::unpacker::Unpacker;

/// A fixed-layout scalar that can travel as a value payload.
///
/// Implementations write a constant number of bytes and read them back in the
/// same order. Implemented for the built-in numeric types, `bool`, `char`,
/// `Duration` and `SystemTime`.
pub trait FixedPack: Clone + Send + Sized + 'static {
    fn pack(&self, packer: &mut Packer);
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError>;
}

/// A user-defined structured object with a hand-written wire layout.
///
/// `pack` and `unpack` must agree on field order. Fields may themselves be
/// `Packable`, nested to any non-cyclic depth.
pub trait Packable: Send + Sized + 'static {
    fn pack(&self, packer: &mut Packer);
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError>;
}

macro_rules! fixed_pack_primitive {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl FixedPack for $ty {
                fn pack(&self, packer: &mut Packer) {
                    packer.$write(*self);
                }

                fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
                    unpacker.$read()
                }
            }
        )*
    };
}

fixed_pack_primitive! {
    bool => write_bool, read_bool;
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
    char => write_char, read_char;
    Duration => write_duration, read_duration;
    SystemTime => write_timestamp, read_timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Inner {
        label: Option<String>,
        weight: f64,
    }

    impl Packable for Inner {
        fn pack(&self, packer: &mut Packer) {
            packer.write_string(self.label.as_deref());
            packer.write_f64(self.weight);
        }

        fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
            Ok(Self {
                label: unpacker.read_string()?,
                weight: unpacker.read_f64()?,
            })
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Outer {
        count: u32,
        inner: Inner,
    }

    impl Packable for Outer {
        fn pack(&self, packer: &mut Packer) {
            packer.write_u32(self.count);
            self.inner.pack(packer);
        }

        fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
            Ok(Self {
                count: unpacker.read_u32()?,
                inner: Inner::unpack(unpacker)?,
            })
        }
    }

    #[test]
    fn nested_objects_round_trip() {
        let original = Outer {
            count: 7,
            inner: Inner {
                label: None,
                weight: 2.5,
            },
        };

        let mut packer = Packer::new();
        original.pack(&mut packer);
        let bytes = packer.into_bytes();

        let mut unpacker = Unpacker::new(&bytes);
        let decoded = Outer::unpack(&mut unpacker).expect("decode");
        assert_eq!(decoded, original);
        assert!(unpacker.is_empty());
    }

    #[test]
    fn fixed_scalars_round_trip_through_the_trait() {
        fn round_trip<T: FixedPack + PartialEq + std::fmt::Debug>(value: T) {
            let mut packer = Packer::new();
            value.pack(&mut packer);
            let bytes = packer.into_bytes();
            let mut unpacker = Unpacker::new(&bytes);
            assert_eq!(T::unpack(&mut unpacker).expect("decode"), value);
        }

        round_trip(true);
        round_trip(-42i16);
        round_trip(7.75f32);
        round_trip('z');
        round_trip(Duration::from_micros(123_456));
    }
}
