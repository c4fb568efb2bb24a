use std::any::Any;
use std::collections::HashSet;
use std::hash::Hash;

use prism_codec::{CodecError, FixedPack, Packable, Unpacker};

use crate::envelope::{read_count, read_string_list};

/// Wire-level payload kinds.
///
/// Together with a concrete element type this names one registrable shape;
/// `Empty`, `Str`, `StrList` and `Ready` stand alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ShapeCategory {
    Ready,
    Empty,
    Str,
    StrList,
    Value,
    ValueList,
    ValueSet,
    Object,
    ObjectList,
}

impl ShapeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Empty => "empty",
            Self::Str => "string",
            Self::StrList => "string-list",
            Self::Value => "value",
            Self::ValueList => "value-list",
            Self::ValueSet => "value-set",
            Self::Object => "object",
            Self::ObjectList => "object-list",
        }
    }
}

/// Stable per-channel index of a registered shape.
pub(crate) type ShapeIndex = i32;

/// Sentinel index carried by an envelope whose object payload is null.
pub(crate) const NULL_OBJECT_INDEX: ShapeIndex = -1;

/// A decoded payload on its way to the registered callback.
///
/// Typed shapes travel as `Boxed` and are restored to their concrete type by
/// the handler that was registered for them.
pub(crate) enum DecodedPayload {
    Ready,
    Empty,
    Str(Option<String>),
    StrList(Option<Vec<Option<String>>>),
    Boxed(Box<dyn Any + Send>),
}

pub(crate) type DecodeFn = fn(&mut Unpacker<'_>) -> Result<DecodedPayload, CodecError>;

/// One registered shape: its index, kind, diagnostic name and decoder.
pub(crate) struct ShapeEntry {
    pub index: ShapeIndex,
    pub category: ShapeCategory,
    pub type_name: &'static str,
    pub decode: DecodeFn,
}

pub(crate) fn decode_ready(_: &mut Unpacker<'_>) -> Result<DecodedPayload, CodecError> {
    Ok(DecodedPayload::Ready)
}

pub(crate) fn decode_empty(_: &mut Unpacker<'_>) -> Result<DecodedPayload, CodecError> {
    Ok(DecodedPayload::Empty)
}

pub(crate) fn decode_string(unpacker: &mut Unpacker<'_>) -> Result<DecodedPayload, CodecError> {
    Ok(DecodedPayload::Str(unpacker.read_string()?))
}

pub(crate) fn decode_string_list(
    unpacker: &mut Unpacker<'_>,
) -> Result<DecodedPayload, CodecError> {
    Ok(DecodedPayload::StrList(read_string_list(unpacker)?))
}

pub(crate) fn decode_value<T: FixedPack>(
    unpacker: &mut Unpacker<'_>,
) -> Result<DecodedPayload, CodecError> {
    Ok(DecodedPayload::Boxed(Box::new(T::unpack(unpacker)?)))
}

pub(crate) fn decode_value_list<T: FixedPack>(
    unpacker: &mut Unpacker<'_>,
) -> Result<DecodedPayload, CodecError> {
    let Some(count) = read_count(unpacker)? else {
        return Ok(DecodedPayload::Boxed(Box::new(None::<Vec<T>>)));
    };
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::unpack(unpacker)?);
    }
    Ok(DecodedPayload::Boxed(Box::new(Some(items))))
}

pub(crate) fn decode_value_set<T: FixedPack + Eq + Hash>(
    unpacker: &mut Unpacker<'_>,
) -> Result<DecodedPayload, CodecError> {
    let Some(count) = read_count(unpacker)? else {
        return Ok(DecodedPayload::Boxed(Box::new(None::<HashSet<T>>)));
    };
    let mut items = HashSet::with_capacity(count);
    for _ in 0..count {
        items.insert(T::unpack(unpacker)?);
    }
    Ok(DecodedPayload::Boxed(Box::new(Some(items))))
}

pub(crate) fn decode_object<T: Packable>(
    unpacker: &mut Unpacker<'_>,
) -> Result<DecodedPayload, CodecError> {
    Ok(DecodedPayload::Boxed(Box::new(Some(T::unpack(unpacker)?))))
}

pub(crate) fn decode_object_list<T: Packable>(
    unpacker: &mut Unpacker<'_>,
) -> Result<DecodedPayload, CodecError> {
    let Some(count) = read_count(unpacker)? else {
        return Ok(DecodedPayload::Boxed(Box::new(None::<Vec<T>>)));
    };
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::unpack(unpacker)?);
    }
    Ok(DecodedPayload::Boxed(Box::new(Some(items))))
}
