use prism_codec::{CodecError, Packer, Unpacker};

use crate::shape::{ShapeIndex, NULL_OBJECT_INDEX};

/// The outer framing every message shares.
///
/// Field order is the wire contract: shape index, then (unless the index is
/// the null-object sentinel) the originating channel name, then owner and id,
/// then the shape-specific payload bytes.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EnvelopeHeader {
    pub shape_index: ShapeIndex,
    pub channel: String,
    pub owner: String,
    pub id: String,
}

impl EnvelopeHeader {
    pub fn encode(&self, packer: &mut Packer) {
        packer.write_i32(self.shape_index);
        if self.shape_index != NULL_OBJECT_INDEX {
            packer.write_string(Some(&self.channel));
        }
        packer.write_string(Some(&self.owner));
        packer.write_string(Some(&self.id));
    }

    pub fn decode(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        let shape_index = unpacker.read_i32()?;
        let channel = if shape_index != NULL_OBJECT_INDEX {
            unpacker
                .read_string()?
                .ok_or_else(|| CodecError::InvalidValue("envelope channel is null".to_string()))?
        } else {
            String::new()
        };
        let owner = unpacker
            .read_string()?
            .ok_or_else(|| CodecError::InvalidValue("envelope owner is null".to_string()))?;
        let id = unpacker
            .read_string()?
            .ok_or_else(|| CodecError::InvalidValue("envelope id is null".to_string()))?;
        Ok(Self {
            shape_index,
            channel,
            owner,
            id,
        })
    }

    /// Human-readable rendering for the debug hook.
    pub fn render(&self, shape_name: &str, payload: &[u8]) -> String {
        let preview_len = payload.len().min(8);
        let preview = if payload.is_empty() {
            String::new()
        } else {
            format!(" [{}…]", hex::encode(&payload[..preview_len]))
        };
        format!(
            "{}/{} shape={}#{} channel={} payload={}B{}",
            self.owner,
            self.id,
            shape_name,
            self.shape_index,
            self.channel,
            payload.len(),
            preview
        )
    }
}

/// Collection count prefix: `-1` encodes a null collection.
pub(crate) fn write_count(packer: &mut Packer, count: Option<usize>) {
    match count {
        None => packer.write_i32(-1),
        Some(count) => packer.write_i32(count as i32),
    }
}

pub(crate) fn read_count(unpacker: &mut Unpacker<'_>) -> Result<Option<usize>, CodecError> {
    let count = unpacker.read_i32()?;
    if count == -1 {
        return Ok(None);
    }
    if count < 0 {
        return Err(CodecError::InvalidLength(count));
    }
    Ok(Some(count as usize))
}

pub(crate) fn write_string_list(packer: &mut Packer, items: Option<&[Option<String>]>) {
    match items {
        None => write_count(packer, None),
        Some(items) => {
            write_count(packer, Some(items.len()));
            for item in items {
                packer.write_string(item.as_deref());
            }
        }
    }
}

pub(crate) fn read_string_list(
    unpacker: &mut Unpacker<'_>,
) -> Result<Option<Vec<Option<String>>>, CodecError> {
    let Some(count) = read_count(unpacker)? else {
        return Ok(None);
    };
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(unpacker.read_string()?);
    }
    Ok(Some(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = EnvelopeHeader {
            shape_index: 12,
            channel: "prism.main".to_string(),
            owner: "Game".to_string(),
            id: "SpawnActor".to_string(),
        };
        let mut packer = Packer::new();
        header.encode(&mut packer);
        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert_eq!(EnvelopeHeader::decode(&mut unpacker).expect("decode"), header);
        assert!(unpacker.is_empty());
    }

    #[test]
    fn null_object_header_skips_the_channel() {
        let header = EnvelopeHeader {
            shape_index: NULL_OBJECT_INDEX,
            channel: "prism.main".to_string(),
            owner: "Game".to_string(),
            id: "Despawn".to_string(),
        };
        let mut packer = Packer::new();
        header.encode(&mut packer);
        let bytes = packer.into_bytes();

        let mut unpacker = Unpacker::new(&bytes);
        let decoded = EnvelopeHeader::decode(&mut unpacker).expect("decode");
        assert_eq!(decoded.shape_index, NULL_OBJECT_INDEX);
        assert_eq!(decoded.channel, "");
        assert_eq!(decoded.owner, "Game");
        assert_eq!(decoded.id, "Despawn");
    }

    #[test]
    fn string_lists_preserve_null_entries() {
        let items = vec![Some("a".to_string()), None, Some(String::new())];
        let mut packer = Packer::new();
        write_string_list(&mut packer, Some(&items));
        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert_eq!(read_string_list(&mut unpacker).expect("decode"), Some(items));
    }

    #[test]
    fn null_collection_is_not_an_empty_one() {
        let mut packer = Packer::new();
        write_string_list(&mut packer, None);
        write_string_list(&mut packer, Some(&[]));
        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert_eq!(read_string_list(&mut unpacker).expect("null"), None);
        assert_eq!(read_string_list(&mut unpacker).expect("empty"), Some(Vec::new()));
    }

    #[test]
    fn render_names_the_route() {
        let header = EnvelopeHeader {
            shape_index: 5,
            channel: "prism.main".to_string(),
            owner: "Game".to_string(),
            id: "Health".to_string(),
        };
        let rendered = header.render("value", &[0xAA, 0xBB]);
        assert!(rendered.contains("Game/Health"));
        assert!(rendered.contains("shape=value#5"));
        assert!(rendered.contains("aabb"));
    }
}
