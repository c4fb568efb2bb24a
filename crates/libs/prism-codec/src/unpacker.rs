use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CodecError;

/// Cursor over a received wire buffer.
///
/// Every read is bounds-checked; reads past the end fail with
/// [`CodecError::Truncated`] instead of panicking.
#[derive(Debug)]
pub struct Unpacker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < count {
            return Err(CodecError::Truncated {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(i8::from_le_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    pub fn read_char(&mut self) -> Result<char, CodecError> {
        let raw = self.read_u32()?;
        char::from_u32(raw)
            .ok_or_else(|| CodecError::InvalidValue(format!("{raw:#x} is not a char")))
    }

    pub fn read_duration(&mut self) -> Result<Duration, CodecError> {
        let micros = self.read_i64()?;
        if micros < 0 {
            return Err(CodecError::InvalidValue(format!(
                "negative duration {micros}us"
            )));
        }
        Ok(Duration::from_micros(micros as u64))
    }

    pub fn read_timestamp(&mut self) -> Result<SystemTime, CodecError> {
        let micros = self.read_i64()?;
        if micros >= 0 {
            Ok(UNIX_EPOCH + Duration::from_micros(micros as u64))
        } else {
            Ok(UNIX_EPOCH - Duration::from_micros(micros.unsigned_abs()))
        }
    }

    /// Null-aware counterpart of [`Packer::write_string`]: a `-1` length
    /// yields `None`, a `0` length yields `Some("")`.
    ///
    /// [`Packer::write_string`]: crate::Packer::write_string
    pub fn read_string(&mut self) -> Result<Option<String>, CodecError> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(CodecError::InvalidLength(len));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| CodecError::InvalidString)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        self.take(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packer;

    #[test]
    fn scalars_round_trip() {
        let mut packer = Packer::new();
        packer.write_bool(true);
        packer.write_u8(0xAB);
        packer.write_i16(-12_345);
        packer.write_u32(0xDEAD_BEEF);
        packer.write_i64(i64::MIN);
        packer.write_f32(21.5);
        packer.write_f64(-0.25);
        packer.write_char('☃');

        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert!(unpacker.read_bool().expect("bool"));
        assert_eq!(unpacker.read_u8().expect("u8"), 0xAB);
        assert_eq!(unpacker.read_i16().expect("i16"), -12_345);
        assert_eq!(unpacker.read_u32().expect("u32"), 0xDEAD_BEEF);
        assert_eq!(unpacker.read_i64().expect("i64"), i64::MIN);
        assert_eq!(unpacker.read_f32().expect("f32"), 21.5);
        assert_eq!(unpacker.read_f64().expect("f64"), -0.25);
        assert_eq!(unpacker.read_char().expect("char"), '☃');
        assert!(unpacker.is_empty());
    }

    #[test]
    fn integers_are_little_endian() {
        let mut packer = Packer::new();
        packer.write_u32(0x0102_0304);
        assert_eq!(hex::encode(packer.as_slice()), "04030201");
    }

    #[test]
    fn null_and_empty_strings_stay_distinct() {
        let mut packer = Packer::new();
        packer.write_string(None);
        packer.write_string(Some(""));
        packer.write_string(Some("héllo"));

        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert_eq!(unpacker.read_string().expect("null"), None);
        assert_eq!(unpacker.read_string().expect("empty"), Some(String::new()));
        assert_eq!(
            unpacker.read_string().expect("text"),
            Some("héllo".to_string())
        );
    }

    #[test]
    fn truncated_read_reports_shortfall() {
        let bytes = [1u8, 2, 3];
        let mut unpacker = Unpacker::new(&bytes);
        let err = unpacker.read_u64().expect_err("must fail");
        assert_eq!(
            err,
            CodecError::Truncated {
                needed: 8,
                remaining: 3
            }
        );
    }

    #[test]
    fn bogus_string_length_is_rejected() {
        let mut packer = Packer::new();
        packer.write_i32(-7);
        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert_eq!(
            unpacker.read_string().expect_err("must fail"),
            CodecError::InvalidLength(-7)
        );
    }

    #[test]
    fn timestamps_round_trip_on_either_side_of_the_epoch() {
        let after = UNIX_EPOCH + Duration::from_micros(1_234_567);
        let before = UNIX_EPOCH - Duration::from_micros(987_654);

        let mut packer = Packer::new();
        packer.write_timestamp(after);
        packer.write_timestamp(before);
        packer.write_duration(Duration::from_millis(250));

        let bytes = packer.into_bytes();
        let mut unpacker = Unpacker::new(&bytes);
        assert_eq!(unpacker.read_timestamp().expect("after"), after);
        assert_eq!(unpacker.read_timestamp().expect("before"), before);
        assert_eq!(
            unpacker.read_duration().expect("duration"),
            Duration::from_millis(250)
        );
    }
}
