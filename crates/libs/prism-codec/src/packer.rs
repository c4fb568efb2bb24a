use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Append-only writer for the wire format.
///
/// A `Packer` never fails; sizing and validity are the reader's problem.
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_char(&mut self, value: char) {
        self.write_u32(value as u32);
    }

    /// Microsecond resolution; sub-microsecond remainder is dropped.
    pub fn write_duration(&mut self, value: Duration) {
        self.write_i64(value.as_micros().min(i64::MAX as u128) as i64);
    }

    /// Microseconds since the unix epoch, negative for earlier instants.
    pub fn write_timestamp(&mut self, value: SystemTime) {
        let micros = match value.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_micros().min(i64::MAX as u128) as i64,
            Err(before) => -(before.duration().as_micros().min(i64::MAX as u128) as i64),
        };
        self.write_i64(micros);
    }

    /// Null-aware: `None` writes a `-1` length and no bytes.
    pub fn write_string(&mut self, value: Option<&str>) {
        match value {
            None => self.write_i32(-1),
            Some(s) => {
                self.write_i32(s.len() as i32);
                self.buf.extend_from_slice(s.as_bytes());
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
