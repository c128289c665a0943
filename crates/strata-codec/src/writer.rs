use bytes::{Bytes, BytesMut};
use std::io::{self, Write};

/// Size of the staging chunk bytes are collected in before they reach the backing store.
pub const CHUNK_SIZE: usize = 16384;

/// Big-endian writer mirroring [`crate::DataReader`].
/// Writes land in a fixed-size chunk that is flushed into a growable [`BytesMut`] whenever it
/// fills up. Anything that hands out the produced bytes flushes first, so trailing writes
/// cannot be lost.
pub struct DataWriter {
    chunk: Box<[u8; CHUNK_SIZE]>,
    index: usize,
    stream: BytesMut,
}

impl Default for DataWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataWriter {
    pub fn new() -> Self {
        Self {
            chunk: Box::new([0u8; CHUNK_SIZE]),
            index: 0,
            stream: BytesMut::new(),
        }
    }

    /// Bytes sitting in the staging chunk, not yet in the backing store.
    pub fn pending(&self) -> usize {
        self.index
    }

    /// Total bytes written so far.
    pub fn len(&self) -> usize {
        self.stream.len() + self.index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the staging chunk into the backing store.
    pub fn flush_chunk(&mut self) {
        if self.index > 0 {
            self.stream.extend_from_slice(&self.chunk[..self.index]);
            self.index = 0;
        }
    }

    /// Everything written so far.
    pub fn data(&mut self) -> &[u8] {
        self.flush_chunk();
        &self.stream
    }

    pub fn into_bytes(mut self) -> Bytes {
        self.flush_chunk();
        self.stream.freeze()
    }

    pub fn write_byte(&mut self, value: u8) {
        if self.index == CHUNK_SIZE {
            self.flush_chunk();
        }
        self.chunk[self.index] = value;
        self.index += 1;
    }

    pub fn write_bytes(&mut self, values: &[u8]) {
        let mut rest = values;
        while !rest.is_empty() {
            if self.index == CHUNK_SIZE {
                self.flush_chunk();
            }
            let take = rest.len().min(CHUNK_SIZE - self.index);
            self.chunk[self.index..self.index + take].copy_from_slice(&rest[..take]);
            self.index += take;
            rest = &rest[take..];
        }
    }

    pub fn write_short(&mut self, value: u16) {
        self.write_byte((value >> 8) as u8);
        self.write_byte((value & 0xFF) as u8);
    }

    pub fn write_int(&mut self, value: i32) {
        let value = value as u32;
        self.write_short((value >> 16) as u16);
        self.write_short((value & 0xFFFF) as u16);
    }

    pub fn write_long(&mut self, value: i64) {
        let value = value as u64;
        self.write_int((value >> 32) as i32);
        self.write_int(value as i32);
    }

    pub fn write_float(&mut self, value: f32) {
        self.write_int(value.to_bits() as i32);
    }

    pub fn write_double(&mut self, value: f64) {
        self.write_long(value.to_bits() as i64);
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.write_byte(if value { 0x01 } else { 0x00 });
    }

    pub fn write_int_array(&mut self, values: &[i32]) {
        for &value in values {
            self.write_int(value);
        }
    }

    pub fn write_long_array(&mut self, values: &[i64]) {
        for &value in values {
            self.write_long(value);
        }
    }

    /// Writes the UTF-8 bytes of `value` with no length prefix.
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Negative values always take the full 5 bytes.
    pub fn write_var_int(&mut self, value: i32) {
        let mut value = value as u32;
        loop {
            let mut temp = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                temp |= 0x80;
            }
            self.write_byte(temp);
            if value == 0 {
                break;
            }
        }
    }

    pub fn write_var_long(&mut self, value: i64) {
        let mut value = value as u64;
        loop {
            let mut temp = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                temp |= 0x80;
            }
            self.write_byte(temp);
            if value == 0 {
                break;
            }
        }
    }
}

impl Write for DataWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_chunk();
        Ok(())
    }
}
