use crate::{VAR_INT_MAX_BYTES, VAR_LONG_MAX_BYTES};
use strata_common::error::StrataError;
use strata_common::types::Result;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Big-endian reader over a byte source.
/// Every multi-byte value is assembled from single byte reads with shifts, so the result does
/// not depend on the native byte order.
/// Running out of bytes is always reported as [`StrataError::EndOfData`].
#[derive(Debug)]
pub struct DataReader<R> {
    inner: R,
}

impl DataReader<Cursor<Vec<u8>>> {
    /// Creates a reader over an owned byte buffer, positioned at 0.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read> DataReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    /// Reads an unsigned 16-bit value.
    pub fn read_short(&mut self) -> Result<u16> {
        let hi = self.read_byte()? as u16;
        let lo = self.read_byte()? as u16;
        Ok((hi << 8) | lo)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_short()? as i16)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let hi = self.read_short()? as u32;
        let lo = self.read_short()? as u32;
        Ok((hi << 16) | lo)
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let hi = self.read_u32()? as u64;
        let lo = self.read_u32()? as u64;
        Ok(((hi << 32) | lo) as i64)
    }

    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    /// Only the low bit of the byte is significant.
    pub fn read_boolean(&mut self) -> Result<bool> {
        Ok(self.read_byte()? & 0x01 == 1)
    }

    /// Reads exactly `length` bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        // Grow with the data instead of trusting `length` for the allocation
        let mut out = Vec::with_capacity(length.min(64 * 1024));
        let read = (&mut self.inner).take(length as u64).read_to_end(&mut out)?;
        if read != length {
            return Err(StrataError::EndOfData);
        }
        Ok(out)
    }

    /// Decodes `length` bytes as one character each (ISO-8859-1).
    /// This is the legacy string decode: multi-byte UTF-8 sequences come out as several
    /// characters. Use [`DataReader::read_utf8`] for text written by a UTF-8 encoder.
    pub fn read_string(&mut self, length: usize) -> Result<String> {
        Ok(self.read_bytes(length)?.into_iter().map(char::from).collect())
    }

    /// Decodes `length` bytes as strict UTF-8.
    pub fn read_utf8(&mut self, length: usize) -> Result<String> {
        String::from_utf8(self.read_bytes(length)?)
            .map_err(|e| StrataError::Malformed(format!("invalid UTF-8 string: {}", e)))
    }

    pub fn read_int_array(&mut self, length: usize) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(length.min(16 * 1024));
        for _ in 0..length {
            out.push(self.read_int()?);
        }
        Ok(out)
    }

    pub fn read_long_array(&mut self, length: usize) -> Result<Vec<i64>> {
        let mut out = Vec::with_capacity(length.min(8 * 1024));
        for _ in 0..length {
            out.push(self.read_long()?);
        }
        Ok(out)
    }

    /// Reads a VarInt: 7 bits per byte, least significant group first, high bit set on every
    /// byte but the last. More than 5 bytes is an overflow.
    pub fn read_var_int(&mut self) -> Result<i32> {
        let mut result = 0u32;
        for i in 0..VAR_INT_MAX_BYTES {
            let byte = self.read_byte()?;
            result |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result as i32);
            }
        }
        Err(StrataError::Overflow("VarInt is longer than 5 bytes"))
    }

    /// Reads a VarLong. More than 10 bytes is an overflow.
    pub fn read_var_long(&mut self) -> Result<i64> {
        let mut result = 0u64;
        for i in 0..VAR_LONG_MAX_BYTES {
            let byte = self.read_byte()?;
            result |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result as i64);
            }
        }
        Err(StrataError::Overflow("VarLong is longer than 10 bytes"))
    }
}

/// Random access, only available over seekable sources.
impl<R: Read + Seek> DataReader<R> {
    /// Moves to an absolute byte position.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Total length of the source. The current position is preserved.
    pub fn stream_len(&mut self) -> Result<u64> {
        let current = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(current))?;
        Ok(end)
    }
}
