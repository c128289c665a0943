use byteorder::{BigEndian, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::{Read, Write};
use strata_codec::DataReader;
use strata_common::error::StrataError;
use strata_common::types::Result;

/// Bytes in front of the compressed data: u32 length + scheme id.
pub const PAYLOAD_HEADER_LEN: usize = 5;
/// Upper bound on the inflated size of one chunk document.
pub const MAX_CHUNK_BYTES: usize = 64 * 1024 * 1024;

/// How a chunk payload is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionScheme {
    /// Gzip-wrapped deflate.
    Gzip = 1,
    /// Zlib-wrapped deflate, what the game writes by default.
    Zlib = 2,
}

impl TryFrom<u8> for CompressionScheme {
    type Error = StrataError;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            1 => Ok(CompressionScheme::Gzip),
            2 => Ok(CompressionScheme::Zlib),
            other => Err(StrataError::UnsupportedScheme(other)),
        }
    }
}

impl CompressionScheme {
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Inflates `data`, refusing output larger than [`MAX_CHUNK_BYTES`].
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompress_limited(data, MAX_CHUNK_BYTES)
    }

    /// Inflates `data`; more than `limit` bytes of output is `Malformed`.
    pub fn decompress_limited(self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        match self {
            CompressionScheme::Gzip => inflate(GzDecoder::new(data), limit),
            CompressionScheme::Zlib => inflate(ZlibDecoder::new(data), limit),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionScheme::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            CompressionScheme::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
        }
    }
}

fn inflate<D: Read>(decoder: D, limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    // One byte past the limit tells a full buffer from an oversized stream
    decoder.take(limit as u64 + 1).read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(StrataError::Malformed(format!(
            "chunk data inflates past {} bytes",
            limit
        )));
    }
    Ok(out)
}

/// Reads `length(u32) scheme(u8) data(length - 1)` and returns the decompressed bytes.
///
/// The length counts the scheme byte, so the compressed data is one byte shorter than the
/// declared length.
pub fn read_payload<R: Read>(reader: &mut DataReader<R>) -> Result<Vec<u8>> {
    read_payload_bounded(reader, None)
}

/// Same as [`read_payload`], but a declared length above `max_len` is rejected before any
/// data is read.
pub fn read_payload_bounded<R: Read>(
    reader: &mut DataReader<R>,
    max_len: Option<usize>,
) -> Result<Vec<u8>> {
    let length = reader.read_u32()? as usize;
    if length == 0 {
        return Err(StrataError::Malformed("chunk payload of length 0".to_owned()));
    }
    if let Some(max_len) = max_len {
        if length > max_len {
            return Err(StrataError::Malformed(format!(
                "chunk payload of {} bytes exceeds its {} allocated bytes",
                length, max_len
            )));
        }
    }

    let scheme = CompressionScheme::try_from(reader.read_byte()?)?;
    let data = reader.read_bytes(length - 1)?;
    scheme.decompress(&data)
}

/// Compresses `data` and frames it the way [`read_payload`] expects.
pub fn encode_payload(scheme: CompressionScheme, data: &[u8]) -> Result<Vec<u8>> {
    let compressed = scheme.compress(data)?;
    let length = u32::try_from(compressed.len() + 1)
        .map_err(|_| StrataError::Overflow("chunk payload length"))?;

    let mut out = Vec::with_capacity(compressed.len() + PAYLOAD_HEADER_LEN);
    out.write_u32::<BigEndian>(length)?;
    out.write_u8(scheme.id())?;
    out.extend_from_slice(&compressed);
    Ok(out)
}
