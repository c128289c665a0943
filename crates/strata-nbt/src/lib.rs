pub mod compound;
pub mod document;

pub use compound::Compound;
pub use document::NbtDocument;

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Read, Write};
use strata_codec::DataReader;
use strata_common::error::StrataError;
use strata_common::types::Result;

/// Deepest Compound/List nesting accepted while decoding.
pub const MAX_DEPTH: usize = 512;

pub const TAG_END: u8 = 0;
pub const TAG_COMPOUND: u8 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    /// Elements are unnamed and must all be the same variant.
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn get_type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Tag::End => "End",
            Tag::Byte(_) => "Byte",
            Tag::Short(_) => "Short",
            Tag::Int(_) => "Int",
            Tag::Long(_) => "Long",
            Tag::Float(_) => "Float",
            Tag::Double(_) => "Double",
            Tag::ByteArray(_) => "ByteArray",
            Tag::String(_) => "String",
            Tag::List(_) => "List",
            Tag::Compound(_) => "Compound",
            Tag::IntArray(_) => "IntArray",
            Tag::LongArray(_) => "LongArray",
        }
    }

    /// Reads one named tag. An End tag comes back with an empty name.
    pub fn read<R: Read>(reader: &mut DataReader<R>) -> Result<(String, Tag)> {
        Tag::read_named(reader, 0)
    }

    fn read_named<R: Read>(reader: &mut DataReader<R>, depth: usize) -> Result<(String, Tag)> {
        let type_id = reader.read_byte()?;
        if type_id == TAG_END {
            return Ok((String::new(), Tag::End));
        }

        let name_length = reader.read_short()? as usize;
        let name = reader.read_utf8(name_length)?;
        let tag = Tag::read_payload(reader, type_id, depth)?;
        Ok((name, tag))
    }

    pub(crate) fn read_payload<R: Read>(
        reader: &mut DataReader<R>,
        type_id: u8,
        depth: usize,
    ) -> Result<Tag> {
        if depth > MAX_DEPTH {
            return Err(StrataError::Malformed(format!(
                "tag nesting deeper than {}",
                MAX_DEPTH
            )));
        }

        match type_id {
            0 => Ok(Tag::End),
            1 => Ok(Tag::Byte(reader.read_i8()?)),
            2 => Ok(Tag::Short(reader.read_i16()?)),
            3 => Ok(Tag::Int(reader.read_int()?)),
            4 => Ok(Tag::Long(reader.read_long()?)),
            5 => Ok(Tag::Float(reader.read_float()?)),
            6 => Ok(Tag::Double(reader.read_double()?)),
            7 => {
                let length = read_length(reader)?;
                let bytes = reader.read_bytes(length)?;
                Ok(Tag::ByteArray(bytes.into_iter().map(|b| b as i8).collect()))
            }
            8 => {
                let length = reader.read_short()? as usize;
                Ok(Tag::String(reader.read_utf8(length)?))
            }
            9 => {
                let list_type = reader.read_byte()?;
                let length = read_length(reader)?;
                if list_type == TAG_END && length > 0 {
                    return Err(StrataError::Malformed(format!(
                        "list of {} End tags",
                        length
                    )));
                }
                let mut list = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    list.push(Tag::read_payload(reader, list_type, depth + 1)?);
                }
                Ok(Tag::List(list))
            }
            10 => Ok(Tag::Compound(Compound::read_payload(reader, depth + 1)?)),
            11 => {
                let length = read_length(reader)?;
                Ok(Tag::IntArray(reader.read_int_array(length)?))
            }
            12 => {
                let length = read_length(reader)?;
                Ok(Tag::LongArray(reader.read_long_array(length)?))
            }
            _ => Err(StrataError::Malformed(format!(
                "invalid tag type: {}",
                type_id
            ))),
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> Result<()> {
        writer.write_u8(self.get_type_id())?;

        if !matches!(self, Tag::End) {
            write_string(writer, name)?;
        }

        self.write_payload(writer)
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Tag::End => {}
            Tag::Byte(v) => writer.write_i8(*v)?,
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v)?,
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v)?,
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v)?,
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v)?,
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v)?,
            Tag::ByteArray(v) => {
                write_length(writer, v.len())?;
                let bytes: Vec<u8> = v.iter().map(|&b| b as u8).collect();
                writer.write_all(&bytes)?;
            }
            Tag::String(v) => write_string(writer, v)?,
            Tag::List(v) => {
                // Empty lists are written with an End element type
                let element_type = v.first().map_or(TAG_END, Tag::get_type_id);
                if let Some(odd) = v.iter().find(|t| t.get_type_id() != element_type) {
                    return Err(StrataError::Malformed(format!(
                        "list of {} contains a {}",
                        v[0].type_name(),
                        odd.type_name()
                    )));
                }
                writer.write_u8(element_type)?;
                write_length(writer, v.len())?;
                for tag in v {
                    tag.write_payload(writer)?;
                }
            }
            Tag::Compound(v) => v.write_payload(writer)?,
            Tag::IntArray(v) => {
                write_length(writer, v.len())?;
                for &i in v {
                    writer.write_i32::<BigEndian>(i)?;
                }
            }
            Tag::LongArray(v) => {
                write_length(writer, v.len())?;
                for &l in v {
                    writer.write_i64::<BigEndian>(l)?;
                }
            }
        }
        Ok(())
    }

    fn mismatch(&self, expected: &'static str) -> StrataError {
        StrataError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn as_compound(&self) -> Result<&Compound> {
        match self {
            Tag::Compound(compound) => Ok(compound),
            _ => Err(self.mismatch("Compound")),
        }
    }

    pub fn as_compound_mut(&mut self) -> Result<&mut Compound> {
        match self {
            Tag::Compound(compound) => Ok(compound),
            _ => Err(self.mismatch("Compound")),
        }
    }

    pub fn as_list(&self) -> Result<&Vec<Tag>> {
        match self {
            Tag::List(list) => Ok(list),
            _ => Err(self.mismatch("List")),
        }
    }

    pub fn as_list_mut(&mut self) -> Result<&mut Vec<Tag>> {
        match self {
            Tag::List(list) => Ok(list),
            _ => Err(self.mismatch("List")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Tag::String(s) => Ok(s),
            _ => Err(self.mismatch("String")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Tag::Long(n) => Ok(*n),
            _ => Err(self.mismatch("Long")),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Tag::Int(n) => Ok(*n),
            _ => Err(self.mismatch("Int")),
        }
    }

    pub fn as_i16(&self) -> Result<i16> {
        match self {
            Tag::Short(n) => Ok(*n),
            _ => Err(self.mismatch("Short")),
        }
    }

    pub fn as_i8(&self) -> Result<i8> {
        match self {
            Tag::Byte(n) => Ok(*n),
            _ => Err(self.mismatch("Byte")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Tag::Double(n) => Ok(*n),
            _ => Err(self.mismatch("Double")),
        }
    }

    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Tag::Float(n) => Ok(*n),
            _ => Err(self.mismatch("Float")),
        }
    }

    pub fn as_byte_array(&self) -> Result<&[i8]> {
        match self {
            Tag::ByteArray(v) => Ok(v),
            _ => Err(self.mismatch("ByteArray")),
        }
    }

    pub fn as_int_array(&self) -> Result<&[i32]> {
        match self {
            Tag::IntArray(v) => Ok(v),
            _ => Err(self.mismatch("IntArray")),
        }
    }

    pub fn as_long_array(&self) -> Result<&[i64]> {
        match self {
            Tag::LongArray(v) => Ok(v),
            _ => Err(self.mismatch("LongArray")),
        }
    }
}

impl From<Compound> for Tag {
    fn from(compound: Compound) -> Self {
        Tag::Compound(compound)
    }
}

/// i32 length prefix; negative values are malformed.
fn read_length<R: Read>(reader: &mut DataReader<R>) -> Result<usize> {
    let length = reader.read_int()?;
    usize::try_from(length)
        .map_err(|_| StrataError::Malformed(format!("negative length: {}", length)))
}

fn write_length<W: Write>(writer: &mut W, length: usize) -> Result<()> {
    let length = i32::try_from(length).map_err(|_| StrataError::Overflow("array length"))?;
    writer.write_i32::<BigEndian>(length)?;
    Ok(())
}

/// u16 length prefix followed by UTF-8 bytes.
fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let length = u16::try_from(value.len()).map_err(|_| StrataError::Overflow("string length"))?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}
