use crate::{Compound, Tag, TAG_COMPOUND};
use byteorder::{BigEndian, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use strata_codec::{DataReader, DataWriter};
use strata_common::error::StrataError;
use strata_common::types::Result;

/// A complete NBT document: one named root Compound.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NbtDocument {
    pub name: String,
    pub root: Compound,
}

impl NbtDocument {
    pub fn new(name: impl Into<String>, root: Compound) -> Self {
        NbtDocument {
            name: name.into(),
            root,
        }
    }

    /// Reads the root tag. A root that is not a Compound means there is no document and
    /// yields `Ok(None)`.
    pub fn read<R: Read>(reader: &mut DataReader<R>) -> Result<Option<Self>> {
        let type_id = reader.read_byte()?;
        if type_id != TAG_COMPOUND {
            return Ok(None);
        }

        let name_length = reader.read_short()? as usize;
        let name = reader.read_utf8(name_length)?;
        let root = Compound::read_payload(reader, 1)?;
        Ok(Some(NbtDocument { name, root }))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Option<Self>> {
        Self::read(&mut DataReader::from_bytes(bytes))
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(TAG_COMPOUND)?;
        let length =
            u16::try_from(self.name.len()).map_err(|_| StrataError::Overflow("string length"))?;
        writer.write_u16::<BigEndian>(length)?;
        writer.write_all(self.name.as_bytes())?;
        self.root.write_payload(writer)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = DataWriter::new();
        self.write(&mut writer)?;
        Ok(writer.into_bytes().to_vec())
    }

    pub fn read_gzip<R: Read>(reader: R) -> Result<Option<Self>> {
        Self::read(&mut DataReader::new(GzDecoder::new(reader)))
    }

    pub fn write_gzip<W: Write>(&self, writer: W) -> Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        self.write(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    /// Looks up a direct child of the root.
    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.root.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.root.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> NbtDocument {
        let mut compound = Compound::new();
        compound.insert("name", Tag::String("Test".to_string()));
        compound.insert("value", Tag::Int(42));
        NbtDocument::new("test", compound)
    }

    #[test]
    fn test_nbt_document() {
        let original = sample();

        let bytes = original.to_bytes().unwrap();
        let read = NbtDocument::from_bytes(bytes).unwrap().unwrap();
        assert_eq!(read, original);

        let mut gzip_buffer = Vec::new();
        original.write_gzip(&mut gzip_buffer).unwrap();
        // gzip magic
        assert_eq!(&gzip_buffer[..2], &[0x1f, 0x8b]);

        let gzip_read = NbtDocument::read_gzip(Cursor::new(gzip_buffer))
            .unwrap()
            .unwrap();
        assert_eq!(gzip_read.name, original.name);
        assert_eq!(gzip_read.root, original.root);
    }

    #[test]
    fn test_document_matches_tag_encoding() {
        let original = sample();
        let mut writer = DataWriter::new();
        Tag::Compound(original.root.clone())
            .write(&mut writer, &original.name)
            .unwrap();
        assert_eq!(writer.data(), original.to_bytes().unwrap().as_slice());
    }

    #[test]
    fn test_non_compound_root_is_absent() {
        // An Int root
        assert_eq!(
            NbtDocument::from_bytes(vec![3, 0, 0, 0, 0, 0, 1]).unwrap(),
            None
        );
        // A lone End tag
        assert_eq!(NbtDocument::from_bytes(vec![0]).unwrap(), None);
    }

    #[test]
    fn test_byte_exact_reencode() {
        let bytes = sample().to_bytes().unwrap();
        let reread = NbtDocument::from_bytes(bytes.clone()).unwrap().unwrap();
        assert_eq!(reread.to_bytes().unwrap(), bytes);
    }
}
