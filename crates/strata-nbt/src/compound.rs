use crate::{Tag, TAG_END};
use byteorder::WriteBytesExt;
use std::io::{Read, Write};
use strata_codec::DataReader;
use strata_common::error::StrataError;
use strata_common::types::Result;

/// Named children of a Compound tag, kept in file order.
///
/// Lookups scan linearly and return the first entry with a matching name. The format does not
/// forbid duplicate names, so decoding keeps them; which one "wins" beyond the first match is
/// left unresolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, tag)| tag)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, tag)| tag)
    }

    /// Like [`Compound::get`], but a missing entry is an error.
    pub fn require(&self, name: &str) -> Result<&Tag> {
        self.get(name)
            .ok_or_else(|| StrataError::Malformed(format!("missing tag '{}'", name)))
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces the first entry called `name`, or appends a new one.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) -> Option<Tag> {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => Some(std::mem::replace(existing, tag)),
            None => {
                self.entries.push((name, tag));
                None
            }
        }
    }

    /// Appends without checking for an existing entry of the same name.
    pub fn push(&mut self, name: impl Into<String>, tag: Tag) {
        self.entries.push((name.into(), tag));
    }

    /// Removes the first entry called `name`.
    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let position = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(position).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(name, tag)| (name.as_str(), tag))
    }

    pub(crate) fn read_payload<R: Read>(reader: &mut DataReader<R>, depth: usize) -> Result<Self> {
        let mut compound = Compound::new();
        loop {
            let type_id = reader.read_byte()?;
            if type_id == TAG_END {
                break;
            }
            let name_length = reader.read_short()? as usize;
            let name = reader.read_utf8(name_length)?;
            let tag = Tag::read_payload(reader, type_id, depth)?;
            compound.entries.push((name, tag));
        }
        Ok(compound)
    }

    pub(crate) fn write_payload<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (name, tag) in &self.entries {
            tag.write(writer, name)?;
        }
        writer.write_u8(TAG_END)?;
        Ok(())
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Compound {
    type Item = (String, Tag);
    type IntoIter = std::vec::IntoIter<(String, Tag)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strata_codec::DataWriter;

    #[test]
    fn test_compound_tag_read_write() {
        let mut compound = Compound::new();
        compound.insert("byte", Tag::Byte(42));
        compound.insert("string", Tag::String("test".to_string()));
        compound.insert("list", Tag::List(vec![Tag::Int(1), Tag::Int(2)]));

        let tag = Tag::Compound(compound);

        let mut writer = DataWriter::new();
        tag.write(&mut writer, "root").unwrap();

        let mut reader = DataReader::from_bytes(writer.into_bytes().to_vec());
        let (name, read_tag) = Tag::read(&mut reader).unwrap();

        assert_eq!(name, "root");
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_order_is_preserved() {
        let compound: Compound = ["z", "a", "m"]
            .iter()
            .map(|name| (name.to_string(), Tag::Byte(0)))
            .collect();
        let names: Vec<&str> = compound.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_missing_key_is_absent() {
        let compound = Compound::new();
        assert!(compound.get("Level").is_none());
        assert!(!compound.contains_key("Level"));
        assert_matches!(compound.require("Level"), Err(StrataError::Malformed(_)));
    }

    #[test]
    fn test_duplicate_names_first_match_wins() {
        let mut compound = Compound::new();
        compound.push("Y", Tag::Byte(1));
        compound.push("Y", Tag::Byte(2));
        assert_eq!(compound.len(), 2);
        assert_eq!(compound.get("Y"), Some(&Tag::Byte(1)));

        // Duplicates survive a decode
        let mut writer = DataWriter::new();
        Tag::Compound(compound.clone()).write(&mut writer, "").unwrap();
        let mut reader = DataReader::from_bytes(writer.into_bytes().to_vec());
        let (_, read) = Tag::read(&mut reader).unwrap();
        assert_eq!(read.as_compound().unwrap(), &compound);

        assert_eq!(compound.insert("Y", Tag::Byte(3)), Some(Tag::Byte(1)));
        assert_eq!(compound.remove("Y"), Some(Tag::Byte(3)));
        assert_eq!(compound.get("Y"), Some(&Tag::Byte(2)));
    }

    #[test]
    fn test_require_and_mutate() {
        let mut compound = Compound::new();
        compound.insert("Level", Tag::Compound(Compound::new()));
        compound
            .get_mut("Level")
            .unwrap()
            .as_compound_mut()
            .unwrap()
            .insert("xPos", Tag::Int(3));

        let level = compound.require("Level").unwrap().as_compound().unwrap();
        assert_eq!(level.require("xPos").unwrap().as_i32().unwrap(), 3);
    }
}
