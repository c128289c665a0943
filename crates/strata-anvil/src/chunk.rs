use crate::compression::{self, CompressionScheme};
use crate::palette::BlockState;
use crate::section::Section;
use std::io::Read;
use strata_codec::DataReader;
use strata_common::error::StrataError;
use strata_common::types::Result;
use strata_nbt::{Compound, NbtDocument, Tag};

/// Vertical section slots per chunk column.
pub const SECTIONS_PER_CHUNK: usize = 16;

/// Section slot holding world height `y`, or `Bounds` if the column has no such slot.
fn section_slot(y: i32) -> Result<usize> {
    let slot = y >> 4;
    if (0..SECTIONS_PER_CHUNK as i32).contains(&slot) {
        Ok(slot as usize)
    } else {
        Err(StrataError::Bounds {
            index: slot as i64,
            len: SECTIONS_PER_CHUNK,
        })
    }
}

/// One chunk column: the decoded document it came from plus its live sections.
#[derive(Debug, Clone)]
pub struct Chunk {
    document: NbtDocument,
    sections: [Option<Section>; SECTIONS_PER_CHUNK],
    last_update: u32,
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunk {
    /// Empty chunk: a document holding nothing but an empty `Level` compound.
    pub fn new() -> Self {
        let mut root = Compound::new();
        root.insert("Level", Tag::Compound(Compound::new()));
        Self {
            document: NbtDocument::new("", root),
            sections: Default::default(),
            last_update: 0,
        }
    }

    /// Decodes a compressed chunk payload at the reader's position.
    ///
    /// Sections with a `Y` outside 0..16 or without palette data are skipped; a repeated `Y`
    /// replaces the earlier section.
    pub fn read<R: Read>(
        reader: &mut DataReader<R>,
        timestamp: u32,
        max_len: Option<usize>,
    ) -> Result<Self> {
        let payload = compression::read_payload_bounded(reader, max_len)?;
        let document = NbtDocument::from_bytes(payload)?
            .ok_or_else(|| StrataError::Malformed("chunk payload has no root compound".to_owned()))?;

        let mut sections: [Option<Section>; SECTIONS_PER_CHUNK] = Default::default();
        let level = document.root.require("Level")?.as_compound()?;
        if let Some(list) = level.get("Sections") {
            for tag in list.as_list()? {
                let compound = tag.as_compound()?;
                let y = compound.require("Y")?.as_i8()?;
                if !(0..SECTIONS_PER_CHUNK as i8).contains(&y) {
                    continue;
                }

                let section = Section::from_tag(compound)?;
                if section.is_empty() {
                    continue;
                }
                sections[y as usize] = Some(section);
            }
        }

        Ok(Self {
            document,
            sections,
            last_update: timestamp,
        })
    }

    /// Timestamp from the region header, 0 for chunks created in memory.
    pub fn last_update(&self) -> u32 {
        self.last_update
    }

    pub fn document(&self) -> &NbtDocument {
        &self.document
    }

    pub fn section(&self, slot: usize) -> Option<&Section> {
        self.sections.get(slot).and_then(Option::as_ref)
    }

    pub fn section_mut(&mut self, slot: usize) -> Option<&mut Section> {
        self.sections.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().flatten()
    }

    pub fn section_count(&self) -> usize {
        self.sections().count()
    }

    pub fn needs_rebuilding(&self) -> bool {
        self.sections().any(Section::needs_rebuilding)
    }

    /// Rebuilds every stale section and returns how many there were.
    pub fn rebuild_sections(&mut self) -> Result<usize> {
        let mut rebuilt = 0;
        for section in self.sections.iter_mut().flatten() {
            if section.needs_rebuilding() {
                section.rebuild()?;
                rebuilt += 1;
            }
        }
        Ok(rebuilt)
    }

    /// Block state at world coordinates; `None` when the section was never materialized.
    pub fn get_voxel_state_at(&self, x: i32, y: i32, z: i32) -> Result<Option<&BlockState>> {
        match &self.sections[section_slot(y)?] {
            Some(section) => section.get_voxel_state(x, y, z).map(Some),
            None => Ok(None),
        }
    }

    /// Sets a block state at world coordinates, creating the section if needed.
    pub fn set_voxel_state_at(&mut self, x: i32, y: i32, z: i32, state: BlockState) -> Result<()> {
        let slot = section_slot(y)?;
        self.sections[slot]
            .get_or_insert_with(|| Section::new(slot as i8))
            .set_voxel_state(x, y, z, state)
    }

    /// Writes the live sections back into `Level.Sections` of the retained document.
    /// Stored sections with no live counterpart (outside the 0..16 slots, or light-only) are
    /// kept as they were.
    pub fn sync_document(&mut self) -> Result<()> {
        let mut list = Vec::new();
        if let Some(level) = self.document.root.get("Level") {
            if let Some(existing) = level.as_compound()?.get("Sections") {
                for tag in existing.as_list()? {
                    let y = tag.as_compound()?.require("Y")?.as_i8()?;
                    let live = usize::try_from(y)
                        .ok()
                        .and_then(|slot| self.sections.get(slot))
                        .is_some_and(Option::is_some);
                    if !live {
                        list.push(tag.clone());
                    }
                }
            }
        }
        for section in self.sections() {
            list.push(Tag::Compound(section.to_tag()?));
        }

        if !self.document.root.contains_key("Level") {
            self.document.root.insert("Level", Tag::Compound(Compound::new()));
        }
        let level = self
            .document
            .root
            .get_mut("Level")
            .ok_or_else(|| StrataError::Malformed("missing tag 'Level'".to_owned()))?
            .as_compound_mut()?;
        level.insert("Sections", Tag::List(list));
        Ok(())
    }

    /// Syncs the document and frames it as a compressed chunk payload.
    pub fn to_payload(&mut self, scheme: CompressionScheme) -> Result<Vec<u8>> {
        self.sync_document()?;
        compression::encode_payload(scheme, &self.document.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Palette;
    use assert_matches::assert_matches;

    fn stone() -> BlockState {
        BlockState::new("minecraft:stone")
    }

    fn section_tag(y: i8, with_palette: bool) -> Tag {
        let mut compound = Compound::new();
        compound.insert("Y", Tag::Byte(y));
        if with_palette {
            compound.insert(
                "Palette",
                Palette::from_list(vec![BlockState::air(), stone()]).to_tag(),
            );
            let mut words = vec![0i64; 256];
            words[0] = 1;
            compound.insert("BlockStates", Tag::LongArray(words));
        }
        Tag::Compound(compound)
    }

    fn payload(sections: Option<Vec<Tag>>) -> Vec<u8> {
        let mut level = Compound::new();
        level.insert("xPos", Tag::Int(0));
        if let Some(sections) = sections {
            level.insert("Sections", Tag::List(sections));
        }
        let mut root = Compound::new();
        root.insert("DataVersion", Tag::Int(2586));
        root.insert("Level", Tag::Compound(level));
        let bytes = NbtDocument::new("", root).to_bytes().unwrap();
        compression::encode_payload(CompressionScheme::Zlib, &bytes).unwrap()
    }

    fn read(bytes: Vec<u8>) -> Result<Chunk> {
        Chunk::read(&mut DataReader::from_bytes(bytes), 1234, None)
    }

    #[test]
    fn test_read_sections() {
        let sections = vec![
            section_tag(-1, false),
            section_tag(0, true),
            section_tag(1, false),
            section_tag(3, true),
            section_tag(16, true),
        ];
        let chunk = read(payload(Some(sections))).unwrap();

        assert_eq!(chunk.last_update(), 1234);
        assert_eq!(chunk.section_count(), 2);
        assert!(chunk.section(0).is_some());
        assert!(chunk.section(1).is_none());
        assert_eq!(chunk.section(3).map(Section::y), Some(3));
        assert!(chunk.section(16).is_none());

        assert_eq!(chunk.get_voxel_state_at(0, 48, 0).unwrap(), Some(&stone()));
        assert_eq!(chunk.get_voxel_state_at(1, 48, 0).unwrap(), Some(&BlockState::air()));
        assert_eq!(chunk.get_voxel_state_at(0, 20, 0).unwrap(), None);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let mut later = section_tag(0, true);
        later
            .as_compound_mut()
            .unwrap()
            .insert("BlockStates", Tag::LongArray(vec![0; 256]));
        let chunk = read(payload(Some(vec![section_tag(0, true), later]))).unwrap();
        assert_eq!(chunk.get_voxel_state_at(0, 0, 0).unwrap(), Some(&BlockState::air()));
    }

    #[test]
    fn test_missing_parts() {
        let chunk = read(payload(None)).unwrap();
        assert_eq!(chunk.section_count(), 0);

        let bytes = NbtDocument::new("", Compound::new()).to_bytes().unwrap();
        let no_level = compression::encode_payload(CompressionScheme::Gzip, &bytes).unwrap();
        assert_matches!(read(no_level), Err(StrataError::Malformed(_)));

        // Int root: no document at all
        let no_root =
            compression::encode_payload(CompressionScheme::Zlib, &[3, 0, 0, 0, 0, 0, 1]).unwrap();
        assert_matches!(read(no_root), Err(StrataError::Malformed(_)));
    }

    #[test]
    fn test_lazy_sections() {
        let mut chunk = Chunk::new();
        assert_eq!(chunk.last_update(), 0);
        assert!(chunk.document().get("Level").is_some());
        assert_eq!(chunk.get_voxel_state_at(3, 100, 3).unwrap(), None);

        chunk.set_voxel_state_at(3, 100, 3, stone()).unwrap();
        assert_eq!(chunk.section(6).map(Section::y), Some(6));
        assert_eq!(chunk.get_voxel_state_at(3, 100, 3).unwrap(), Some(&stone()));
        assert_eq!(chunk.get_voxel_state_at(3, 99, 3).unwrap(), Some(&BlockState::air()));

        assert_matches!(
            chunk.set_voxel_state_at(0, -1, 0, stone()),
            Err(StrataError::Bounds { index: -1, len: 16 })
        );
        assert_matches!(
            chunk.get_voxel_state_at(0, 256, 0),
            Err(StrataError::Bounds { index: 16, len: 16 })
        );
    }

    #[test]
    fn test_rebuild_sections() {
        let mut chunk = Chunk::new();
        for i in 0..16 {
            chunk
                .set_voxel_state_at(i, 0, 0, BlockState::new(format!("test:{}", i)))
                .unwrap();
        }
        chunk.set_voxel_state_at(0, 17, 0, stone()).unwrap();
        assert!(chunk.needs_rebuilding());

        assert_eq!(chunk.rebuild_sections().unwrap(), 1);
        assert!(!chunk.needs_rebuilding());
        assert_eq!(chunk.rebuild_sections().unwrap(), 0);
        assert_eq!(
            chunk.get_voxel_state_at(15, 0, 0).unwrap(),
            Some(&BlockState::new("test:15"))
        );
        // Second section untouched
        assert_eq!(chunk.get_voxel_state_at(0, 17, 0).unwrap(), Some(&stone()));
    }

    #[test]
    fn test_sync_and_reread() {
        let mut chunk = read(payload(Some(vec![section_tag(-1, false), section_tag(0, true)])))
            .unwrap();
        chunk.set_voxel_state_at(5, 40, 5, stone()).unwrap();

        let bytes = chunk.to_payload(CompressionScheme::Zlib).unwrap();
        let reread = read(bytes).unwrap();
        assert_eq!(reread.section_count(), 2);
        assert_eq!(reread.get_voxel_state_at(5, 40, 5).unwrap(), Some(&stone()));
        assert_eq!(reread.get_voxel_state_at(0, 0, 0).unwrap(), Some(&stone()));

        // The light-only section below the world survives, other root entries too
        let level = reread.document().get("Level").unwrap().as_compound().unwrap();
        assert_eq!(level.get("Sections").unwrap().as_list().unwrap().len(), 3);
        assert_eq!(reread.document().get("DataVersion"), Some(&Tag::Int(2586)));
    }

    #[test]
    fn test_sync_keeps_light_only_sections() {
        let mut light = Compound::new();
        light.insert("Y", Tag::Byte(5));
        light.insert("SkyLight", Tag::ByteArray(vec![7; 2048]));
        let mut chunk = read(payload(Some(vec![Tag::Compound(light.clone())]))).unwrap();
        assert_eq!(chunk.section_count(), 0);

        chunk.sync_document().unwrap();
        let level = chunk.document().get("Level").unwrap().as_compound().unwrap();
        assert_matches!(
            level.get("Sections").unwrap().as_list().unwrap().as_slice(),
            [Tag::Compound(kept)] if *kept == light
        );

        // A live section in another slot does not displace it
        chunk.set_voxel_state_at(0, 0, 0, stone()).unwrap();
        let reread = read(chunk.to_payload(CompressionScheme::Zlib).unwrap()).unwrap();
        assert_eq!(reread.section_count(), 1);
        assert_eq!(reread.get_voxel_state_at(0, 0, 0).unwrap(), Some(&stone()));
        let level = reread.document().get("Level").unwrap().as_compound().unwrap();
        let sections = level.get("Sections").unwrap().as_list().unwrap();
        assert_eq!(sections.len(), 2);
        assert!(sections.contains(&Tag::Compound(light)));
    }
}
