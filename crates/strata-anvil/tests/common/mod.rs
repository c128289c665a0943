#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};
use strata_anvil::compression::encode_payload;
use strata_anvil::{BlockState, CompressionScheme, Palette};
use strata_nbt::{Compound, NbtDocument, Tag};

pub const SECTOR: usize = 4096;

pub fn stone() -> BlockState {
    BlockState::new("minecraft:stone")
}

/// Section compound at `y` with an `[air, stone]` palette and every voxel at index 0.
pub fn two_entry_section(y: i8) -> Compound {
    let mut section = Compound::new();
    section.insert("Y", Tag::Byte(y));
    section.insert(
        "Palette",
        Palette::from_list(vec![BlockState::air(), stone()]).to_tag(),
    );
    section.insert("BlockStates", Tag::LongArray(vec![0; 256]));
    section
}

pub fn chunk_document(sections: Vec<Compound>) -> NbtDocument {
    let mut level = Compound::new();
    level.insert("xPos", Tag::Int(0));
    level.insert("zPos", Tag::Int(0));
    level.insert(
        "Sections",
        Tag::List(sections.into_iter().map(Tag::Compound).collect()),
    );

    let mut root = Compound::new();
    root.insert("DataVersion", Tag::Int(2586));
    root.insert("Level", Tag::Compound(level));
    NbtDocument::new("", root)
}

pub fn chunk_payload(scheme: CompressionScheme, sections: Vec<Compound>) -> Vec<u8> {
    let bytes = chunk_document(sections).to_bytes().unwrap();
    encode_payload(scheme, &bytes).unwrap()
}

/// Lays out chunk payloads in a region file, one after the other from sector 2.
#[derive(Default)]
pub struct RegionBuilder {
    chunks: Vec<(usize, u32, Vec<u8>)>,
    overrides: Vec<(usize, u32, u8)>,
}

impl RegionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(mut self, slot: usize, timestamp: u32, payload: Vec<u8>) -> Self {
        self.chunks.push((slot, timestamp, payload));
        self
    }

    /// Forces a location table entry, written after the real ones.
    pub fn location(mut self, slot: usize, sector: u32, sector_count: u8) -> Self {
        self.overrides.push((slot, sector, sector_count));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut locations = vec![0u32; 1024];
        let mut timestamps = vec![0u32; 1024];
        let mut body = Vec::new();
        let mut next_sector = 2u32;

        for (slot, timestamp, mut payload) in self.chunks {
            let count = payload.len().div_ceil(SECTOR);
            payload.resize(count * SECTOR, 0);
            locations[slot] = (next_sector << 8) | count as u32;
            timestamps[slot] = timestamp;
            body.extend_from_slice(&payload);
            next_sector += count as u32;
        }
        for (slot, sector, count) in self.overrides {
            locations[slot] = (sector << 8) | count as u32;
        }

        let mut out = Vec::with_capacity(2 * SECTOR + body.len());
        for location in locations {
            out.write_u32::<BigEndian>(location).unwrap();
        }
        for timestamp in timestamps {
            out.write_u32::<BigEndian>(timestamp).unwrap();
        }
        out.extend_from_slice(&body);
        out
    }
}
