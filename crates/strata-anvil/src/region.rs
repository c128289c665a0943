use crate::chunk::Chunk;
use crate::palette::BlockState;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use strata_codec::DataReader;
use strata_common::error::StrataError;
use strata_common::types::{BlockPos, ChunkPos, Result};
use strata_common::StrataConfig;
use strata_logger::{log, LogSeverity};

/// Chunk slots in a region: a 32x32 grid.
pub const REGION_SLOTS: usize = 1024;
/// Size of one sector; header tables and chunk payloads are sector aligned.
pub const SECTOR_BYTES: u64 = 4096;
/// Width of the region grid in chunks.
pub const REGION_WIDTH: i32 = 32;

const LENGTH_FIELD_BYTES: usize = 4;

/// Slot of a chunk within its region. Coordinates are taken modulo 32.
pub fn chunk_index(chunk_x: i32, chunk_z: i32) -> usize {
    ((chunk_x & 31) + (chunk_z & 31) * REGION_WIDTH) as usize
}

/// Parses `r.<x>.<z>.mca` into region coordinates.
pub fn parse_region_file_name(name: &str) -> Option<(i32, i32)> {
    let mut parts = name.split('.');
    if parts.next()? != "r" {
        return None;
    }
    let x = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next()? != "mca" || parts.next().is_some() {
        return None;
    }
    Some((x, z))
}

fn check_slot(index: usize) -> Result<()> {
    if index < REGION_SLOTS {
        Ok(())
    } else {
        Err(StrataError::Bounds {
            index: index as i64,
            len: REGION_SLOTS,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Return the first chunk failure instead of recording it and moving on.
    pub fail_fast: bool,
    /// Reject payloads whose declared length runs past their allocated sectors.
    pub check_sector_bounds: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            check_sector_bounds: true,
        }
    }
}

impl From<&StrataConfig> for LoadOptions {
    fn from(config: &StrataConfig) -> Self {
        Self {
            fail_fast: config.fail_fast,
            check_sector_bounds: config.check_sector_bounds,
        }
    }
}

/// A chunk that could not be decoded. Its slot stays empty.
#[derive(Debug)]
pub struct ChunkFailure {
    pub slot: usize,
    pub error: StrataError,
}

/// Outcome of one load pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failures: Vec<ChunkFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Location table entry of one slot.
#[derive(Debug, Clone, Copy)]
struct SlotLocation {
    sector: u32,
    sector_count: u8,
}

impl SlotLocation {
    fn from_raw(raw: u32) -> Self {
        Self {
            sector: raw >> 8,
            sector_count: (raw & 0xFF) as u8,
        }
    }

    fn is_allocated(&self) -> bool {
        self.sector != 0 && self.sector_count != 0
    }
}

/// A 32x32 grid of chunk columns stored in one `.mca` file.
#[derive(Debug, Clone)]
pub struct Region {
    x: i32,
    z: i32,
    chunks: Vec<Option<Chunk>>,
}

impl Region {
    pub fn new(x: i32, z: i32) -> Self {
        Self {
            x,
            z,
            chunks: vec![None; REGION_SLOTS],
        }
    }

    /// Opens and decodes a region file. Coordinates come from an `r.<x>.<z>.mca` file name and
    /// default to (0, 0) for any other name.
    pub fn open<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<(Self, LoadReport)> {
        let path = path.as_ref();
        let (x, z) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_region_file_name)
            .unwrap_or((0, 0));

        let file = File::open(path)?;
        let mut reader = DataReader::new(BufReader::new(file));
        let mut region = Region::new(x, z);
        let report = region.deserialize(&mut reader, options)?;
        Ok((region, report))
    }

    /// Decodes every allocated slot, replacing the current contents once the pass is done.
    ///
    /// A broken header aborts the load. A broken chunk leaves its slot empty and is recorded
    /// in the report, unless `fail_fast` is set, in which case its error is returned and the
    /// region keeps its previous contents.
    pub fn deserialize<R: Read + Seek>(
        &mut self,
        reader: &mut DataReader<R>,
        options: &LoadOptions,
    ) -> Result<LoadReport> {
        reader.seek(0)?;
        let mut locations = Vec::with_capacity(REGION_SLOTS);
        for _ in 0..REGION_SLOTS {
            locations.push(SlotLocation::from_raw(reader.read_u32()?));
        }
        let mut timestamps = Vec::with_capacity(REGION_SLOTS);
        for _ in 0..REGION_SLOTS {
            timestamps.push(reader.read_u32()?);
        }

        let mut chunks = vec![None; REGION_SLOTS];
        let mut report = LoadReport::default();
        for (slot, location) in locations.iter().enumerate() {
            if !location.is_allocated() {
                continue;
            }

            match self.read_slot(reader, location, timestamps[slot], options) {
                Ok(chunk) => {
                    log(
                        format!(
                            "Region ({}, {}): slot {} at sector {} with {} sections",
                            self.x,
                            self.z,
                            slot,
                            location.sector,
                            chunk.section_count()
                        ),
                        LogSeverity::Debug,
                    );
                    chunks[slot] = Some(chunk);
                    report.loaded += 1;
                }
                Err(error) if options.fail_fast => return Err(error),
                Err(error) => {
                    log(
                        format!(
                            "Region ({}, {}): skipping slot {} at sector {}: {}",
                            self.x, self.z, slot, location.sector, error
                        ),
                        LogSeverity::Warning,
                    );
                    report.failures.push(ChunkFailure { slot, error });
                }
            }
        }

        self.chunks = chunks;
        log(
            format!(
                "Region ({}, {}): loaded {} chunks, {} failed",
                self.x,
                self.z,
                report.loaded,
                report.failures.len()
            ),
            LogSeverity::Info,
        );
        Ok(report)
    }

    fn read_slot<R: Read + Seek>(
        &self,
        reader: &mut DataReader<R>,
        location: &SlotLocation,
        timestamp: u32,
        options: &LoadOptions,
    ) -> Result<Chunk> {
        if (location.sector as u64) < 2 {
            return Err(StrataError::Corruption(format!(
                "chunk sector {} overlaps the header",
                location.sector
            )));
        }
        let max_len = options
            .check_sector_bounds
            .then(|| location.sector_count as usize * SECTOR_BYTES as usize - LENGTH_FIELD_BYTES);

        reader.seek(location.sector as u64 * SECTOR_BYTES)?;
        Chunk::read(reader, timestamp, max_len)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn get_chunk(&self, index: usize) -> Result<Option<&Chunk>> {
        check_slot(index)?;
        Ok(self.chunks[index].as_ref())
    }

    pub fn get_chunk_mut(&mut self, index: usize) -> Result<Option<&mut Chunk>> {
        check_slot(index)?;
        Ok(self.chunks[index].as_mut())
    }

    /// Stores `chunk` at `index` and returns what was there.
    pub fn set_chunk(&mut self, index: usize, chunk: Chunk) -> Result<Option<Chunk>> {
        check_slot(index)?;
        Ok(self.chunks[index].replace(chunk))
    }

    /// Chunk at a column position, taken modulo 32.
    pub fn chunk_at(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks[chunk_index(pos.x, pos.z)].as_ref()
    }

    /// Whether the column lies inside this region rather than aliasing into it.
    pub fn contains(&self, pos: ChunkPos) -> bool {
        pos.region() == (self.x, self.z)
    }

    /// Chunk containing world voxel coordinates `x`, `z`, created empty if absent.
    pub fn get_or_create_chunk(&mut self, x: i32, z: i32) -> &mut Chunk {
        let pos = BlockPos::new(x, 0, z).chunk();
        self.chunks[chunk_index(pos.x, pos.z)].get_or_insert_with(Chunk::new)
    }

    pub fn set_voxel_state_at(&mut self, x: i32, y: i32, z: i32, state: BlockState) -> Result<()> {
        self.get_or_create_chunk(x, z).set_voxel_state_at(x, y, z, state)
    }

    /// Block state at world coordinates; `None` when the chunk or section is absent.
    pub fn get_voxel_state_at(&self, x: i32, y: i32, z: i32) -> Result<Option<&BlockState>> {
        match self.chunk_at(BlockPos::new(x, y, z).chunk()) {
            Some(chunk) => chunk.get_voxel_state_at(x, y, z),
            None => Ok(None),
        }
    }

    /// Rebuilds every stale section in the region and returns how many there were.
    pub fn rebuild_chunks(&mut self) -> Result<usize> {
        let mut rebuilt = 0;
        for chunk in self.chunks.iter_mut().flatten() {
            rebuilt += chunk.rebuild_sections()?;
        }
        Ok(rebuilt)
    }

    /// Allocated slots with their chunks, in slot order.
    pub fn chunks(&self) -> impl Iterator<Item = (usize, &Chunk)> {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(slot, chunk)| chunk.as_ref().map(|chunk| (slot, chunk)))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    #[test]
    fn test_chunk_index_is_a_bijection() {
        let mut seen = HashSet::new();
        for z in 0..32 {
            for x in 0..32 {
                let index = chunk_index(x, z);
                assert!(index < REGION_SLOTS);
                assert!(seen.insert(index));
            }
        }
        assert_eq!(seen.len(), REGION_SLOTS);

        assert_eq!(chunk_index(31, 31), 1023);
        assert_eq!(chunk_index(1, 2), 65);
        // Negative and out-of-region coordinates wrap
        assert_eq!(chunk_index(-1, -1), 1023);
        assert_eq!(chunk_index(33, 0), 1);
    }

    #[test]
    fn test_slot_bounds() {
        let mut region = Region::new(0, 0);
        assert_matches!(region.get_chunk(1023), Ok(None));
        assert_matches!(
            region.get_chunk(1024),
            Err(StrataError::Bounds { index: 1024, len: 1024 })
        );
        assert_matches!(region.set_chunk(1024, Chunk::new()), Err(StrataError::Bounds { .. }));
        assert_matches!(region.get_chunk_mut(usize::MAX), Err(StrataError::Bounds { .. }));

        assert!(region.set_chunk(5, Chunk::new()).unwrap().is_none());
        assert!(region.set_chunk(5, Chunk::new()).unwrap().is_some());
        assert_eq!(region.chunks().map(|(slot, _)| slot).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_parse_region_file_name() {
        assert_eq!(parse_region_file_name("r.0.0.mca"), Some((0, 0)));
        assert_eq!(parse_region_file_name("r.-1.12.mca"), Some((-1, 12)));
        assert_eq!(parse_region_file_name("r.1.2.mcr"), None);
        assert_eq!(parse_region_file_name("r.a.2.mca"), None);
        assert_eq!(parse_region_file_name("r.1.2.mca.bak"), None);
        assert_eq!(parse_region_file_name("level.dat"), None);
    }

    #[test]
    fn test_voxels_through_the_region() {
        let mut region = Region::new(-1, -1);
        let stone = BlockState::new("minecraft:stone");
        assert_eq!(region.get_voxel_state_at(-5, 64, -20).unwrap(), None);

        region.set_voxel_state_at(-5, 64, -20, stone.clone()).unwrap();
        assert_eq!(region.chunk_count(), 1);
        // x = -5 -> chunk -1, z = -20 -> chunk -2
        assert!(region.chunk_at(ChunkPos { x: -1, z: -2 }).is_some());
        assert!(region.contains(ChunkPos { x: -1, z: -2 }));
        // Same slot, other region
        assert!(region.chunk_at(ChunkPos { x: 31, z: 30 }).is_some());
        assert!(!region.contains(ChunkPos { x: 31, z: 30 }));
        assert!(region.get_chunk(chunk_index(31, 30)).unwrap().is_some());

        assert_eq!(region.get_voxel_state_at(-5, 64, -20).unwrap(), Some(&stone));
        assert_eq!(
            region.get_voxel_state_at(-6, 64, -20).unwrap(),
            Some(&BlockState::air())
        );
        assert_eq!(region.rebuild_chunks().unwrap(), 0);
    }

    #[test]
    fn test_empty_and_short_headers() {
        let mut region = Region::new(0, 0);
        let mut reader = DataReader::from_bytes(vec![0; 2 * SECTOR_BYTES as usize]);
        let report = region.deserialize(&mut reader, &LoadOptions::default()).unwrap();
        assert_eq!(report.loaded, 0);
        assert!(report.is_clean());

        let mut reader = DataReader::from_bytes(vec![0; 100]);
        assert_matches!(
            region.deserialize(&mut reader, &LoadOptions::default()),
            Err(StrataError::EndOfData)
        );
    }

    #[test]
    fn test_options_from_config() {
        let config = StrataConfig {
            fail_fast: true,
            check_sector_bounds: false,
            ..Default::default()
        };
        let options = LoadOptions::from(&config);
        assert!(options.fail_fast);
        assert!(!options.check_sector_bounds);
        assert_eq!(LoadOptions::from(&StrataConfig::default()), LoadOptions::default());
    }
}
