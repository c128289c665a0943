use crate::bit_array::{bits_needed, BitPackedArray, PackingPolicy, MIN_BITS_PER_BLOCK};
use crate::palette::{BlockState, Palette};
use strata_common::error::StrataError;
use strata_common::types::Result;
use strata_logger::{log, LogSeverity};
use strata_nbt::{Compound, Tag};

/// Voxels in one 16x16x16 section.
pub const SECTION_VOLUME: usize = 4096;

const MANAGED_KEYS: [&str; 5] = ["Y", "Palette", "BlockStates", "BlockLight", "SkyLight"];

/// Position of a voxel inside its section's index array. Coordinates are taken modulo 16.
pub fn voxel_index(x: i32, y: i32, z: i32) -> usize {
    (((y & 0xF) << 8) | ((z & 0xF) << 4) | (x & 0xF)) as usize
}

/// A 16x16x16 block of voxels: a palette plus one packed palette index per voxel.
#[derive(Debug, Clone)]
pub struct Section {
    y: i8,
    palette: Palette,
    states: BitPackedArray,
    block_light: Option<Vec<i8>>,
    sky_light: Option<Vec<i8>>,
    /// Entries of the section compound this type does not interpret.
    extra: Compound,
    needs_rebuilding: bool,
    /// Writes made while the index array was stale, applied by `rebuild`.
    pending: Vec<(usize, u32)>,
}

impl Section {
    /// Fresh section: air at palette index 0 and every voxel pointing at it.
    pub fn new(y: i8) -> Self {
        Self {
            y,
            palette: Palette::with_background(BlockState::air()),
            states: zeroed_states(MIN_BITS_PER_BLOCK, PackingPolicy::Aligned),
            block_light: None,
            sky_light: None,
            extra: Compound::new(),
            needs_rebuilding: false,
            pending: Vec::new(),
        }
    }

    /// Decodes one element of `Level.Sections`.
    ///
    /// A missing `Palette` yields an empty section. A missing `BlockStates` means every
    /// voxel holds palette index 0. The packing policy of stored data is inferred from the
    /// length of `BlockStates`.
    pub fn from_tag(compound: &Compound) -> Result<Self> {
        let y = compound.require("Y")?.as_i8()?;

        let palette = match compound.get("Palette") {
            Some(tag) => Palette::from_tag(tag)?,
            None => Palette::default(),
        };
        let bits = bits_needed(palette.len());

        let states = match compound.get("BlockStates") {
            Some(tag) => {
                let words: Vec<u64> = tag.as_long_array()?.iter().map(|&l| l as u64).collect();
                let policy =
                    PackingPolicy::detect(SECTION_VOLUME, bits, words.len()).ok_or_else(|| {
                        StrataError::Corruption(format!(
                            "section {}: {} block state words do not fit {} bits per block",
                            y,
                            words.len(),
                            bits
                        ))
                    })?;
                BitPackedArray::from_words(words, SECTION_VOLUME, bits, policy)?
            }
            None => zeroed_states(bits, PackingPolicy::Aligned),
        };

        let block_light = compound
            .get("BlockLight")
            .map(|tag| tag.as_byte_array().map(<[i8]>::to_vec))
            .transpose()?;
        let sky_light = compound
            .get("SkyLight")
            .map(|tag| tag.as_byte_array().map(<[i8]>::to_vec))
            .transpose()?;

        let extra = compound
            .iter()
            .filter(|(name, _)| !MANAGED_KEYS.contains(name))
            .map(|(name, tag)| (name.to_owned(), tag.clone()))
            .collect();

        Ok(Self {
            y,
            palette,
            states,
            block_light,
            sky_light,
            extra,
            needs_rebuilding: false,
            pending: Vec::new(),
        })
    }

    /// Regenerates the section compound. Stale index data is repacked on the fly, the
    /// section itself is left untouched.
    pub fn to_tag(&self) -> Result<Compound> {
        let states = if self.needs_rebuilding {
            self.rebuilt_states()?
        } else {
            self.states.clone()
        };

        let mut compound = Compound::new();
        compound.insert("Y", Tag::Byte(self.y));
        if !self.palette.is_empty() {
            compound.insert("Palette", self.palette.to_tag());
            compound.insert(
                "BlockStates",
                Tag::LongArray(states.words().iter().map(|&w| w as i64).collect()),
            );
        }
        if let Some(light) = &self.block_light {
            compound.insert("BlockLight", Tag::ByteArray(light.clone()));
        }
        if let Some(light) = &self.sky_light {
            compound.insert("SkyLight", Tag::ByteArray(light.clone()));
        }
        for (name, tag) in self.extra.iter() {
            compound.insert(name, tag.clone());
        }
        Ok(compound)
    }

    pub fn y(&self) -> i8 {
        self.y
    }

    /// True when there is no palette data.
    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }

    pub fn needs_rebuilding(&self) -> bool {
        self.needs_rebuilding
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn states(&self) -> &BitPackedArray {
        &self.states
    }

    /// Width the index array is currently stored at.
    pub fn bits_per_block(&self) -> u8 {
        self.states.bits_per_value()
    }

    pub fn block_light(&self) -> Option<&[i8]> {
        self.block_light.as_deref()
    }

    pub fn sky_light(&self) -> Option<&[i8]> {
        self.sky_light.as_deref()
    }

    pub fn get_voxel_state(&self, x: i32, y: i32, z: i32) -> Result<&BlockState> {
        let index = self.states.get(voxel_index(x, y, z))?;
        let index = u32::try_from(index)
            .map_err(|_| StrataError::Corruption(format!("palette index {} too large", index)))?;
        self.palette.require(index)
    }

    /// Points a voxel at `state`, appending it to the palette if needed.
    ///
    /// When the append pushes the palette past what the current width can index, the write
    /// is queued and the section is flagged; reads keep seeing the old data until
    /// [`Section::rebuild`].
    pub fn set_voxel_state(&mut self, x: i32, y: i32, z: i32, state: BlockState) -> Result<()> {
        let position = voxel_index(x, y, z);
        let before = bits_needed(self.palette.len());
        let (index, appended) = self.palette.insert(state);
        let after = bits_needed(self.palette.len());

        if appended && after != before {
            log(
                format!(
                    "Section {}: palette grew to {} entries, {} -> {} bits per block",
                    self.y,
                    self.palette.len(),
                    before,
                    after
                ),
                LogSeverity::Debug,
            );
            self.needs_rebuilding = true;
        }

        if self.needs_rebuilding {
            self.pending.push((position, index));
            Ok(())
        } else {
            self.states.set(position, index as u64)
        }
    }

    /// Repacks the index array at the width the palette now needs and applies queued writes.
    pub fn rebuild(&mut self) -> Result<()> {
        if !self.needs_rebuilding {
            return Ok(());
        }
        let old_bits = self.states.bits_per_value();
        self.states = self.rebuilt_states()?;
        self.pending.clear();
        self.needs_rebuilding = false;

        log(
            format!(
                "Section {}: rebuilt index array {} -> {} bits per block",
                self.y,
                old_bits,
                self.states.bits_per_value()
            ),
            LogSeverity::Debug,
        );
        Ok(())
    }

    fn rebuilt_states(&self) -> Result<BitPackedArray> {
        let mut states = self.states.repack(bits_needed(self.palette.len()))?;
        for &(position, index) in &self.pending {
            states.set(position, index as u64)?;
        }
        Ok(states)
    }
}

fn zeroed_states(bits: u8, policy: PackingPolicy) -> BitPackedArray {
    let words = vec![0; policy.required_words(SECTION_VOLUME, bits)];
    BitPackedArray::from_parts(words, SECTION_VOLUME, bits, policy)
}
