//! Anvil region storage: compressed chunk payloads, sections with palettes and bit-packed
//! block state indices, and the 32x32 region container.

pub mod bit_array;
pub mod chunk;
pub mod compression;
pub mod palette;
pub mod region;
pub mod section;

pub use bit_array::{bits_needed, BitPackedArray, PackingPolicy};
pub use chunk::Chunk;
pub use compression::CompressionScheme;
pub use palette::{BlockState, Palette};
pub use region::{LoadOptions, LoadReport, Region};
pub use section::Section;
