//! Big-endian primitive codec shared by the tag tree and the region container.

pub mod reader;
pub mod writer;

pub use reader::DataReader;
pub use writer::DataWriter;

/// Maximum encoded size of a VarInt in bytes.
pub const VAR_INT_MAX_BYTES: usize = 5;
/// Maximum encoded size of a VarLong in bytes.
pub const VAR_LONG_MAX_BYTES: usize = 10;
