use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::StrataError>;

/// World voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Column the voxel belongs to.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }
}

/// Chunk column coordinates (world voxel coordinates >> 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Region the column belongs to.
    pub fn region(&self) -> (i32, i32) {
        (self.x >> 5, self.z >> 5)
    }
}
