//! fscope ext2 layer.
//!
//! Everything filesystem-specific lives here, on top of the generic engine:
//! the file/block-device collaborator (including mounted-state detection),
//! ext2 superblock parsing and autodetection, and the geometry arithmetic
//! that turns "inode 12 of group 3" into a device byte offset.

pub mod device;
pub mod geometry;
pub mod superblock;

pub use device::Device;
pub use geometry::Geometry;
pub use superblock::{Superblock, EXT2_MAGIC, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Ext2Error {
    #[error("cannot open `{path}`: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an ext2 filesystem (magic 0x{found:04X}, expected 0xEF53)")]
    BadMagic { found: u16 },

    #[error("superblock buffer too short ({0} bytes)")]
    ShortSuperblock(usize),

    #[error("block group {group} is out of range (filesystem has {count} groups)")]
    GroupOutOfRange { group: u64, count: u64 },

    #[error("inode {0} is out of range")]
    InodeOutOfRange(u64),
}
