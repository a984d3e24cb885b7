//! ext2 superblock parsing and autodetection.

use fscope_engine::MetaDevice;

use crate::Ext2Error;

/// ext2 magic number (`s_magic`).
pub const EXT2_MAGIC: u16 = 0xEF53;

/// The superblock always lives at byte offset 1024, whatever the block size.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;

/// Parsed view of the fields fscope needs for navigation. The raw bytes stay
/// available through the descriptor catalogue; this struct only feeds the
/// geometry arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub first_data_block: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub rev_level: u32,
    pub inode_size: u16,
    pub magic: u16,
}

impl Superblock {
    /// Parse a superblock image. All fields are little-endian; the block
    /// size is `1024 << s_log_block_size`; revision 0 filesystems have a
    /// fixed 128-byte inode.
    pub fn parse(buf: &[u8]) -> Result<Superblock, Ext2Error> {
        if buf.len() < 128 {
            return Err(Ext2Error::ShortSuperblock(buf.len()));
        }
        let magic = u16_le(buf, 56);
        if magic != EXT2_MAGIC {
            return Err(Ext2Error::BadMagic { found: magic });
        }

        let log_block_size = u32_le(buf, 24);
        let rev_level = u32_le(buf, 76);
        let inode_size = if rev_level >= 1 { u16_le(buf, 88) } else { 128 };

        Ok(Superblock {
            inodes_count: u32_le(buf, 0),
            blocks_count: u32_le(buf, 4),
            first_data_block: u32_le(buf, 20),
            block_size: 1024u32 << log_block_size,
            blocks_per_group: u32_le(buf, 32),
            inodes_per_group: u32_le(buf, 40),
            rev_level,
            inode_size,
            magic,
        })
    }
}

/// Read the superblock from an open device and parse it.
pub fn detect(device: &mut dyn MetaDevice) -> Result<Superblock, Ext2Error> {
    let mut buf = vec![0u8; SUPERBLOCK_SIZE];
    device.read_at(SUPERBLOCK_OFFSET, &mut buf)?;
    let superblock = Superblock::parse(&buf)?;
    tracing::debug!(
        blocks = superblock.blocks_count,
        block_size = superblock.block_size,
        groups = superblock.blocks_per_group,
        "detected ext2 filesystem"
    );
    Ok(superblock)
}

pub(crate) fn u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
