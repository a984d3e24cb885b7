//! Filesystem geometry and structure address arithmetic.

use fscope_engine::MetaDevice;

use crate::superblock::{u32_le, Superblock, SUPERBLOCK_OFFSET};
use crate::Ext2Error;

/// Size of one block group descriptor on disk.
pub const GROUP_DESCRIPTOR_SIZE: u64 = 32;

/// Everything the navigation commands need to turn structure coordinates
/// (group N, inode N, bitmap of group N) into device byte offsets. Built
/// from a detected superblock, or from configured fallback defaults when
/// autodetection is skipped or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: u64,
    pub blocks_count: u64,
    pub blocks_per_group: u64,
    pub inodes_count: u64,
    pub inodes_per_group: u64,
    pub inode_size: u64,
    pub first_data_block: u64,
}

impl Geometry {
    pub fn from_superblock(sb: &Superblock) -> Geometry {
        Geometry {
            block_size: sb.block_size as u64,
            blocks_count: sb.blocks_count as u64,
            blocks_per_group: sb.blocks_per_group as u64,
            inodes_count: sb.inodes_count as u64,
            inodes_per_group: sb.inodes_per_group as u64,
            inode_size: sb.inode_size as u64,
            first_data_block: sb.first_data_block as u64,
        }
    }

    /// Defaults used when no ext2 filesystem is detected or detection is
    /// forced off. Inode geometry gets conservative revision-0 values.
    pub fn fallback(block_size: u64, blocks_count: u64, blocks_per_group: u64) -> Geometry {
        Geometry {
            block_size,
            blocks_count,
            blocks_per_group,
            inodes_count: blocks_per_group,
            inodes_per_group: blocks_per_group,
            inode_size: 128,
            first_data_block: if block_size == 1024 { 1 } else { 0 },
        }
    }

    pub fn group_count(&self) -> u64 {
        self.blocks_count.div_ceil(self.blocks_per_group)
    }

    /// Byte offset of the group descriptor table: the block after the
    /// superblock's block.
    pub fn descriptor_table_offset(&self) -> u64 {
        (self.first_data_block + 1) * self.block_size
    }

    /// Byte offset of group `group`'s descriptor.
    pub fn group_descriptor_offset(&self, group: u64) -> Result<u64, Ext2Error> {
        if group >= self.group_count() {
            return Err(Ext2Error::GroupOutOfRange {
                group,
                count: self.group_count(),
            });
        }
        Ok(self.descriptor_table_offset() + group * GROUP_DESCRIPTOR_SIZE)
    }

    /// Byte offset of backup superblock copy `copy` (copy 0 is the primary).
    pub fn superblock_copy_offset(&self, copy: u64) -> Result<u64, Ext2Error> {
        if copy == 0 {
            return Ok(SUPERBLOCK_OFFSET);
        }
        if copy >= self.group_count() {
            return Err(Ext2Error::GroupOutOfRange {
                group: copy,
                count: self.group_count(),
            });
        }
        Ok((self.first_data_block + copy * self.blocks_per_group) * self.block_size)
    }

    pub fn group_of_inode(&self, inode: u64) -> Result<u64, Ext2Error> {
        if inode == 0 || (self.inodes_count > 0 && inode > self.inodes_count) {
            return Err(Ext2Error::InodeOutOfRange(inode));
        }
        Ok((inode - 1) / self.inodes_per_group)
    }
}

/// One group's descriptor, read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
}

pub fn read_group_descriptor(
    device: &mut dyn MetaDevice,
    geometry: &Geometry,
    group: u64,
) -> Result<GroupDescriptor, Ext2Error> {
    let offset = geometry.group_descriptor_offset(group)?;
    let mut buf = [0u8; GROUP_DESCRIPTOR_SIZE as usize];
    device.read_at(offset, &mut buf)?;
    Ok(GroupDescriptor {
        block_bitmap: u32_le(&buf, 0),
        inode_bitmap: u32_le(&buf, 4),
        inode_table: u32_le(&buf, 8),
    })
}

/// Device byte offset of inode `inode` (1-based, per ext2 convention).
pub fn locate_inode(
    device: &mut dyn MetaDevice,
    geometry: &Geometry,
    inode: u64,
) -> Result<u64, Ext2Error> {
    let group = geometry.group_of_inode(inode)?;
    let descriptor = read_group_descriptor(device, geometry, group)?;
    let index = (inode - 1) % geometry.inodes_per_group;
    Ok(descriptor.inode_table as u64 * geometry.block_size + index * geometry.inode_size)
}

/// Device byte offset of group `group`'s block bitmap.
pub fn locate_block_bitmap(
    device: &mut dyn MetaDevice,
    geometry: &Geometry,
    group: u64,
) -> Result<u64, Ext2Error> {
    let descriptor = read_group_descriptor(device, geometry, group)?;
    Ok(descriptor.block_bitmap as u64 * geometry.block_size)
}

/// Device byte offset of group `group`'s inode bitmap.
pub fn locate_inode_bitmap(
    device: &mut dyn MetaDevice,
    geometry: &Geometry,
    group: u64,
) -> Result<u64, Ext2Error> {
    let descriptor = read_group_descriptor(device, geometry, group)?;
    Ok(descriptor.inode_bitmap as u64 * geometry.block_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> Geometry {
        Geometry {
            block_size: 1024,
            blocks_count: 8192,
            blocks_per_group: 8192,
            inodes_count: 2048,
            inodes_per_group: 2048,
            inode_size: 128,
            first_data_block: 1,
        }
    }

    #[test]
    fn descriptor_table_follows_the_superblock_block() {
        // 1024-byte blocks: superblock is block 1, descriptors start at 2.
        assert_eq!(geometry().descriptor_table_offset(), 2048);

        let mut four_k = geometry();
        four_k.block_size = 4096;
        four_k.first_data_block = 0;
        assert_eq!(four_k.descriptor_table_offset(), 4096);
    }

    #[test]
    fn group_descriptor_offsets_step_by_entry_size() {
        let geo = geometry();
        assert_eq!(geo.group_descriptor_offset(0).unwrap(), 2048);

        let mut multi = geo.clone();
        multi.blocks_count = 3 * 8192;
        assert_eq!(multi.group_descriptor_offset(2).unwrap(), 2048 + 64);
        assert!(multi.group_descriptor_offset(3).is_err());
    }

    #[test]
    fn superblock_copies_land_on_group_boundaries() {
        let mut geo = geometry();
        geo.blocks_count = 4 * 8192;
        assert_eq!(geo.superblock_copy_offset(0).unwrap(), 1024);
        assert_eq!(geo.superblock_copy_offset(1).unwrap(), (1 + 8192) * 1024);
        assert!(geo.superblock_copy_offset(4).is_err());
    }

    #[test]
    fn inode_group_mapping_is_one_based() {
        let geo = geometry();
        assert_eq!(geo.group_of_inode(1).unwrap(), 0);
        assert_eq!(geo.group_of_inode(2048).unwrap(), 0);
        assert!(geo.group_of_inode(0).is_err());
        assert!(geo.group_of_inode(4096).is_err());
    }

    #[test]
    fn fallback_geometry_uses_revision_zero_inodes() {
        let geo = Geometry::fallback(1024, 2097151, 8192);
        assert_eq!(geo.inode_size, 128);
        assert_eq!(geo.first_data_block, 1);
        assert_eq!(geo.group_count(), 256);
    }
}
