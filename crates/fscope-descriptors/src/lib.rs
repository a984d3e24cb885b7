//! fscope structure-descriptor language
//!
//! This crate defines the declarative layout source consumed by the fscope
//! engine: a small C-flavored text format naming each on-disk structure kind
//! and its fields, plus the typed model (`StructDescriptor`) the rest of the
//! workspace references.
//!
//! A descriptor file looks like:
//!
//! ```text
//! # ext2 superblock, first 1024 bytes of block group 0
//! struct super_block {
//!         ulong   s_inodes_count;
//!         ulong   s_blocks_count;
//!         ushort  s_magic;
//!         char    s_volume_name[16];
//! }
//! ```
//!
//! Field offsets are the running sum of field sizes in declaration order;
//! all multi-byte fields are little-endian on disk.

pub mod model;
pub mod parse;

pub use model::{FieldDescriptor, FieldKind, StructDescriptor};
pub use parse::{parse_descriptors, DescriptorError};
