use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::block::BLOCK_SIZE;

/// [Inode] size on disk.
pub const INODE_SIZE: usize = size_of::<Inode>();

/// How many inodes fit in a block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// How many block pointers fit in an indirect block.
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<U32>();

/// Number of direct pointers in an inode.
pub const DIRECT_PTRS: usize = 4;

/// Logical blocks addressable through the pointer tree:
/// direct, plus single-indirect, plus double-indirect.
pub const MAX_FILE_BLOCKS: u64 =
    (DIRECT_PTRS + PTRS_PER_BLOCK + PTRS_PER_BLOCK * PTRS_PER_BLOCK) as u64;

const STATUS_FREE: u8 = 0;
const STATUS_ALLOCATED: u8 = 1;

/// A file's on-disk record: status, size and the roots of the pointer tree.
/// A pointer value of 0 means "none".
#[repr(C)]
#[derive(Default, Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable)]
pub struct Inode {
    status: u8,
    _pad: [u8; 3],
    pub size: U32,
    pub direct: [U32; DIRECT_PTRS],
    pub indirect1: U32,
    pub indirect2: U32,
}

impl Inode {
    /// Constructs a freshly allocated, empty inode.
    pub fn allocated() -> Self {
        Self {
            status: STATUS_ALLOCATED,
            ..Default::default()
        }
    }

    /// Checks whether the record describes a live file.
    pub fn is_allocated(&self) -> bool {
        self.status == STATUS_ALLOCATED
    }

    /// Checks whether the slot is free to claim.
    pub fn is_free(&self) -> bool {
        self.status == STATUS_FREE
    }
}

/// A position in the inode's pointer tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPos {
    /// Direct slot `i` of the inode.
    Direct(usize),
    /// Entry `i` of the single-indirect block.
    Single(usize),
    /// Entry `inner` of the intermediate block named by entry `outer` of the
    /// double-indirect block.
    Double { outer: usize, inner: usize },
}

/// Resolves a logical file-block index into its pointer-tree position.
/// Returns `None` past the double-indirect reach.
pub fn translate(block_index: u64) -> Option<BlockPos> {
    let direct = DIRECT_PTRS as u64;
    let per_table = PTRS_PER_BLOCK as u64;
    if block_index < direct {
        Some(BlockPos::Direct(block_index as usize))
    } else if block_index < direct + per_table {
        Some(BlockPos::Single((block_index - direct) as usize))
    } else if block_index < MAX_FILE_BLOCKS {
        let k = block_index - (direct + per_table);
        Some(BlockPos::Double {
            outer: (k / per_table) as usize,
            inner: (k % per_table) as usize,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_32_bytes() {
        assert_eq!(INODE_SIZE, 32);
        assert_eq!(INODES_PER_BLOCK, 32);
    }

    #[test]
    fn layout_matches_the_on_disk_offsets() {
        let mut inode = Inode::allocated();
        inode.size = U32::new(0x0a0b_0c0d);
        inode.direct[0] = U32::new(7);
        inode.direct[3] = U32::new(10);
        inode.indirect1 = U32::new(8);
        inode.indirect2 = U32::new(9);
        let bytes = inode.as_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..4], &[0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0x0d, 0x0c, 0x0b, 0x0a]);
        assert_eq!(&bytes[8..12], &[7, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[10, 0, 0, 0]);
        assert_eq!(&bytes[24..28], &[8, 0, 0, 0]);
        assert_eq!(&bytes[28..32], &[9, 0, 0, 0]);
    }

    #[test]
    fn translate_covers_the_direct_slots() {
        assert_eq!(translate(0), Some(BlockPos::Direct(0)));
        assert_eq!(translate(3), Some(BlockPos::Direct(3)));
    }

    #[test]
    fn translate_crosses_into_the_single_indirect_table() {
        assert_eq!(translate(4), Some(BlockPos::Single(0)));
        assert_eq!(translate(259), Some(BlockPos::Single(255)));
    }

    #[test]
    fn translate_crosses_into_the_double_indirect_tree() {
        assert_eq!(translate(260), Some(BlockPos::Double { outer: 0, inner: 0 }));
        assert_eq!(
            translate(515),
            Some(BlockPos::Double {
                outer: 0,
                inner: 255
            })
        );
        assert_eq!(
            translate(65_795),
            Some(BlockPos::Double {
                outer: 255,
                inner: 255
            })
        );
    }

    #[test]
    fn translate_stops_at_the_pointer_tree_reach() {
        assert_eq!(translate(65_796), None);
        assert_eq!(translate(u64::MAX), None);
    }
}
