use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::block::{Block, BlockAddr, BLOCK_SIZE};

/// The 16-byte tag at the start of block 0 identifying a volume.
pub const MAGIC: [u8; 16] = [
    0xf0, 0x55, 0x4c, 0x49, 0x45, 0x47, 0x45, 0x49, 0x4e, 0x46, 0x4f, 0x30, 0x39, 0x34, 0x30,
    0x0f,
];

/// Superblock's address.
pub const SUPER_ADDR: BlockAddr = 0;

/// Represents metadata about the file system, stored in block 0.
/// The remainder of the block is zero on disk.
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable)]
pub struct Superblock {
    pub magic: [u8; 16],
    pub block_count: U32,
    pub inode_blocks: U32,
    pub block_size: U32,
}

impl Superblock {
    /// Constructs a superblock for a volume of `block_count` blocks with an
    /// inode table of `inode_blocks` blocks.
    pub fn new(block_count: u32, inode_blocks: u32) -> Self {
        Self {
            magic: MAGIC,
            block_count: U32::new(block_count),
            inode_blocks: U32::new(inode_blocks),
            block_size: U32::new(BLOCK_SIZE as u32),
        }
    }

    /// Decodes a superblock from the contents of block 0.
    /// Returns `None` unless the magic tag and the block size match.
    pub fn decode(block: &Block) -> Option<Self> {
        let superblock = Self::read_from_bytes(&block.data[..size_of::<Self>()])
            .expect("a block prefix must be a valid 'Superblock'");
        if superblock.magic != MAGIC {
            return None;
        }
        if superblock.block_size.get() != BLOCK_SIZE as u32 {
            return None;
        }
        Some(superblock)
    }
}

impl From<&Superblock> for Block {
    fn from(value: &Superblock) -> Self {
        Block::new(value.as_bytes())
    }
}
