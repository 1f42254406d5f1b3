use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Address of a block on the volume.
pub type BlockAddr = u32;

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Fixed-sized byte sequence, the unit of device I/O and of allocation.
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable)]
pub struct Block {
    pub data: [u8; BLOCK_SIZE],
}

impl Block {
    /// Constructs a `Block` with given data, zero-padded to `BLOCK_SIZE`.
    ///
    /// # Panics
    /// Panics if:
    /// - `data` is larger than `BLOCK_SIZE`
    pub fn new(data: &[u8]) -> Self {
        let mut block = Self::default();
        block.data[..data.len()].copy_from_slice(data);
        block
    }

    /// Checks whether every byte of the block is zero.
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl Default for Block {
    fn default() -> Self {
        Self {
            data: [0u8; BLOCK_SIZE],
        }
    }
}
