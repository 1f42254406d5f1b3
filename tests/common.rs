//! Common utilities for tests
#![allow(unused)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ssfs::block::{Block, BlockAddr, BLOCK_SIZE};
use ssfs::storage::{self, Storage};
use tempfile::TempDir;

/// An in-memory block device. Clones share the same backing store, so a
/// remount can observe the data a previous volume wrote.
#[derive(Clone)]
pub struct MemStorage {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl MemStorage {
    /// Creates a zeroed device of `blocks` blocks.
    pub fn new(blocks: usize) -> Self {
        MemStorage {
            inner: Arc::new(Mutex::new(vec![0u8; blocks * BLOCK_SIZE])),
        }
    }
}

impl Storage for MemStorage {
    fn read_block_at(&mut self, block: &mut Block, addr: BlockAddr) -> storage::Result<()> {
        let data = self.inner.lock().unwrap();
        let start = addr as usize * BLOCK_SIZE;
        let slice = data
            .get(start..start + BLOCK_SIZE)
            .ok_or(storage::Error::OutOfBounds)?;
        block.data.copy_from_slice(slice);
        Ok(())
    }

    fn write_block_at(&mut self, block: &Block, addr: BlockAddr) -> storage::Result<()> {
        let mut data = self.inner.lock().unwrap();
        let start = addr as usize * BLOCK_SIZE;
        let slice = data
            .get_mut(start..start + BLOCK_SIZE)
            .ok_or(storage::Error::OutOfBounds)?;
        slice.copy_from_slice(&block.data);
        Ok(())
    }

    fn sync(&mut self) -> storage::Result<()> {
        Ok(())
    }

    fn block_count(&mut self) -> storage::Result<u64> {
        Ok((self.inner.lock().unwrap().len() / BLOCK_SIZE) as u64)
    }
}

/// Creates a zero-filled image file of `blocks` blocks in a fresh temp dir.
/// Keep the returned directory alive for as long as the image is in use.
pub fn temp_image(blocks: u64) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("disk.img");
    let file = std::fs::File::create(&path).expect("image file");
    file.set_len(blocks * BLOCK_SIZE as u64).expect("image size");
    (dir, path)
}
