use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::{Error, Result, Storage};
use crate::block::{Block, BlockAddr, BLOCK_SIZE};

/// A block device backed by a regular file (a disk image).
pub struct FileStorage {
    file: File,
    blocks: u64,
}

impl FileStorage {
    /// Opens an existing image file as a block device.
    /// A trailing partial block, if any, is not addressable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let blocks = file.metadata()?.len() / BLOCK_SIZE as u64;
        Ok(Self { file, blocks })
    }

    /// Creates a zero-filled image file of `blocks` blocks, replacing any
    /// existing file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, blocks: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(blocks * BLOCK_SIZE as u64)?;
        Ok(Self { file, blocks })
    }

    fn seek_to(&mut self, addr: BlockAddr) -> Result<()> {
        if u64::from(addr) >= self.blocks {
            return Err(Error::OutOfBounds);
        }
        self.file
            .seek(SeekFrom::Start(u64::from(addr) * BLOCK_SIZE as u64))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read_block_at(&mut self, block: &mut Block, addr: BlockAddr) -> Result<()> {
        self.seek_to(addr)?;
        self.file.read_exact(&mut block.data)?;
        Ok(())
    }

    fn write_block_at(&mut self, block: &Block, addr: BlockAddr) -> Result<()> {
        self.seek_to(addr)?;
        self.file.write_all(&block.data)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn block_count(&mut self) -> Result<u64> {
        Ok(self.blocks)
    }
}
