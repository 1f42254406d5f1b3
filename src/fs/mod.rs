use std::path::Path;

use log::{debug, info};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, IntoBytes};

use crate::{
    block::{Block, BlockAddr, BLOCK_SIZE},
    fs::{
        alloc_map::AllocMap,
        inode::{translate, BlockPos, Inode, INODES_PER_BLOCK, INODE_SIZE, PTRS_PER_BLOCK},
        superblock::{Superblock, SUPER_ADDR},
    },
    storage::{self, file::FileStorage, Storage},
};

pub mod alloc_map;
pub mod inode;
pub mod superblock;

/// An indirect block viewed as its 256 little-endian pointer entries.
type PtrTable = [U32; PTRS_PER_BLOCK];

/// An in-memory view of a mounted volume.
///
/// The volume owns the block device; every operation takes `&mut self`, and
/// [Volume::unmount] releases the device again. Formatting is an associated
/// function and leaves nothing mounted.
pub struct Volume<S: Storage> {
    storage: S,
    superblock: Superblock,
    inode_start: BlockAddr,
    data_start: BlockAddr,
    inode_count: u32,
    alloc_map: AllocMap,
}

impl<S: Storage> Volume<S> {
    /// Installs a filesystem on `storage` with room for at least
    /// `inodes_request` inodes (clamped up to 1), then syncs and releases
    /// the device.
    ///
    /// The image must be zero-filled past block 0; a non-blank image is
    /// refused with [Error::NotBlank].
    pub fn format(mut storage: S, inodes_request: i32) -> Result<()> {
        let block_count = storage.block_count()?;
        let block_count = u32::try_from(block_count).map_err(|_| Error::Capacity)?;

        let inodes = inodes_request.max(1) as u32;
        let inode_blocks = inodes.div_ceil(INODES_PER_BLOCK as u32);
        if u64::from(block_count) <= 1 + u64::from(inode_blocks) {
            return Err(Error::Capacity);
        }

        let mut block = Block::default();
        for addr in 1..block_count {
            storage.read_block_at(&mut block, addr)?;
            if !block.is_zeroed() {
                return Err(Error::NotBlank);
            }
        }

        let superblock = Superblock::new(block_count, inode_blocks);
        storage.write_block_at(&Block::from(&superblock), SUPER_ADDR)?;
        let zero = Block::default();
        for addr in 1..block_count {
            storage.write_block_at(&zero, addr)?;
        }
        storage.sync()?;

        info!("formatted volume: {block_count} blocks, {inode_blocks} inode blocks");
        Ok(())
    }

    /// Mounts the filesystem from `storage`, rebuilding the free-block map
    /// from the inode table. On failure the device is released.
    pub fn mount(mut storage: S) -> Result<Self> {
        let mut block = Block::default();
        storage.read_block_at(&mut block, SUPER_ADDR)?;
        let superblock = Superblock::decode(&block).ok_or(Error::BadVolume)?;

        let block_count = superblock.block_count.get();
        let inode_blocks = superblock.inode_blocks.get();
        if u64::from(block_count) <= 1 + u64::from(inode_blocks)
            || u64::from(block_count) > storage.block_count()?
        {
            return Err(Error::BadVolume);
        }

        let mut volume = Self {
            storage,
            superblock,
            inode_start: 1,
            data_start: 1 + inode_blocks,
            inode_count: inode_blocks.saturating_mul(INODES_PER_BLOCK as u32),
            alloc_map: AllocMap::new(block_count as usize),
        };
        volume.rebuild_alloc_map()?;

        info!("mounted volume: {block_count} blocks, {} inodes", volume.inode_count);
        Ok(volume)
    }

    /// Syncs and releases the volume, closing the underlying device.
    pub fn unmount(mut self) -> Result<()> {
        self.storage.sync()?;
        info!("unmounted volume");
        Ok(())
    }

    /// Claims the first free inode slot. Returns its number.
    pub fn create(&mut self) -> Result<u32> {
        let mut block = Block::default();
        for table_block in 0..self.superblock.inode_blocks.get() {
            let addr = self.inode_start + table_block;
            self.storage.read_block_at(&mut block, addr)?;
            for slot in 0..INODES_PER_BLOCK {
                let offset = slot * INODE_SIZE;
                let inode = Inode::read_from_bytes(&block.data[offset..offset + INODE_SIZE])
                    .expect("a 32-byte slice must be a valid 'Inode'");
                if inode.is_free() {
                    block.data[offset..offset + INODE_SIZE]
                        .copy_from_slice(Inode::allocated().as_bytes());
                    self.storage.write_block_at(&block, addr)?;
                    let n = table_block * INODES_PER_BLOCK as u32 + slot as u32;
                    debug!("created inode {n}");
                    return Ok(n);
                }
            }
        }
        Err(Error::Exhausted)
    }

    /// Returns the size in bytes of the file identified by `n`.
    pub fn stat(&mut self, n: u32) -> Result<u32> {
        let inode = self.read_inode(n)?;
        if !inode.is_allocated() {
            return Err(Error::BadInode);
        }
        Ok(inode.size.get())
    }

    /// Deletes the file identified by `n`: zeroes every block of its pointer
    /// tree on disk, returns them to the free set and clears the record.
    pub fn delete(&mut self, n: u32) -> Result<()> {
        let inode = self.read_inode(n)?;
        if !inode.is_allocated() {
            return Err(Error::BadInode);
        }

        for ptr in inode.direct {
            self.free_block(ptr)?;
        }
        if inode.indirect1.get() != 0 {
            self.free_table(inode.indirect1)?;
        }
        if inode.indirect2.get() != 0 {
            let outer = self.read_ptr_table(inode.indirect2.get())?;
            for intermediate in outer {
                if intermediate.get() != 0 {
                    self.free_table(intermediate)?;
                }
            }
            self.free_block(inode.indirect2)?;
        }

        self.write_inode(n, &Inode::default())?;
        debug!("deleted inode {n}");
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from file `n` starting at byte
    /// `offset`. Returns the number of bytes read; holes read as zeros and
    /// nothing past the file size is returned.
    pub fn read(&mut self, n: u32, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let inode = self.read_inode(n)?;
        if !inode.is_allocated() {
            return Err(Error::BadInode);
        }

        let size = u64::from(inode.size.get());
        if offset >= size {
            return Ok(0);
        }
        let to_read = buf.len().min((size - offset) as usize);

        let mut done = 0;
        let mut block = Block::default();
        while done < to_read {
            let pos = offset + done as u64;
            let within = (pos % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - within).min(to_read - done);
            match self.locate(&inode, pos / BLOCK_SIZE as u64)? {
                Some(addr) => {
                    self.storage.read_block_at(&mut block, addr)?;
                    buf[done..done + chunk].copy_from_slice(&block.data[within..within + chunk]);
                }
                None => buf[done..done + chunk].fill(0),
            }
            done += chunk;
        }
        Ok(done)
    }

    /// Writes `buf` into file `n` at byte `offset`, allocating data blocks
    /// and missing pointer levels on demand. A gap left beyond the previous
    /// size reads as zeros. Returns the number of bytes written from `buf`.
    pub fn write(&mut self, n: u32, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut inode = self.read_inode(n)?;
        if !inode.is_allocated() {
            return Err(Error::BadInode);
        }

        let mut done = 0;
        let mut failure = None;
        let mut block = Block::default();
        while done < buf.len() {
            let pos = offset + done as u64;
            let within = (pos % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - within).min(buf.len() - done);
            let (addr, fresh) = match self.locate_or_alloc(&mut inode, pos / BLOCK_SIZE as u64) {
                Ok(located) => located,
                Err(e) => {
                    // Out of reach or out of blocks mid-write: the portion
                    // already written stays on disk, so the record below
                    // must cover it and keep naming any pointer blocks
                    // installed for it.
                    failure = Some(e);
                    break;
                }
            };

            // A freshly allocated block is zeroed on disk, so only an
            // existing block needs the read half of read-modify-write.
            if fresh {
                block.data.fill(0);
            } else {
                self.storage.read_block_at(&mut block, addr)?;
            }
            block.data[within..within + chunk].copy_from_slice(&buf[done..done + chunk]);
            self.storage.write_block_at(&block, addr)?;
            done += chunk;
        }

        let end = offset + done as u64;
        if done > 0 && end > u64::from(inode.size.get()) {
            inode.size = U32::new(end as u32);
        }
        self.write_inode(n, &inode)?;
        match failure {
            Some(e) => Err(e),
            None => Ok(done),
        }
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn alloc_map(&self) -> &AllocMap {
        &self.alloc_map
    }

    /// Reads the inode record `n` from the inode table.
    pub fn read_inode(&mut self, n: u32) -> Result<Inode> {
        if n >= self.inode_count {
            return Err(Error::BadInode);
        }
        let (addr, offset) = self.inode_location(n);
        let mut block = Block::default();
        self.storage.read_block_at(&mut block, addr)?;
        let inode = Inode::read_from_bytes(&block.data[offset..offset + INODE_SIZE])
            .expect("a 32-byte slice must be a valid 'Inode'");
        Ok(inode)
    }

    /// Writes the inode record `n` back into its table block.
    fn write_inode(&mut self, n: u32, inode: &Inode) -> Result<()> {
        let (addr, offset) = self.inode_location(n);
        let mut block = Block::default();
        self.storage.read_block_at(&mut block, addr)?;
        block.data[offset..offset + INODE_SIZE].copy_from_slice(inode.as_bytes());
        self.storage.write_block_at(&block, addr)?;
        Ok(())
    }

    /// Returns the table block holding inode `n` and its byte offset there.
    fn inode_location(&self, n: u32) -> (BlockAddr, usize) {
        let addr = self.inode_start + n / INODES_PER_BLOCK as u32;
        let offset = (n as usize % INODES_PER_BLOCK) * INODE_SIZE;
        (addr, offset)
    }

    /// Resolves logical block `block_index` of `inode` to a device address
    /// without allocating. `None` is a hole.
    fn locate(&mut self, inode: &Inode, block_index: u64) -> Result<Option<BlockAddr>> {
        let addr = match translate(block_index).ok_or(Error::Capacity)? {
            BlockPos::Direct(i) => inode.direct[i].get(),
            BlockPos::Single(i) => {
                let table = inode.indirect1.get();
                if table == 0 {
                    return Ok(None);
                }
                self.read_ptr_table(table)?[i].get()
            }
            BlockPos::Double { outer, inner } => {
                let root = inode.indirect2.get();
                if root == 0 {
                    return Ok(None);
                }
                let intermediate = self.read_ptr_table(root)?[outer].get();
                if intermediate == 0 {
                    return Ok(None);
                }
                self.read_ptr_table(intermediate)?[inner].get()
            }
        };
        Ok((addr != 0).then_some(addr))
    }

    /// Resolves logical block `block_index` for writing, allocating the data
    /// block and any missing pointer level. A changed parent block is
    /// persisted before the data block is touched; changed inode fields are
    /// persisted by the caller. Returns the address and whether the data
    /// block is freshly allocated.
    fn locate_or_alloc(&mut self, inode: &mut Inode, block_index: u64) -> Result<(BlockAddr, bool)> {
        match translate(block_index).ok_or(Error::Capacity)? {
            BlockPos::Direct(i) => {
                let addr = inode.direct[i].get();
                if addr != 0 {
                    return Ok((addr, false));
                }
                let addr = self.alloc_block()?;
                inode.direct[i] = U32::new(addr);
                Ok((addr, true))
            }
            BlockPos::Single(i) => {
                let table = self.ensure_table(&mut inode.indirect1)?;
                self.table_entry_or_alloc(table, i)
            }
            BlockPos::Double { outer, inner } => {
                let root = self.ensure_table(&mut inode.indirect2)?;
                let mut table = self.read_ptr_table(root)?;
                let intermediate = match table[outer].get() {
                    0 => {
                        let addr = self.alloc_block()?;
                        table[outer] = U32::new(addr);
                        self.write_ptr_table(root, &table)?;
                        addr
                    }
                    addr => addr,
                };
                self.table_entry_or_alloc(intermediate, inner)
            }
        }
    }

    /// Returns the pointer-table address held in `slot`, allocating a table
    /// block into it when the slot is empty. A freshly allocated block is
    /// already zeroed on disk, so the new table starts with no entries.
    fn ensure_table(&mut self, slot: &mut U32) -> Result<BlockAddr> {
        match slot.get() {
            0 => {
                let addr = self.alloc_block()?;
                *slot = U32::new(addr);
                Ok(addr)
            }
            addr => Ok(addr),
        }
    }

    /// Reads entry `i` of the pointer table at `table_addr`, allocating a
    /// data block into it when the entry is empty.
    fn table_entry_or_alloc(
        &mut self,
        table_addr: BlockAddr,
        i: usize,
    ) -> Result<(BlockAddr, bool)> {
        let mut table = self.read_ptr_table(table_addr)?;
        match table[i].get() {
            0 => {
                let addr = self.alloc_block()?;
                table[i] = U32::new(addr);
                self.write_ptr_table(table_addr, &table)?;
                Ok((addr, true))
            }
            addr => Ok((addr, false)),
        }
    }

    /// Claims the first free data block whose on-disk content is also all
    /// zeros. The content check guards the in-memory map against stale
    /// state; on a consistent volume the two always agree.
    fn alloc_block(&mut self) -> Result<BlockAddr> {
        let mut block = Block::default();
        for addr in self.data_start..self.superblock.block_count.get() {
            if self.alloc_map.is_used(addr as usize) {
                continue;
            }
            self.storage.read_block_at(&mut block, addr)?;
            if !block.is_zeroed() {
                continue;
            }
            self.alloc_map.mark_used(addr as usize);
            return Ok(addr);
        }
        Err(Error::Capacity)
    }

    /// Zeroes the block named by `ptr` on disk and returns it to the free
    /// set. A pointer of 0 is skipped.
    fn free_block(&mut self, ptr: U32) -> Result<()> {
        let addr = ptr.get();
        if addr == 0 {
            return Ok(());
        }
        self.storage.write_block_at(&Block::default(), addr)?;
        self.alloc_map.release(addr as usize);
        Ok(())
    }

    /// Frees every target of the pointer table at `ptr`, then the table
    /// block itself.
    fn free_table(&mut self, ptr: U32) -> Result<()> {
        let table = self.read_ptr_table(ptr.get())?;
        for entry in table {
            self.free_block(entry)?;
        }
        self.free_block(ptr)
    }

    fn read_ptr_table(&mut self, addr: BlockAddr) -> Result<PtrTable> {
        let mut block = Block::default();
        self.storage.read_block_at(&mut block, addr)?;
        Ok(PtrTable::read_from_bytes(&block.data)
            .expect("a block must be a valid pointer table"))
    }

    fn write_ptr_table(&mut self, addr: BlockAddr, table: &PtrTable) -> Result<()> {
        self.storage.write_block_at(&Block::new(table.as_bytes()), addr)?;
        Ok(())
    }

    /// Walks every allocated inode's pointer tree and marks each referenced
    /// block used, including the indirect blocks themselves.
    fn rebuild_alloc_map(&mut self) -> Result<()> {
        for n in 0..self.inode_count {
            let inode = self.read_inode(n)?;
            if !inode.is_allocated() {
                continue;
            }
            for ptr in inode.direct {
                self.mark_ptr(ptr)?;
            }
            if inode.indirect1.get() != 0 {
                self.mark_ptr(inode.indirect1)?;
                for ptr in self.read_ptr_table(inode.indirect1.get())? {
                    self.mark_ptr(ptr)?;
                }
            }
            if inode.indirect2.get() != 0 {
                self.mark_ptr(inode.indirect2)?;
                let outer = self.read_ptr_table(inode.indirect2.get())?;
                for intermediate in outer {
                    if intermediate.get() == 0 {
                        continue;
                    }
                    self.mark_ptr(intermediate)?;
                    for ptr in self.read_ptr_table(intermediate.get())? {
                        self.mark_ptr(ptr)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Records a pointer-tree reference in the allocation map, enforcing
    /// that it names a data-region block.
    fn mark_ptr(&mut self, ptr: U32) -> Result<()> {
        let addr = ptr.get();
        if addr == 0 {
            return Ok(());
        }
        if addr < self.data_start || addr >= self.superblock.block_count.get() {
            return Err(Error::BadVolume);
        }
        self.alloc_map.mark_used(addr as usize);
        Ok(())
    }
}

/// The single mounted-volume context: at most one volume is open at a time
/// and every file operation requires it.
#[derive(Default)]
pub struct Ssfs {
    volume: Option<Volume<FileStorage>>,
}

impl Ssfs {
    pub fn new() -> Self {
        Self { volume: None }
    }

    /// Formats the image at `path` with room for at least `inodes_request`
    /// inodes. Refuses while a volume is mounted.
    pub fn format<P: AsRef<Path>>(&mut self, path: P, inodes_request: i32) -> Result<()> {
        if self.volume.is_some() {
            return Err(Error::AlreadyMounted);
        }
        let storage = FileStorage::open(path).map_err(Error::DeviceOpen)?;
        Volume::format(storage, inodes_request)
    }

    /// Mounts the image at `path`.
    pub fn mount<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.volume.is_some() {
            return Err(Error::AlreadyMounted);
        }
        let storage = FileStorage::open(path).map_err(Error::DeviceOpen)?;
        self.volume = Some(Volume::mount(storage)?);
        Ok(())
    }

    /// Unmounts the mounted volume, syncing it to the image file.
    pub fn unmount(&mut self) -> Result<()> {
        self.volume.take().ok_or(Error::NotMounted)?.unmount()
    }

    pub fn create(&mut self) -> Result<u32> {
        self.mounted()?.create()
    }

    pub fn delete(&mut self, n: u32) -> Result<()> {
        self.mounted()?.delete(n)
    }

    pub fn stat(&mut self, n: u32) -> Result<u32> {
        self.mounted()?.stat(n)
    }

    pub fn read(&mut self, n: u32, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.mounted()?.read(n, offset, buf)
    }

    pub fn write(&mut self, n: u32, offset: u64, buf: &[u8]) -> Result<usize> {
        self.mounted()?.write(n, offset, buf)
    }

    fn mounted(&mut self) -> Result<&mut Volume<FileStorage>> {
        self.volume.as_mut().ok_or(Error::NotMounted)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Failure modes of the volume operations.
#[derive(Debug)]
pub enum Error {
    /// `format` or `mount` was called while a volume is mounted.
    AlreadyMounted,
    /// A file operation was called with no volume mounted.
    NotMounted,
    /// The image file could not be opened.
    DeviceOpen(storage::Error),
    /// Block 0 does not hold a consistent superblock for this filesystem.
    BadVolume,
    /// The image is too small, the write reaches past the pointer tree, or
    /// no free data block is left.
    Capacity,
    /// `format` refuses an image that is not zero-filled.
    NotBlank,
    /// The inode number is out of range or names a free inode.
    BadInode,
    /// No free inode slot is left.
    Exhausted,
    /// The device failed during an operation.
    Storage(storage::Error),
}

impl From<storage::Error> for Error {
    fn from(value: storage::Error) -> Self {
        Self::Storage(value)
    }
}
