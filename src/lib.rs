//! A minimal single-volume, inode-based filesystem stored inside a regular
//! file that acts as a virtual block device.
//!
//! Linear layout of a volume (1024-byte blocks):
//! - block 0: superblock (magic tag, block count, inode-table size)
//! - blocks 1..: inode table, 32-byte records, 32 per block
//! - remaining blocks: data region
//!
//! The namespace is flat: files are identified by inode number alone, with
//! no directories, permissions, timestamps or links. Each inode maps file
//! offsets to data blocks through four direct pointers, one single-indirect
//! block of 256 pointers and one double-indirect block of 256 pointers to
//! intermediate blocks. Unwritten gaps are sparse and read as zeros.

pub mod block;
pub mod fs;
pub mod storage;
