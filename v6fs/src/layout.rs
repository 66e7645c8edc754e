//! On-disk geometry constants shared by every layer.
//!
//! Mirrors the block of `pub const` declarations the teacher keeps at the top
//! of its own filesystem module, just scaled to the v6 layout instead of xv6's.

use crate::sector::SECTOR_SIZE;

/// Root directory inode number.
pub const ROOT_INUMBER: u32 = 1;

/// On-disk size of one inode record, in bytes.
pub const INODE_SIZE: usize = 32;

/// Inodes packed per sector of the inode table.
pub const INODES_PER_SECTOR: u32 = (SECTOR_SIZE / INODE_SIZE) as u32;

/// Direct address slots in `i_addr`.
pub const ADDR_SMALL_LENGTH: usize = 8;

/// Sector pointers packed into one indirect sector.
pub const ADDRESSES_PER_SECTOR: usize = SECTOR_SIZE / 2;

/// Largest file size servable through direct addressing alone.
pub const SMALL_FILE_CAPACITY: u32 = (ADDR_SMALL_LENGTH * SECTOR_SIZE) as u32;

/// Largest file size this driver supports at all (single-indirect only):
/// 7 indirect `i_addr` slots, not 8 — the 8th slot would need a second level
/// of indirection this driver doesn't implement.
pub const MAX_FILE_CAPACITY: u32 = (7 * ADDRESSES_PER_SECTOR * SECTOR_SIZE) as u32;

/// Ceiling enforced by `writebytes`: writes that would grow a file past this
/// many bytes are rejected, even though direct addressing could serve up to
/// `SMALL_FILE_CAPACITY` (4096) bytes. See `DESIGN.md` for why the tighter,
/// historically-inherited limit is kept rather than widened to 4096.
pub const WRITE_CEILING: u32 = 4000;

/// Directory entry name field length (not necessarily NUL-terminated on
/// disk).
pub const DIRENT_MAXLEN: usize = 14;

/// On-disk size of one directory entry: name + inode number.
pub const DIRENT_SIZE: usize = DIRENT_MAXLEN + 2;

/// Directory entries packed per sector.
pub const DIRENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIRENT_SIZE;

/// Sector holding the boot block.
pub const BOOTBLOCK_SECTOR: u32 = 0;

/// Sector holding the superblock.
pub const SUPERBLOCK_SECTOR: u32 = 1;

/// Byte offset of the boot block's magic marker.
pub const BOOTBLOCK_MAGIC_NUM_OFFSET: usize = 0;

/// Expected value of the boot block's magic marker.
pub const BOOTBLOCK_MAGIC_NUM: u8 = 0x5A;

/// Inode mode bit: the inode is in use.
pub const IALLOC: u16 = 0x8000;

/// Inode mode mask isolating the file-type bits.
pub const IFMT: u16 = 0x6000;

/// Inode mode value (after masking with `IFMT`) for a directory.
pub const IFDIR: u16 = 0x4000;

/// Inode mode value (after masking with `IFMT`) for a regular file.
pub const IFREG: u16 = 0x2000;
