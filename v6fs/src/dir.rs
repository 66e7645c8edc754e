//! Directories are regular files whose content is a packed array of
//! fixed-size entries. This layer iterates those entries, resolves
//! multi-component paths, and creates new entries.

use std::io::Write;

use crate::error::{Error, Result};
use crate::file::FileDescriptor;
use crate::inode::Inode;
use crate::layout::*;
use crate::mount::Filesystem;
use crate::sector::SECTOR_SIZE;

/// One decoded directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inr: u16,
}

/// Iterates the entries of one directory file, one sector-buffer at a time.
pub struct DirReader {
    fd: FileDescriptor,
    buf: [u8; SECTOR_SIZE],
    /// Index of the next entry to yield.
    cur: usize,
    /// Upper bound of entries currently buffered.
    last: usize,
}

impl DirReader {
    /// Opens `inr` as a directory.
    ///
    /// Fails with [`Error::InvalidDirectoryInode`] if the inode isn't
    /// allocated or isn't a directory.
    pub fn opendir(fs: &Filesystem, inr: u32) -> Result<Self> {
        let fd = FileDescriptor::open(fs, inr)?;
        if !fd.inode.is_dir() {
            return Err(Error::InvalidDirectoryInode(inr));
        }
        Ok(Self {
            fd,
            buf: [0u8; SECTOR_SIZE],
            cur: 0,
            last: 0,
        })
    }

    /// Yields the next entry, or `None` at the end of the directory.
    pub fn readdir(&mut self, fs: &Filesystem) -> Result<Option<DirEntry>> {
        if self.cur == self.last {
            let n = self.fd.readblock(fs, &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.last += n / DIRENT_SIZE;
        }

        let slot = self.cur % DIRENTRIES_PER_SECTOR;
        let offset = slot * DIRENT_SIZE;
        let name_bytes = &self.buf[offset..offset + DIRENT_MAXLEN];
        let name_len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DIRENT_MAXLEN);
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();
        let inr = u16::from_le_bytes([
            self.buf[offset + DIRENT_MAXLEN],
            self.buf[offset + DIRENT_MAXLEN + 1],
        ]);

        self.cur += 1;
        Ok(Some(DirEntry { name, inr }))
    }
}

/// Splits a `/`-separated path into its first component and the remainder
/// (without a leading `/`).
fn split_first_component(path: &str) -> (&str, &str) {
    match path.split_once('/') {
        Some((head, tail)) => (head, tail),
        None => (path, ""),
    }
}

/// Resolves `path` (relative to `start_inr`) to an inode number.
///
/// Consumes leading `/`; an empty remaining path resolves to `start_inr`
/// itself. Component comparison is exact-match over the full component
/// (the v6 original matches on a buggy `strncmp`-style prefix instead; this
/// driver treats that as a bug and matches exactly).
///
/// Fails with [`Error::InodeOutOfRange`] if a component has no matching
/// entry, or [`Error::InvalidDirectoryInode`] if an intermediate component
/// resolves to a non-directory.
pub fn dirlookup(fs: &Filesystem, start_inr: u32, path: &str) -> Result<u32> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Ok(start_inr);
    }

    let (component, rest) = split_first_component(path);
    let mut reader = DirReader::opendir(fs, start_inr)?;

    while let Some(entry) = reader.readdir(fs)? {
        if entry.name == component {
            if rest.is_empty() {
                return Ok(u32::from(entry.inr));
            }
            return dirlookup(fs, u32::from(entry.inr), rest);
        }
    }

    Err(Error::InodeOutOfRange {
        inr: start_inr,
        max: 0,
    })
}

/// Creates a new inode at `path` (resolved relative to the root) with the
/// given mode, adding an entry to the parent directory.
///
/// Steps: reject if `path` already resolves; split into parent path and leaf
/// name (`FILENAME_TOO_LONG` if the leaf exceeds 14 bytes); resolve the
/// parent (`BAD_PARAMETER` if absent); allocate and write a fresh inode;
/// append a 16-byte entry to the parent.
pub fn create(fs: &mut Filesystem, path: &str, mode: u16) -> Result<u32> {
    if dirlookup(fs, ROOT_INUMBER, path).is_ok() {
        return Err(Error::FilenameAlreadyExists(path.to_string()));
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (parent_path, leaf) = match trimmed.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", trimmed),
    };

    if leaf.len() > DIRENT_MAXLEN {
        return Err(Error::FilenameTooLong {
            name: leaf.to_string(),
            max: DIRENT_MAXLEN,
        });
    }

    let parent_inr = dirlookup(fs, ROOT_INUMBER, parent_path)
        .map_err(|_| Error::BadParameter("parent path does not resolve"))?;

    let new_inr = Inode::alloc(fs)?;
    let mut new_fd = FileDescriptor::for_new(new_inr);
    new_fd.create(fs, mode)?;

    let mut entry = [0u8; DIRENT_SIZE];
    let name_bytes = leaf.as_bytes();
    entry[..name_bytes.len()].copy_from_slice(name_bytes);
    entry[DIRENT_MAXLEN..].copy_from_slice(&(new_inr as u16).to_le_bytes());

    let mut parent_fd = FileDescriptor::open(fs, parent_inr)?;
    parent_fd.writebytes(fs, &entry)?;

    Ok(new_inr)
}

/// Walks the directory tree from `inr`, printing each entry indented by
/// depth (debug facility).
pub fn print_tree<W: Write>(fs: &Filesystem, inr: u32, w: &mut W, depth: usize) -> Result<()> {
    let mut reader = DirReader::opendir(fs, inr)?;
    while let Some(entry) = reader.readdir(fs)? {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        let _ = writeln!(w, "{}{} ({})", "  ".repeat(depth), entry.name, entry.inr);
        if let Ok(child) = Inode::read(fs, u32::from(entry.inr)) {
            if child.is_dir() {
                print_tree(fs, u32::from(entry.inr), w, depth + 1)?;
            }
        }
    }
    Ok(())
}
