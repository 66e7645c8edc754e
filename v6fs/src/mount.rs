//! Superblock codec, the aggregate filesystem handle, and the mount/format
//! lifecycle: `mount`, `umount`, `mkfs`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::inode::Inode;
use crate::layout::*;
use crate::sector::{self, SECTOR_SIZE};

/// The first 24 bytes of the superblock sector are interpreted; the rest is
/// preserved verbatim across read/write but never looked at by the core.
/// See `SPEC_FULL.md` §3.1 for the field layout this resolves.
#[derive(Debug, Clone)]
pub struct Superblock {
    raw: [u8; SECTOR_SIZE],
}

impl Superblock {
    fn get_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]])
    }

    fn set_u16(&mut self, offset: usize, value: u16) {
        self.raw[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn isize_sectors(&self) -> u16 {
        self.get_u16(0)
    }

    pub fn fsize(&self) -> u16 {
        self.get_u16(2)
    }

    pub fn inode_start(&self) -> u16 {
        self.get_u16(8)
    }

    pub fn block_start(&self) -> u16 {
        self.get_u16(10)
    }

    fn new(isize_sectors: u16, fsize: u16, inode_start: u16, block_start: u16) -> Self {
        let mut sb = Self {
            raw: [0u8; SECTOR_SIZE],
        };
        sb.set_u16(0, isize_sectors);
        sb.set_u16(2, fsize);
        sb.set_u16(8, inode_start);
        sb.set_u16(10, block_start);
        sb
    }

    fn decode(raw: [u8; SECTOR_SIZE]) -> Self {
        Self { raw }
    }

    fn encode(&self) -> [u8; SECTOR_SIZE] {
        self.raw
    }

    /// Prints the superblock's interpreted fields (debug facility).
    pub fn print<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "**********FS SUPERBLOCK START**********")?;
        writeln!(w, "s_isize       : {}", self.isize_sectors())?;
        writeln!(w, "s_fsize       : {}", self.fsize())?;
        writeln!(w, "s_inode_start : {}", self.inode_start())?;
        writeln!(w, "s_block_start : {}", self.block_start())?;
        writeln!(w, "**********FS SUPERBLOCK END**********")
    }
}

/// An open UNIX v6 filesystem: the backing image, its superblock, and the
/// two in-memory free-space bitmaps reconstructed at mount time.
///
/// Open file descriptors and directory readers borrow from this handle and
/// must not outlive it.
pub struct Filesystem {
    pub(crate) image: File,
    pub superblock: Superblock,
    pub ibm: Bitmap,
    pub fbm: Bitmap,
}

impl Filesystem {
    /// Walks every inode marked allocated in `ibm` (plus the root, always)
    /// and marks every data sector it references in `fbm`: the indirect
    /// sectors themselves for indirect-addressed files, and every sector
    /// returned by `findsector` while walking the file's content.
    fn fill_fbm(&mut self) -> Result<()> {
        // The root inode is always scanned even though it sits below `ibm`'s
        // own range (`ibm.min()` is `s_inode_start`, which excludes the
        // permanently-allocated root by construction).
        let max = self.ibm.max();
        let mut inr = u64::from(ROOT_INUMBER);
        while inr <= max {
            let allocated = self.ibm.get(inr).unwrap_or(false) || inr == u64::from(ROOT_INUMBER);
            if allocated {
                if let Ok(inode) = Inode::read(self, inr as u32) {
                    if inode.getsize() > SMALL_FILE_CAPACITY {
                        for &indirect in &inode.addr {
                            self.fbm.set(u64::from(indirect));
                        }
                    }
                    let mut offset = 0u32;
                    let mut file_sec_off = 0u32;
                    while offset < inode.getsize() {
                        if let Ok(sector) = inode.findsector(self, file_sec_off) {
                            self.fbm.set(u64::from(sector));
                        }
                        offset += SECTOR_SIZE as u32;
                        file_sec_off += 1;
                    }
                }
            }
            inr += 1;
        }
        Ok(())
    }

    /// Scans the inode table sector by sector and marks every allocated
    /// inode's bit in `ibm`.
    fn fill_ibm(&mut self) -> Result<()> {
        let isize_sectors = self.superblock.isize_sectors() as u32;
        let inode_start = self.superblock.inode_start() as u32;
        let mut inr = 0u32;
        for s in 0..isize_sectors {
            let buf = sector::read(&self.image, inode_start + s)?;
            for i in 0..INODES_PER_SECTOR as usize {
                let offset = i * INODE_SIZE;
                let inode = Inode::decode(&buf[offset..offset + INODE_SIZE]);
                if inode.is_allocated() {
                    self.ibm.set(u64::from(inr));
                }
                inr += 1;
            }
        }
        Ok(())
    }
}

/// Opens `filename` as a UNIX v6 filesystem image and reconstructs its
/// in-memory free-space bitmaps by scanning reachable structure.
pub fn mount<P: AsRef<Path>>(filename: P) -> Result<Filesystem> {
    let image = OpenOptions::new()
        .read(true)
        .write(true)
        .open(filename)?;

    let boot = sector::read(&image, BOOTBLOCK_SECTOR)?;
    if boot[BOOTBLOCK_MAGIC_NUM_OFFSET] != BOOTBLOCK_MAGIC_NUM {
        return Err(Error::BadBootSector);
    }

    let sb = Superblock::decode(sector::read(&image, SUPERBLOCK_SECTOR)?);

    let fbm = Bitmap::alloc(
        u64::from(sb.block_start()) + 1,
        u64::from(sb.fsize()) - 1,
    )
    .map_err(|_| Error::NoMem("free-block bitmap allocation"))?;
    let ibm = Bitmap::alloc(
        u64::from(sb.inode_start()),
        u64::from(sb.isize_sectors()) * u64::from(INODES_PER_SECTOR) - 1,
    )
    .map_err(|_| Error::NoMem("free-inode bitmap allocation"))?;

    let mut fs = Filesystem {
        image,
        superblock: sb,
        ibm,
        fbm,
    };

    log::debug!(
        "mounting image: isize={} fsize={} inode_start={} block_start={}",
        fs.superblock.isize_sectors(),
        fs.superblock.fsize(),
        fs.superblock.inode_start(),
        fs.superblock.block_start()
    );

    fs.fill_ibm()?;
    fs.fill_fbm()?;

    Ok(fs)
}

/// Closes the backing image.
///
/// Fails with [`Error::Io`] if the final flush to disk fails.
pub fn umount(fs: Filesystem) -> Result<()> {
    fs.image.sync_all()?;
    drop(fs);
    Ok(())
}

/// Creates a fresh, empty UNIX v6 image at `filename`.
///
/// Fails with [`Error::NotEnoughBlocks`] if `num_blocks` can't hold both the
/// inode table and at least `num_inodes` worth of data sectors.
pub fn mkfs<P: AsRef<Path>>(filename: P, num_blocks: u32, num_inodes: u32) -> Result<()> {
    let isize_sectors = num_inodes.div_ceil(INODES_PER_SECTOR);
    if num_blocks < isize_sectors + num_inodes {
        return Err(Error::NotEnoughBlocks {
            needed: isize_sectors + num_inodes,
            have: num_blocks,
        });
    }

    let inode_start: u32 = SUPERBLOCK_SECTOR + 1;
    let block_start = inode_start + isize_sectors;

    let image = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(filename)?;

    let zero = [0u8; SECTOR_SIZE];
    for s in 0..num_blocks {
        sector::write(&image, s, &zero)?;
    }

    let mut boot = [0u8; SECTOR_SIZE];
    boot[BOOTBLOCK_MAGIC_NUM_OFFSET] = BOOTBLOCK_MAGIC_NUM;
    sector::write(&image, BOOTBLOCK_SECTOR, &boot)?;

    let sb = Superblock::new(
        isize_sectors as u16,
        num_blocks as u16,
        inode_start as u16,
        block_start as u16,
    );
    sector::write(&image, SUPERBLOCK_SECTOR, &sb.encode())?;

    let root = Inode {
        mode: IALLOC | IFDIR,
        ..Inode::default()
    };
    let mut root_sector = sector::read(&image, inode_start)?;
    root_sector[INODE_SIZE..2 * INODE_SIZE].copy_from_slice(&root.encode());
    sector::write(&image, inode_start, &root_sector)?;

    log::info!(
        "formatted {} sectors ({} inodes, inode table at sector {inode_start}, data at {block_start})",
        num_blocks,
        num_inodes
    );

    Ok(())
}
