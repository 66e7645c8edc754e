//! Per-open-file cursor: sequential block reads, seeking, and append-only
//! writes that grow the backing inode.

use crate::error::{Error, Result};
use crate::inode::Inode;
use crate::layout::*;
use crate::mount::Filesystem;
use crate::sector::{self, SECTOR_SIZE};

/// An open file: a cached copy of its inode plus a byte cursor.
///
/// Borrows the filesystem it was opened on; must not outlive it. Writes
/// through [`FileDescriptor::writebytes`] mutate the cached inode in memory
/// and must be paired with a call to [`Inode::write`] to persist — callers
/// that use `writebytes` get this for free.
pub struct FileDescriptor {
    pub inr: u32,
    pub inode: Inode,
    pub offset: u32,
}

impl FileDescriptor {
    /// Opens inode `inr` for reading and writing, with the cursor at 0.
    pub fn open(fs: &Filesystem, inr: u32) -> Result<Self> {
        let inode = Inode::read(fs, inr)?;
        Ok(Self {
            inr,
            inode,
            offset: 0,
        })
    }

    /// Builds a descriptor for an inode number that was just allocated via
    /// [`Inode::alloc`] and has no record on disk yet. Callers must follow up
    /// with [`FileDescriptor::create`] before doing anything else with it.
    pub(crate) fn for_new(inr: u32) -> Self {
        Self {
            inr,
            inode: Inode::default(),
            offset: 0,
        }
    }

    /// Writes a freshly initialized record (`mode`, everything else zero) at
    /// this descriptor's inode number, and mirrors it into the cache.
    pub fn create(&mut self, fs: &Filesystem, mode: u16) -> Result<()> {
        let inode = Inode {
            mode,
            ..Inode::default()
        };
        inode.write(fs, self.inr)?;
        self.inode = inode;
        self.offset = 0;
        Ok(())
    }

    /// Reads up to one sector's worth of file content into `buf`.
    ///
    /// Returns the number of valid leading bytes in `buf` (0 at EOF). Fails
    /// with [`Error::OffsetOutOfRange`] if the cursor is already past the
    /// end of the file.
    pub fn readblock(&mut self, fs: &Filesystem, buf: &mut [u8; SECTOR_SIZE]) -> Result<usize> {
        let size = self.inode.getsize();
        if self.offset > size {
            return Err(Error::OffsetOutOfRange {
                offset: i64::from(self.offset),
                size,
            });
        }
        if self.offset == size {
            return Ok(0);
        }

        let bytes_read = std::cmp::min(size - self.offset, SECTOR_SIZE as u32) as usize;
        let sector_num = self.inode.findsector(fs, self.offset / SECTOR_SIZE as u32)?;
        sector::read_into(&fs.image, sector_num, buf)?;
        self.offset += bytes_read as u32;
        Ok(bytes_read)
    }

    /// Moves the cursor to `new_offset`.
    ///
    /// Fails with [`Error::OffsetOutOfRange`] if `new_offset` is negative or
    /// at-or-past the file's size.
    pub fn lseek(&mut self, new_offset: i64) -> Result<()> {
        let size = self.inode.getsize();
        if new_offset < 0 || new_offset as u64 >= u64::from(size) {
            return Err(Error::OffsetOutOfRange {
                offset: new_offset,
                size,
            });
        }
        self.offset = new_offset as u32;
        Ok(())
    }

    /// Appends `buf` to the file, growing it sector by sector.
    ///
    /// Fails with [`Error::FileTooLarge`] if the file would grow past the
    /// 4000-byte write ceiling. Persists the updated inode record on
    /// completion.
    pub fn writebytes(&mut self, fs: &mut Filesystem, buf: &[u8]) -> Result<usize> {
        let size = self.inode.getsize();
        if size + buf.len() as u32 > WRITE_CEILING {
            return Err(Error::FileTooLarge {
                size: size + buf.len() as u32,
                max: WRITE_CEILING,
            });
        }

        let mut written = 0usize;
        loop {
            let remaining = &buf[written..];
            if remaining.is_empty() {
                break;
            }
            let n = self.writesector(fs, remaining)?;
            if n == 0 {
                break;
            }
            written += n;
        }

        self.inode.write(fs, self.inr)?;
        Ok(written)
    }

    /// Writes at most one sector's worth of `buf`, extending the file by one
    /// sector if its current size lands on a sector boundary, or filling the
    /// tail of the last partially-used sector otherwise.
    fn writesector(&mut self, fs: &mut Filesystem, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let size = self.inode.getsize();
        let slot = (size / SECTOR_SIZE as u32) as usize;

        if size % SECTOR_SIZE as u32 == 0 {
            if slot >= ADDR_SMALL_LENGTH {
                return Err(Error::FileTooLarge {
                    size: size + buf.len() as u32,
                    max: WRITE_CEILING,
                });
            }
            let sector_num = fs
                .fbm
                .find_next()
                .map_err(|_| Error::NoMem("data bitmap exhausted"))?;
            fs.fbm.set(sector_num);

            let n = std::cmp::min(buf.len(), SECTOR_SIZE);
            let mut data = [0u8; SECTOR_SIZE];
            data[..n].copy_from_slice(&buf[..n]);
            sector::write(&fs.image, sector_num as u32, &data)?;

            self.inode.addr[slot] = sector_num as u16;
            self.inode.setsize(i64::from(size) + n as i64)?;
            self.offset += n as u32;
            Ok(n)
        } else {
            let used = (size % SECTOR_SIZE as u32) as usize;
            let capacity = SECTOR_SIZE - used;
            let n = std::cmp::min(buf.len(), capacity);

            let sector_num = u32::from(self.inode.addr[slot]);
            let mut data = sector::read(&fs.image, sector_num)?;
            data[used..used + n].copy_from_slice(&buf[..n]);
            sector::write(&fs.image, sector_num, &data)?;

            self.inode.setsize(i64::from(size) + n as i64)?;
            self.offset += n as u32;
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount;

    fn fresh(dir: &tempfile::TempDir) -> Filesystem {
        let path = dir.path().join("disk.img");
        mount::mkfs(&path, 100, 32).unwrap();
        mount::mount(&path).unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);

        let inr = Inode::alloc(&mut fs).unwrap();
        let mut fd = FileDescriptor::for_new(inr);
        fd.create(&fs, IALLOC | IFREG).unwrap();

        let payload = [0x41u8, 0x42, 0x43];
        fd.writebytes(&mut fs, &payload).unwrap();

        let mut reader = FileDescriptor::open(&fs, inr).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        let n = reader.readblock(&fs, &mut buf).unwrap();
        assert_eq!(&buf[..n], &payload);

        let n2 = reader.readblock(&fs, &mut buf).unwrap();
        assert_eq!(n2, 0);
    }

    #[test]
    fn readblock_handles_size_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);

        let inr = Inode::alloc(&mut fs).unwrap();
        let mut fd = FileDescriptor::for_new(inr);
        fd.create(&fs, IALLOC | IFREG).unwrap();

        let payload = vec![0xAAu8; 513];
        fd.writebytes(&mut fs, &payload).unwrap();

        let mut reader = FileDescriptor::open(&fs, inr).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];

        let n1 = reader.readblock(&fs, &mut buf).unwrap();
        assert_eq!(n1, 512);
        assert_eq!(reader.offset, 512);

        let n2 = reader.readblock(&fs, &mut buf).unwrap();
        assert_eq!(n2, 1);
        assert_eq!(reader.offset, 513);

        let n3 = reader.readblock(&fs, &mut buf).unwrap();
        assert_eq!(n3, 0);
    }

    #[test]
    fn writebytes_rejects_growth_past_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);

        let inr = Inode::alloc(&mut fs).unwrap();
        let mut fd = FileDescriptor::for_new(inr);
        fd.create(&fs, IALLOC | IFREG).unwrap();

        let payload = vec![0u8; 4001];
        let err = fd.writebytes(&mut fs, &payload).unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { .. }));
    }

    #[test]
    fn lseek_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);

        let inr = Inode::alloc(&mut fs).unwrap();
        let mut fd = FileDescriptor::for_new(inr);
        fd.create(&fs, IALLOC | IFREG).unwrap();
        fd.writebytes(&mut fs, &[1, 2, 3, 4]).unwrap();

        assert!(fd.lseek(-1).is_err());
        assert!(fd.lseek(4).is_err());
        assert!(fd.lseek(2).is_ok());
        assert_eq!(fd.offset, 2);
    }
}
