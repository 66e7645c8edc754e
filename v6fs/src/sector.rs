//! Fixed-size block access to the backing image.
//!
//! All I/O against the virtual disk goes through here: one 512-byte sector at
//! a time, positioned by seeking to `sector_index * SECTOR_SIZE`. No caching;
//! every call round-trips to the backing file.

use std::fs::File;
use std::os::unix::fs::FileExt;

use crate::error::{Error, Result};

/// Size in bytes of one sector. All I/O is sector-aligned.
pub const SECTOR_SIZE: usize = 512;

/// Reads one sector into a freshly allocated buffer.
///
/// Fails with [`Error::Io`] if fewer than `SECTOR_SIZE` bytes could be read.
pub fn read(image: &File, sector_index: u32) -> Result<[u8; SECTOR_SIZE]> {
    let mut buf = [0u8; SECTOR_SIZE];
    read_into(image, sector_index, &mut buf)?;
    Ok(buf)
}

/// Reads one sector into a caller-provided buffer.
pub fn read_into(image: &File, sector_index: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
    let offset = sector_index as u64 * SECTOR_SIZE as u64;
    image.read_exact_at(buf, offset).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read at sector {sector_index}"),
            ))
        } else {
            Error::Io(e)
        }
    })
}

/// Writes one 512-byte sector to the backing image.
///
/// Fails with [`Error::Io`] if fewer than `SECTOR_SIZE` bytes could be
/// written.
pub fn write(image: &File, sector_index: u32, data: &[u8; SECTOR_SIZE]) -> Result<()> {
    let offset = sector_index as u64 * SECTOR_SIZE as u64;
    image.write_all_at(data, offset)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_image(sectors: u32) -> File {
        let file = tempfile::tempfile().unwrap();
        file.set_len(sectors as u64 * SECTOR_SIZE as u64).unwrap();
        file
    }

    #[test]
    fn write_then_read_round_trips() {
        let file = scratch_image(4);
        let mut data = [0u8; SECTOR_SIZE];
        data[0] = 0xAB;
        data[SECTOR_SIZE - 1] = 0xCD;

        write(&file, 2, &data).unwrap();
        let read_back = read(&file, 2).unwrap();

        assert_eq!(read_back, data);
    }

    #[test]
    fn sectors_are_independent() {
        let file = scratch_image(4);
        let mut a = [0u8; SECTOR_SIZE];
        a[0] = 1;
        let mut b = [0u8; SECTOR_SIZE];
        b[0] = 2;

        write(&file, 0, &a).unwrap();
        write(&file, 1, &b).unwrap();

        assert_eq!(read(&file, 0).unwrap()[0], 1);
        assert_eq!(read(&file, 1).unwrap()[0], 2);
    }

    #[test]
    fn short_image_fails_with_io_error() {
        let file = tempfile::tempfile().unwrap();

        let err = read(&file, 0).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
