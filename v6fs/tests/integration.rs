//! End-to-end scenarios exercising mount, path resolution, file creation,
//! and bitmap reconstruction together.

use std::fs::OpenOptions;

use v6fs::bitmap::Bitmap;
use v6fs::dir::{self, DirReader};
use v6fs::error::Error;
use v6fs::file::FileDescriptor;
use v6fs::inode::Inode;
use v6fs::layout::{IALLOC, IFDIR, IFREG, ROOT_INUMBER};
use v6fs::sector::{self, SECTOR_SIZE};
use v6fs::{mkfs, mount, umount};

fn fresh_image(dir: &tempfile::TempDir, num_blocks: u32, num_inodes: u32) -> std::path::PathBuf {
    let path = dir.path().join("disk.img");
    mkfs(&path, num_blocks, num_inodes).unwrap();
    path
}

#[test]
fn path_resolution_fails_then_succeeds_after_mkdir() {
    let dir = tempfile::tempdir().unwrap();
    let path = fresh_image(&dir, 100, 32);
    let mut fs = mount(&path).unwrap();

    let err = dir::dirlookup(&fs, ROOT_INUMBER, "/a").unwrap_err();
    assert!(matches!(err, Error::InodeOutOfRange { .. }));

    let a_inr = dir::create(&mut fs, "/a", IALLOC | IFDIR).unwrap();
    assert!(a_inr >= 2);

    let found = dir::dirlookup(&fs, ROOT_INUMBER, "/a").unwrap();
    assert_eq!(found, a_inr);
}

#[test]
fn file_creation_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = fresh_image(&dir, 100, 32);
    let mut fs = mount(&path).unwrap();

    dir::create(&mut fs, "/d", IALLOC | IFDIR).unwrap();
    let f_inr = dir::create(&mut fs, "/d/f", IALLOC | IFREG).unwrap();

    let mut writer = FileDescriptor::open(&fs, f_inr).unwrap();
    writer.writebytes(&mut fs, &[0x41, 0x42, 0x43]).unwrap();

    let mut reader = FileDescriptor::open(&fs, f_inr).unwrap();
    let mut buf = [0u8; SECTOR_SIZE];
    let n = reader.readblock(&fs, &mut buf).unwrap();
    assert_eq!(&buf[..n], &[0x41, 0x42, 0x43]);
    assert_eq!(reader.readblock(&fs, &mut buf).unwrap(), 0);
}

#[test]
fn mkfs_mount_umount_mount_bitmap_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = fresh_image(&dir, 100, 32);

    let mut fs1 = mount(&path).unwrap();
    dir::create(&mut fs1, "/a", IALLOC | IFDIR).unwrap();
    dir::create(&mut fs1, "/a/b", IALLOC | IFREG).unwrap();
    let ibm_before = format!("{:?}", fs1.ibm);
    let fbm_before = format!("{:?}", fs1.fbm);
    umount(fs1).unwrap();

    let fs2 = mount(&path).unwrap();
    assert_eq!(format!("{:?}", fs2.ibm), ibm_before);
    assert_eq!(format!("{:?}", fs2.fbm), fbm_before);
}

#[test]
fn bitmap_next_free_scenario() {
    let mut b = Bitmap::alloc(4, 131).unwrap();
    assert_eq!(b.find_next().unwrap(), 4);
    b.set(4);
    b.set(5);
    b.set(6);
    assert_eq!(b.find_next().unwrap(), 7);

    let mut i = 4u64;
    while i <= 131 {
        b.set(i);
        i += 3;
    }
    let mut i = 5u64;
    while i <= 131 {
        b.clear(i);
        i += 5;
    }
    assert_eq!(b.find_next().unwrap(), 5);
}

#[test]
fn mount_a_known_image_leaf_count_matches_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = fresh_image(&dir, 200, 32);
    let mut fs = mount(&path).unwrap();

    dir::create(&mut fs, "/a", IALLOC | IFDIR).unwrap();
    dir::create(&mut fs, "/a/f1", IALLOC | IFREG).unwrap();
    dir::create(&mut fs, "/a/f2", IALLOC | IFREG).unwrap();
    dir::create(&mut fs, "/b", IALLOC | IFREG).unwrap();

    let mut leaves = 0usize;
    let mut stack = vec![ROOT_INUMBER];
    while let Some(inr) = stack.pop() {
        let mut reader = DirReader::opendir(&fs, inr).unwrap();
        while let Some(entry) = reader.readdir(&fs).unwrap() {
            let child = Inode::read(&fs, u32::from(entry.inr)).unwrap();
            if child.is_dir() {
                stack.push(u32::from(entry.inr));
            } else {
                leaves += 1;
            }
        }
    }

    let mut scanned = Vec::new();
    Inode::scan_print(&fs, &mut scanned).unwrap();
    let scanned = String::from_utf8(scanned).unwrap();
    let non_dir_count = scanned.lines().filter(|l| l.contains("(FIL)")).count();

    assert_eq!(leaves, non_dir_count);
}

#[test]
fn indirect_addressing_spans_two_indirect_sectors() {
    let dir = tempfile::tempdir().unwrap();
    let path = fresh_image(&dir, 4000, 32);

    {
        let image = OpenOptions::new().write(true).open(&path).unwrap();
        let mut first_indirect = [0u8; SECTOR_SIZE];
        first_indirect[0..2].copy_from_slice(&500u16.to_le_bytes());
        sector::write(&image, 300, &first_indirect).unwrap();

        let mut second_indirect = [0u8; SECTOR_SIZE];
        second_indirect[0..2].copy_from_slice(&600u16.to_le_bytes());
        sector::write(&image, 301, &second_indirect).unwrap();
    }

    let fs = mount(&path).unwrap();

    let mut inode = Inode {
        mode: IALLOC | IFREG,
        addr: [300, 301, 0, 0, 0, 0, 0, 0],
        ..Inode::default()
    };
    inode.setsize(9 * SECTOR_SIZE as i64).unwrap();

    assert_eq!(inode.findsector(&fs, 0).unwrap(), 500);
    assert_eq!(inode.findsector(&fs, 256).unwrap(), 600);
}
