//! Error taxonomy for the v6 filesystem engine.

use thiserror::Error;

/// Everything a core operation can fail with.
///
/// Every fallible operation in this crate returns `Result<T, Error>`; there is
/// no partial rollback on multi-sector writes and no retry on `Io`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad boot sector: missing magic number")]
    BadBootSector,

    #[error("bad parameter: {0}")]
    BadParameter(&'static str),

    #[error("inode number {inr} out of range (table holds {max} inodes)")]
    InodeOutOfRange { inr: u32, max: u32 },

    #[error("inode {0} is not allocated")]
    UnallocatedInode(u32),

    #[error("inode {0} is not a valid directory")]
    InvalidDirectoryInode(u32),

    #[error("offset {offset} is out of range for a file of size {size}")]
    OffsetOutOfRange { offset: i64, size: u32 },

    #[error("file size {size} exceeds the maximum this driver supports ({max})")]
    FileTooLarge { size: u32, max: u32 },

    #[error("out of memory: {0}")]
    NoMem(&'static str),

    #[error("bitmap is full")]
    BitmapFull,

    #[error("filename {name:?} is longer than {max} bytes")]
    FilenameTooLong { name: String, max: usize },

    #[error("filename {0:?} already exists")]
    FilenameAlreadyExists(String),

    #[error("not enough blocks: need at least {needed}, got {have}")]
    NotEnoughBlocks { needed: u32, have: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
