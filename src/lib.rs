//! NewFS：一个布局固定的小型磁盘文件系统。
//!
//! 磁盘布局：
//! | Super | Inode Map | Data Map | Inodes | Data |
//!
//! 每个 inode 独占一个逻辑块，每个文件固定 6 个数据块。

pub mod disk;
pub mod fs;
pub mod utils;

pub use disk::{AlignedDisk, BlockDevice, FileDisk, RamDisk};
pub use fs::{
    directory::{Dentry, DentryId, DirEntryInfo, FileType},
    error::{FileSystemError, Result},
    inode_table::Inode,
    ops::{FsStat, Stat},
    path::Lookup,
    FileSystem,
};
