//! Common utilities for tests

#![allow(dead_code)]

use newfs::{disk::DISK_SIZE, FileSystem, RamDisk};

/// 全新（未格式化）的默认大小内存盘
pub fn blank_disk() -> RamDisk {
    RamDisk::new(DISK_SIZE)
}

/// 在内存盘上挂载；克隆出的 RamDisk 与文件系统共享存储
pub fn mount(disk: &RamDisk) -> FileSystem<RamDisk> {
    let mut fs = FileSystem::new(disk.clone());
    fs.mount().expect("mount");
    fs
}

pub fn temp_image() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("newfs-test-{}.img", uuid::Uuid::new_v4()))
}
