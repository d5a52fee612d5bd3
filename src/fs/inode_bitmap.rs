use log::debug;

use crate::{
    disk::{AlignedDisk, BlockDevice},
    fs::{
        bitmap::Bitmap,
        error::{FileSystemError, Result},
    },
};

/// inode 位图，每一位对应 inode 区中的一个槽
#[derive(Debug, Default)]
pub struct InodeBitmap {
    pub map: Bitmap,
}

impl InodeBitmap {
    // 创建一个新的 inode 位图（所有位清零 = 空闲）
    pub fn new(total_inodes: u32, byte_len: usize, offset: u64) -> Result<Self> {
        Ok(Self {
            map: Bitmap::new(total_inodes as u64, byte_len, offset)?,
        })
    }

    pub fn load<D: BlockDevice>(
        disk: &AlignedDisk<D>,
        offset: u64,
        byte_len: usize,
        total_inodes: u32,
    ) -> Result<Self> {
        Ok(Self {
            map: Bitmap::load(disk, offset, byte_len, total_inodes as u64)?,
        })
    }

    pub fn sync<D: BlockDevice>(&self, disk: &AlignedDisk<D>) -> Result<()> {
        self.map.sync(disk)
    }

    /// 分配一个空闲 inode，返回 inode 编号（从 0 开始）
    pub fn alloc(&mut self) -> Result<u32> {
        let ino = *self
            .map
            .find_free(1)
            .first()
            .ok_or(FileSystemError::InodeFull)?;
        self.map.set(ino);
        debug!("allocated inode {ino}");
        Ok(ino as u32)
    }

    // 释放一个 inode
    pub fn free(&mut self, ino: u32) {
        if self.map.clear(ino as u64) {
            debug!("released inode {ino}");
        }
    }

    pub fn is_used(&self, ino: u32) -> bool {
        self.map.is_used(ino as u64)
    }

    pub fn free_count(&self) -> u64 {
        self.map.free
    }

    pub fn total(&self) -> u64 {
        self.map.capacity
    }
}
