use log::debug;

use crate::{
    disk::{AlignedDisk, BlockDevice},
    fs::{
        bitmap::Bitmap,
        error::{FileSystemError, Result},
    },
};

/// 数据块位图，每一位对应数据区中的一个逻辑块
#[derive(Debug, Default)]
pub struct DataBlockBitmap {
    pub map: Bitmap,
}

impl DataBlockBitmap {
    pub fn new(total_blocks: u32, byte_len: usize, offset: u64) -> Result<Self> {
        Ok(Self {
            map: Bitmap::new(total_blocks as u64, byte_len, offset)?,
        })
    }

    // 从磁盘加载数据块位图
    pub fn load<D: BlockDevice>(
        disk: &AlignedDisk<D>,
        offset: u64,
        byte_len: usize,
        total_blocks: u32,
    ) -> Result<Self> {
        Ok(Self {
            map: Bitmap::load(disk, offset, byte_len, total_blocks as u64)?,
        })
    }

    // 将数据块位图写回磁盘
    pub fn sync<D: BlockDevice>(&self, disk: &AlignedDisk<D>) -> Result<()> {
        self.map.sync(disk)
    }

    /// 一次分配 `count` 个数据块。
    /// 空闲块不足时返回 `DiskFull`，位图保持不变；成功时所有选中的块都已置位。
    pub fn alloc_blocks(&mut self, count: usize) -> Result<Vec<u32>> {
        let found = self.map.find_free(count);
        if found.len() < count {
            return Err(FileSystemError::DiskFull);
        }
        for &block in &found {
            self.map.set(block);
        }
        debug!("allocated data blocks {found:?}");
        Ok(found.into_iter().map(|b| b as u32).collect())
    }

    // 释放一个数据块
    pub fn free(&mut self, block_no: u32) {
        self.map.clear(block_no as u64);
    }

    pub fn is_used(&self, block_no: u32) -> bool {
        self.map.is_used(block_no as u64)
    }

    pub fn free_count(&self) -> u64 {
        self.map.free
    }

    pub fn total(&self) -> u64 {
        self.map.capacity
    }
}
