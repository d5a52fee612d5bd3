use crate::{
    disk::{AlignedDisk, BlockDevice},
    fs::error::{FileSystemError, Result},
};

/// 位图公共部分：原始字节 + 可用位数。
/// 字节长度按整块对齐，只有前 `capacity` 位参与分配。
#[derive(Debug, Default, Clone)]
pub struct Bitmap {
    pub bits: Vec<u8>,  // 位图数据，1 = 已占用
    pub capacity: u64,  // 可分配的位数
    pub free: u64,      // 当前空闲位数
    pub offset: u64,    // 位图在磁盘中的字节偏移
}

impl Bitmap {
    /// 全部清零的新位图
    pub fn new(capacity: u64, byte_len: usize, offset: u64) -> Result<Self> {
        if (byte_len as u64) * 8 < capacity {
            return Err(FileSystemError::InvalidArgument(format!(
                "bitmap of {byte_len} bytes cannot track {capacity} slots"
            )));
        }
        Ok(Self {
            bits: vec![0; byte_len],
            capacity,
            free: capacity,
            offset,
        })
    }

    /// 从磁盘加载位图
    pub fn load<D: BlockDevice>(
        disk: &AlignedDisk<D>,
        offset: u64,
        byte_len: usize,
        capacity: u64,
    ) -> Result<Self> {
        let mut bitmap = Self::new(capacity, byte_len, offset)?;
        bitmap.bits = disk.read(offset, byte_len)?;
        let used = (0..capacity).filter(|&i| bitmap.is_used(i)).count() as u64;
        bitmap.free = capacity - used;
        Ok(bitmap)
    }

    /// 将位图写回磁盘
    pub fn sync<D: BlockDevice>(&self, disk: &AlignedDisk<D>) -> Result<()> {
        disk.write(self.offset, &self.bits)
    }

    pub fn is_used(&self, index: u64) -> bool {
        let byte_index = (index / 8) as usize;
        let bit_index = (index % 8) as u8;
        self.bits
            .get(byte_index)
            .map(|byte| byte & (1 << bit_index) != 0)
            .unwrap_or(false)
    }

    /// 从第 0 位开始线性扫描，最多收集 `count` 个空闲位（不修改位图）
    pub fn find_free(&self, count: usize) -> Vec<u64> {
        let mut found = Vec::with_capacity(count);
        if count == 0 {
            return found;
        }
        for (byte_index, byte) in self.bits.iter().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            for bit in 0..8 {
                let index = (byte_index * 8 + bit) as u64;
                if index >= self.capacity {
                    return found;
                }
                if byte & (1 << bit) == 0 {
                    found.push(index);
                    if found.len() == count {
                        return found;
                    }
                }
            }
        }
        found
    }

    /// 占用一位，返回之前是否空闲
    pub fn set(&mut self, index: u64) -> bool {
        if index >= self.capacity || self.is_used(index) {
            return false;
        }
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
        self.free -= 1;
        true
    }

    /// 释放一位，返回之前是否占用
    pub fn clear(&mut self, index: u64) -> bool {
        if index >= self.capacity || !self.is_used(index) {
            return false; // 防止越界和空释放
        }
        self.bits[(index / 8) as usize] &= !(1 << (index % 8));
        self.free += 1;
        true
    }
}
