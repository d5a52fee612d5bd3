use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{AlignedDisk, BlockDevice},
    fs::{
        config::{
            DATA_BLOCK_NUM, DATA_MAP_BLOCK_NUM, INODE_BLOCK_NUM, INODE_MAP_BLOCK_NUM, NFS_MAGIC,
            SUPER_BLOCK_NUM, SUPER_OFFSET,
        },
        error::{FileSystemError, Result},
    },
    utils::generate_volume_id,
};

/// 盘上超级块记录，位于偏移 0
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlockRecord {
    pub magic: u32,
    pub block_size: u32,       // 逻辑块大小
    pub usage: u64,            // 已用空间（字节）
    pub max_ino: u32,          // 最大 inode 数
    pub data_num: u32,         // 数据块数
    pub map_inode_blks: u32,   // inode 位图占用的块数
    pub map_inode_offset: u64, // inode 位图的字节偏移
    pub map_data_blks: u32,    // 数据块位图占用的块数
    pub map_data_offset: u64,  // 数据块位图的字节偏移
    pub inode_offset: u64,     // inode 区的字节偏移
    pub data_offset: u64,      // 数据区的字节偏移
    pub volume_id: [u8; 16],   // 卷标识，格式化时生成
}

impl SuperBlockRecord {
    pub fn read<D: BlockDevice>(disk: &AlignedDisk<D>) -> Result<Self> {
        let bytes = disk.read(SUPER_OFFSET, disk.block_size())?;
        Ok(bincode::deserialize(&bytes)?)
    }

    pub fn write<D: BlockDevice>(&self, disk: &AlignedDisk<D>) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        disk.write(SUPER_OFFSET, &bytes)
    }
}

/// 内存中的超级块：布局、容量与挂载状态
#[derive(Debug, Default, Clone)]
pub struct SuperBlock {
    pub magic: u32,
    pub io_size: usize,    // 设备 I/O 大小
    pub disk_size: u64,    // 设备容量
    pub block_size: usize, // 逻辑块大小 = 2 * io_size
    pub usage: u64,
    pub max_ino: u32,
    pub data_num: u32,
    pub map_inode_blks: u32,
    pub map_inode_offset: u64,
    pub map_data_blks: u32,
    pub map_data_offset: u64,
    pub inode_offset: u64,
    pub data_offset: u64,
    pub volume_id: [u8; 16],
    pub mounted: bool,
}

impl SuperBlock {
    /// 为未格式化的设备计算布局：
    /// 超级块 -> inode 位图 -> 数据块位图 -> inode 区 -> 数据区
    pub fn format(io_size: usize, disk_size: u64, block_size: usize) -> Self {
        let bs = block_size as u64;
        let map_inode_offset = SUPER_OFFSET + SUPER_BLOCK_NUM * bs;
        let map_data_offset = map_inode_offset + INODE_MAP_BLOCK_NUM * bs;
        let inode_offset = map_data_offset + DATA_MAP_BLOCK_NUM * bs;
        let data_offset = inode_offset + INODE_BLOCK_NUM as u64 * bs;

        debug!(
            "computed layout: imap@{map_inode_offset} dmap@{map_data_offset} \
             inodes@{inode_offset} data@{data_offset}"
        );

        Self {
            magic: NFS_MAGIC,
            io_size,
            disk_size,
            block_size,
            usage: 0,
            max_ino: INODE_BLOCK_NUM,
            data_num: DATA_BLOCK_NUM,
            map_inode_blks: INODE_MAP_BLOCK_NUM as u32,
            map_inode_offset,
            map_data_blks: DATA_MAP_BLOCK_NUM as u32,
            map_data_offset,
            inode_offset,
            data_offset,
            volume_id: generate_volume_id(),
            mounted: false,
        }
    }

    /// 由盘上记录恢复
    pub fn from_record(record: &SuperBlockRecord, io_size: usize, disk_size: u64) -> Result<Self> {
        if record.block_size as usize != 2 * io_size {
            return Err(FileSystemError::Corrupted(format!(
                "recorded block size {} does not match device io size {io_size}",
                record.block_size
            )));
        }
        Ok(Self {
            magic: record.magic,
            io_size,
            disk_size,
            block_size: record.block_size as usize,
            usage: record.usage,
            max_ino: record.max_ino,
            data_num: record.data_num,
            map_inode_blks: record.map_inode_blks,
            map_inode_offset: record.map_inode_offset,
            map_data_blks: record.map_data_blks,
            map_data_offset: record.map_data_offset,
            inode_offset: record.inode_offset,
            data_offset: record.data_offset,
            volume_id: record.volume_id,
            mounted: false,
        })
    }

    pub fn to_record(&self) -> SuperBlockRecord {
        SuperBlockRecord {
            magic: NFS_MAGIC,
            block_size: self.block_size as u32,
            usage: self.usage,
            max_ino: self.max_ino,
            data_num: self.data_num,
            map_inode_blks: self.map_inode_blks,
            map_inode_offset: self.map_inode_offset,
            map_data_blks: self.map_data_blks,
            map_data_offset: self.map_data_offset,
            inode_offset: self.inode_offset,
            data_offset: self.data_offset,
            volume_id: self.volume_id,
        }
    }

    /// 整个布局的结束偏移
    pub fn layout_end(&self) -> u64 {
        self.data_offset + self.data_num as u64 * self.block_size as u64
    }

    /// 布局必须完整落在设备内
    pub fn check_fits(&self) -> Result<()> {
        let required = self.layout_end();
        if required > self.disk_size {
            return Err(FileSystemError::DeviceTooSmall {
                required,
                actual: self.disk_size,
            });
        }
        Ok(())
    }

    pub fn inode_map_len(&self) -> usize {
        self.map_inode_blks as usize * self.block_size
    }

    pub fn data_map_len(&self) -> usize {
        self.map_data_blks as usize * self.block_size
    }

    /// inode 在 inode 区中的字节偏移
    pub fn ino_offset(&self, ino: u32) -> u64 {
        self.inode_offset + ino as u64 * self.block_size as u64
    }

    /// 数据块在数据区中的字节偏移
    pub fn data_block_offset(&self, block_no: u32) -> u64 {
        self.data_offset + block_no as u64 * self.block_size as u64
    }
}
