use std::ops::Range;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    disk::{AlignedDisk, BlockDevice},
    fs::{
        config::{DATA_PER_FILE, DEFAULT_LINK},
        directory::{Dentry, DentryId, DentryRecord, DentryTree, FileType, DENTRY_RECORD_SIZE},
        error::{FileSystemError, Result},
        super_block::SuperBlock,
    },
};

/// 一个数据块槽：盘上块号 + 懒分配的块缓冲
#[derive(Debug, Default, Clone)]
pub struct DataSlot {
    pub block_no: Option<u32>,
    pub data: Option<Box<[u8]>>, // 恰好一个逻辑块大小
}

/// 内存中的 inode，由目录项独占
#[derive(Debug)]
pub struct Inode {
    pub ino: u32,                  // 在 inode 位图与 inode 区中的下标
    pub size: u32,                 // 文件已占用字节数
    pub dir_cnt: u32,              // 目录类型下的目录项个数
    pub dentry: DentryId,          // 指回所属目录项（非所有权）
    pub children: Option<DentryId>, // 子目录项链表头
    pub slots: [DataSlot; DATA_PER_FILE],
}

impl Inode {
    pub fn new(ino: u32, dentry: DentryId) -> Self {
        Self {
            ino,
            size: 0,
            dir_cnt: 0,
            dentry,
            children: None,
            slots: Default::default(),
        }
    }

    /// 6 个数据块是否都已分配
    pub fn has_blocks(&self) -> bool {
        self.slots.iter().all(|slot| slot.block_no.is_some())
    }

    pub fn block_numbers(&self) -> [Option<u32>; DATA_PER_FILE] {
        let mut blocks = [None; DATA_PER_FILE];
        for (dst, slot) in blocks.iter_mut().zip(&self.slots) {
            *dst = slot.block_no;
        }
        blocks
    }
}

/// 目录在 6 个数据块中最多能容纳的目录项数
pub fn dir_capacity(block_size: usize) -> usize {
    DATA_PER_FILE * block_size / DENTRY_RECORD_SIZE
}

/// 文件最大字节数
pub fn file_capacity(block_size: usize) -> usize {
    DATA_PER_FILE * block_size
}

/// 盘上 inode 记录，每条独占一个逻辑块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeRecord {
    pub ino: u32,
    pub size: u32,
    pub link: u32,     // 链接数，固定为 1
    pub ftype: FileType,
    pub block_pointer: [Option<u32>; DATA_PER_FILE],
    pub dir_cnt: u32,
}

impl InodeRecord {
    pub fn from_inode(inode: &Inode, ftype: FileType) -> Self {
        Self {
            ino: inode.ino,
            size: inode.size,
            link: DEFAULT_LINK,
            ftype,
            block_pointer: inode.block_numbers(),
            dir_cnt: inode.dir_cnt,
        }
    }
}

/// 目录项记录 `index` 在数据块中的位置；一条记录可能跨两个块。
/// 返回 (磁盘偏移, 记录内的字节范围) 列表。
fn record_pieces(sb: &SuperBlock, inode: &Inode, index: usize) -> Result<Vec<(u64, Range<usize>)>> {
    let bs = sb.block_size;
    let base = index * DENTRY_RECORD_SIZE;
    let end = base + DENTRY_RECORD_SIZE;
    let mut pos = base;
    let mut pieces = Vec::with_capacity(2);

    while pos < end {
        let slot = pos / bs;
        let within = pos % bs;
        let len = (bs - within).min(end - pos);
        let block_no = inode
            .slots
            .get(slot)
            .and_then(|s| s.block_no)
            .ok_or_else(|| {
                FileSystemError::Corrupted(format!(
                    "directory inode {} has no data block for entry {index}",
                    inode.ino
                ))
            })?;
        let start = pos - base;
        pieces.push((sb.data_block_offset(block_no) + within as u64, start..start + len));
        pos += len;
    }

    Ok(pieces)
}

/// 将内存 inode 及其下方结构全部刷回磁盘。
///
/// 目录：按兄弟链表顺序写出所有目录项，并递归刷写已加载的子 inode。
/// 普通文件：6 个数据块无论是否超过文件大小都整块写出。
/// 中途出错立即返回，已写出的部分不会回滚。
pub fn sync_inode<D: BlockDevice>(
    disk: &AlignedDisk<D>,
    sb: &SuperBlock,
    tree: &DentryTree,
    id: DentryId,
) -> Result<()> {
    let dentry = tree.node(id)?;
    let inode = dentry
        .inode
        .as_ref()
        .ok_or_else(|| FileSystemError::Corrupted(format!("{} is not loaded", dentry.name)))?;

    let record = InodeRecord::from_inode(inode, dentry.ftype);
    disk.write(sb.ino_offset(inode.ino), &bincode::serialize(&record)?)?;

    match dentry.ftype {
        FileType::Directory => {
            for (index, child) in tree.children(id).enumerate() {
                let node = tree.node(child)?;
                let bytes = DentryRecord::from_dentry(node)?.encode()?;
                for (offset, range) in record_pieces(sb, inode, index)? {
                    disk.write(offset, &bytes[range])?;
                }
                if node.inode.is_some() {
                    sync_inode(disk, sb, tree, child)?;
                }
            }
        }
        FileType::Regular => {
            for slot in &inode.slots {
                if let (Some(block_no), Some(data)) = (slot.block_no, slot.data.as_ref()) {
                    disk.write(sb.data_block_offset(block_no), data)?;
                }
            }
        }
    }

    debug!("synced inode {} ({})", inode.ino, dentry.name);
    Ok(())
}

/// 读取 `ino` 号 inode，目录项 `owner` 是它的所属目录项。
///
/// 目录：依次读出 `dir_cnt` 条目录项记录（可跨块），为每条记录建立子目录项，
/// 按读出顺序串成兄弟链表。普通文件：立即把 6 个数据块读入新的缓冲区。
pub fn read_inode<D: BlockDevice>(
    disk: &AlignedDisk<D>,
    sb: &SuperBlock,
    tree: &mut DentryTree,
    owner: DentryId,
    ino: u32,
) -> Result<Inode> {
    let bytes = disk.read(sb.ino_offset(ino), sb.block_size)?;
    let record: InodeRecord = bincode::deserialize(&bytes)?;
    if record.ino != ino {
        return Err(FileSystemError::Corrupted(format!(
            "inode slot {ino} holds record for inode {}",
            record.ino
        )));
    }

    let ftype = tree.node(owner)?.ftype;
    if record.ftype != ftype {
        warn!("inode {ino} is recorded as {} but its entry says {ftype}", record.ftype);
    }

    let mut inode = Inode::new(ino, owner);
    inode.size = record.size;
    for (slot, block_no) in inode.slots.iter_mut().zip(record.block_pointer) {
        slot.block_no = block_no;
    }

    match ftype {
        FileType::Directory => {
            let dir_cnt = record.dir_cnt as usize;
            if dir_cnt > dir_capacity(sb.block_size) {
                return Err(FileSystemError::Corrupted(format!(
                    "directory inode {ino} claims {dir_cnt} entries"
                )));
            }

            let mut children = Vec::with_capacity(dir_cnt);
            for index in 0..dir_cnt {
                let mut raw = vec![0u8; DENTRY_RECORD_SIZE];
                for (offset, range) in record_pieces(sb, &inode, index)? {
                    disk.read_into(offset, &mut raw[range])?;
                }
                let entry = DentryRecord::decode(&raw)?;
                let mut child = Dentry::new(&entry.name(), entry.ftype);
                child.ino = Some(entry.ino);
                child.parent = Some(owner);
                children.push(tree.insert(child));
            }

            for pair in children.windows(2) {
                tree.node_mut(pair[0])?.brother = Some(pair[1]);
            }
            inode.children = children.first().copied();
            inode.dir_cnt = dir_cnt as u32;
        }
        FileType::Regular => {
            for slot in inode.slots.iter_mut() {
                if let Some(block_no) = slot.block_no {
                    let data = disk.read(sb.data_block_offset(block_no), sb.block_size)?;
                    slot.data = Some(data.into_boxed_slice());
                }
            }
        }
    }

    debug!("read inode {ino} ({ftype}, {} bytes)", inode.size);
    Ok(inode)
}
