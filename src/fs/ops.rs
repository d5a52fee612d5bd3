//! 建立在核心原语之上的文件操作：创建、读写、列目录、删除。

use log::{debug, info, warn};

use crate::{
    disk::BlockDevice,
    fs::{
        config::DEFAULT_LINK,
        directory::{validate_name, Dentry, DentryId, DirEntryInfo, FileType},
        error::{FileSystemError, Result},
        inode_table::file_capacity,
        path::split_parent,
        FileSystem,
    },
};

/// 文件或目录的元信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub ino: u32,
    pub ftype: FileType,
    pub size: u32,
    pub dir_cnt: u32,
    pub link: u32,
    pub blocks: Vec<u32>,
}

/// 整个文件系统的用量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: usize,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub usage: u64,
    pub volume_id: [u8; 16],
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn mkdir(&mut self, path: &str) -> Result<DentryId> {
        self.create_node(path, FileType::Directory)
    }

    /// 创建普通文件，同时分配它的 6 个数据块
    pub fn create(&mut self, path: &str) -> Result<DentryId> {
        self.create_node(path, FileType::Regular)
    }

    fn create_node(&mut self, path: &str, ftype: FileType) -> Result<DentryId> {
        self.ensure_mounted()?;
        let (parent_path, name) = split_parent(path)?;
        validate_name(&name)?;

        let parent = self.resolve(&parent_path)?;
        if !self.tree.node(parent)?.is_dir() {
            return Err(FileSystemError::NotADirectory(parent_path));
        }
        if self.tree.find_child(parent, &name).is_some() {
            return Err(FileSystemError::AlreadyExists(path.to_string()));
        }

        let child = self.tree.insert(Dentry::new(&name, ftype));
        if let Err(e) = self.attach_new(parent, child, ftype) {
            if e.is_no_space() {
                warn!("create {path}: out of space");
            }
            // 回滚已占用的位
            self.release_node(child);
            self.tree.remove(child);
            return Err(e);
        }

        info!("created {ftype} {path}");
        Ok(child)
    }

    fn attach_new(&mut self, parent: DentryId, child: DentryId, ftype: FileType) -> Result<()> {
        self.alloc_inode(child)?;
        if ftype == FileType::Regular {
            self.alloc_data(child)?;
        }
        self.add_child(parent, child)?;
        Ok(())
    }

    fn resolve_file(&mut self, path: &str) -> Result<DentryId> {
        let id = self.resolve(path)?;
        if self.tree.node(id)?.is_dir() {
            return Err(FileSystemError::IsADirectory(path.to_string()));
        }
        Ok(id)
    }

    fn resolve_dir(&mut self, path: &str) -> Result<DentryId> {
        let id = self.resolve(path)?;
        if !self.tree.node(id)?.is_dir() {
            return Err(FileSystemError::NotADirectory(path.to_string()));
        }
        Ok(id)
    }

    /// 从 `offset` 开始写入，文件大小增长到写入的最远位置
    pub fn write(&mut self, path: &str, offset: usize, data: &[u8]) -> Result<usize> {
        self.ensure_mounted()?;
        let id = self.resolve_file(path)?;
        let block_size = self.block_size();
        let capacity = file_capacity(block_size);
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= capacity)
            .ok_or_else(|| {
                FileSystemError::FileTooLarge(format!(
                    "{path}: {} bytes at offset {offset} exceeds {capacity}",
                    data.len()
                ))
            })?;

        if !self.loaded_inode_mut(id)?.has_blocks() {
            self.alloc_data(id)?;
        }

        let inode = self.loaded_inode_mut(id)?;
        let mut written = 0;
        while written < data.len() {
            let pos = offset + written;
            let within = pos % block_size;
            let n = (block_size - within).min(data.len() - written);
            let buf = inode.slots[pos / block_size]
                .data
                .get_or_insert_with(|| vec![0u8; block_size].into_boxed_slice());
            buf[within..within + n].copy_from_slice(&data[written..written + n]);
            written += n;
        }
        inode.size = inode.size.max(end as u32);

        debug!("wrote {written} bytes to {path} at {offset}");
        Ok(written)
    }

    /// 把文件大小设为 `size`。缩短时把新末尾之后的旧内容清零，
    /// 因此之后再变长时，多出来的部分读出为 0
    pub fn truncate(&mut self, path: &str, size: usize) -> Result<()> {
        self.ensure_mounted()?;
        let id = self.resolve_file(path)?;
        let block_size = self.block_size();
        let capacity = file_capacity(block_size);
        if size > capacity {
            return Err(FileSystemError::FileTooLarge(format!(
                "{path}: {size} bytes exceeds {capacity}"
            )));
        }

        let inode = self.loaded_inode_mut(id)?;
        let old = inode.size as usize;
        let mut pos = size;
        while pos < old {
            let within = pos % block_size;
            let n = (block_size - within).min(old - pos);
            if let Some(buf) = inode.slots[pos / block_size].data.as_mut() {
                buf[within..within + n].fill(0);
            }
            pos += n;
        }
        inode.size = size as u32;

        debug!("truncated {path} from {old} to {size} bytes");
        Ok(())
    }

    /// 读取最多 `len` 个字节，不会越过文件大小
    pub fn read(&mut self, path: &str, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.ensure_mounted()?;
        let id = self.resolve_file(path)?;
        let block_size = self.block_size();
        let inode = self.loaded_inode_mut(id)?;

        let end = offset.saturating_add(len).min(inode.size as usize);
        if offset >= end {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(end - offset);
        let mut pos = offset;
        while pos < end {
            let within = pos % block_size;
            let n = (block_size - within).min(end - pos);
            match inode.slots[pos / block_size].data.as_ref() {
                Some(buf) => out.extend_from_slice(&buf[within..within + n]),
                None => out.resize(out.len() + n, 0),
            }
            pos += n;
        }
        Ok(out)
    }

    /// 列出目录中的所有目录项（兄弟链表顺序）
    pub fn readdir(&mut self, path: &str) -> Result<Vec<DirEntryInfo>> {
        self.ensure_mounted()?;
        let dir = self.resolve_dir(path)?;
        let dir_cnt = self.tree.dir_inode(dir)?.dir_cnt as usize;

        let mut entries = Vec::with_capacity(dir_cnt);
        for index in 0..dir_cnt {
            let Some(child) = self.get_child(dir, index) else {
                break;
            };
            let dentry = self.tree.node(child)?;
            entries.push(DirEntryInfo {
                name: dentry.name.clone(),
                ino: dentry.ino,
                ftype: dentry.ftype,
            });
        }
        Ok(entries)
    }

    pub fn stat(&mut self, path: &str) -> Result<Stat> {
        self.ensure_mounted()?;
        let id = self.resolve(path)?;
        let dentry = self.tree.node(id)?;
        let inode = dentry
            .inode
            .as_ref()
            .ok_or_else(|| FileSystemError::Corrupted(format!("{path} is not loaded")))?;

        Ok(Stat {
            ino: inode.ino,
            ftype: dentry.ftype,
            size: inode.size,
            dir_cnt: inode.dir_cnt,
            link: DEFAULT_LINK,
            blocks: inode.slots.iter().filter_map(|s| s.block_no).collect(),
        })
    }

    /// 删除普通文件
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.ensure_mounted()?;
        let id = self.resolve_file(path)?;
        self.remove_node(path, id)
    }

    /// 删除空目录
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.ensure_mounted()?;
        let id = self.resolve_dir(path)?;
        if id == self.root()? {
            return Err(FileSystemError::AccessDenied("cannot remove /".to_string()));
        }
        if self.tree.dir_inode(id)?.dir_cnt > 0 {
            return Err(FileSystemError::DirectoryNotEmpty(path.to_string()));
        }
        self.remove_node(path, id)
    }

    /// 从父目录摘下目录项并回收它的 inode 与数据块
    fn remove_node(&mut self, path: &str, id: DentryId) -> Result<()> {
        let parent = self
            .tree
            .node(id)?
            .parent
            .ok_or_else(|| FileSystemError::Corrupted(format!("{path} has no parent")))?;
        self.tree.detach_child(parent, id)?;
        self.release_node(id);
        self.tree.remove(id);
        info!("removed {path}");
        Ok(())
    }

    /// 刷写路径对应的 inode
    pub fn sync_path(&mut self, path: &str) -> Result<()> {
        let id = self.resolve(path)?;
        self.sync_inode(id)
    }

    pub fn statfs(&self) -> Result<FsStat> {
        self.ensure_mounted()?;
        Ok(FsStat {
            block_size: self.block_size(),
            total_inodes: self.inode_bitmap.total(),
            free_inodes: self.inode_bitmap.free_count(),
            total_blocks: self.data_bitmap.total(),
            free_blocks: self.data_bitmap.free_count(),
            usage: self.super_block.usage,
            volume_id: self.super_block.volume_id,
        })
    }
}
