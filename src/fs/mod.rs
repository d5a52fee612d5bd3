use log::{debug, info, warn};

use crate::{
    disk::{AlignedDisk, BlockDevice, IO_PER_BLOCK},
    fs::{
        config::{DATA_PER_FILE, NFS_MAGIC, ROOT_INO},
        data_block_bitmap::DataBlockBitmap,
        directory::{Dentry, DentryId, DentryTree, FileType},
        error::{FileSystemError, Result},
        inode_bitmap::InodeBitmap,
        inode_table::{dir_capacity, Inode},
        super_block::{SuperBlock, SuperBlockRecord},
    },
};

pub mod bitmap;
pub mod config;
pub mod data_block_bitmap;
pub mod directory;
pub mod error;
pub mod inode_bitmap;
pub mod inode_table;
pub mod ops;
pub mod path;
pub mod super_block;

/// 一次挂载的全部状态。挂载期间所有操作都通过它进行，没有全局单例。
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    disk: AlignedDisk<D>,             // 对齐读写适配层
    super_block: SuperBlock,          // 布局与容量
    inode_bitmap: InodeBitmap,        // inode 分配信息
    data_bitmap: DataBlockBitmap,     // 数据块分配信息
    tree: DentryTree,                 // 已访问的目录项缓存
    root: Option<DentryId>,           // 根目录项，仅挂载期间存在
}

impl<D: BlockDevice> FileSystem<D> {
    /// 包装设备，不做任何 I/O；逻辑块大小固定为 I/O 单元的 2 倍
    pub fn new(device: D) -> Self {
        let block_size = device.io_size() * IO_PER_BLOCK;
        Self {
            disk: AlignedDisk::new(device, block_size),
            super_block: SuperBlock::default(),
            inode_bitmap: InodeBitmap::default(),
            data_bitmap: DataBlockBitmap::default(),
            tree: DentryTree::new(),
            root: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.super_block.mounted
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    pub fn inode_bitmap(&self) -> &InodeBitmap {
        &self.inode_bitmap
    }

    pub fn data_bitmap(&self) -> &DataBlockBitmap {
        &self.data_bitmap
    }

    pub fn tree(&self) -> &DentryTree {
        &self.tree
    }

    pub fn device(&self) -> &D {
        self.disk.device()
    }

    pub fn into_device(self) -> D {
        self.disk.into_inner()
    }

    pub fn block_size(&self) -> usize {
        self.disk.block_size()
    }

    pub fn root(&self) -> Result<DentryId> {
        self.root.ok_or(FileSystemError::NotMounted)
    }

    pub fn dentry(&self, id: DentryId) -> Option<&Dentry> {
        self.tree.get(id)
    }

    pub fn dentry_mut(&mut self, id: DentryId) -> Option<&mut Dentry> {
        self.tree.get_mut(id)
    }

    /// 在缓存中新建一个尚未挂到任何目录下、也没有 inode 的目录项
    pub fn new_dentry(&mut self, name: &str, ftype: FileType) -> DentryId {
        self.tree.insert(Dentry::new(name, ftype))
    }

    /// 已加载的 inode
    pub fn inode(&self, id: DentryId) -> Option<&Inode> {
        self.tree.get(id).and_then(|d| d.inode.as_ref())
    }

    pub fn inode_mut(&mut self, id: DentryId) -> Option<&mut Inode> {
        self.tree.get_mut(id).and_then(|d| d.inode.as_mut())
    }

    pub(crate) fn ensure_mounted(&self) -> Result<()> {
        if self.super_block.mounted {
            Ok(())
        } else {
            Err(FileSystemError::NotMounted)
        }
    }

    fn loaded_inode_mut(&mut self, id: DentryId) -> Result<&mut Inode> {
        let dentry = self.tree.node_mut(id)?;
        match dentry.inode.as_mut() {
            Some(inode) => Ok(inode),
            None => Err(FileSystemError::Corrupted(format!("{} is not loaded", dentry.name))),
        }
    }

    /// 挂载。
    ///
    /// 读取超级块；魔数不匹配时视为未格式化：按固定容量计算布局，
    /// 写出位图、根 inode 与超级块。之后无论新旧磁盘，
    /// 都从记录的偏移加载位图并读取根 inode。
    pub fn mount(&mut self) -> Result<()> {
        if self.super_block.mounted {
            return Err(FileSystemError::InvalidArgument("already mounted".to_string()));
        }

        let result = self.mount_inner();
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn mount_inner(&mut self) -> Result<()> {
        let io_size = self.disk.io_size();
        let disk_size = self.disk.disk_size();
        let block_size = self.disk.block_size();
        info!("mounting device: {disk_size} bytes, io {io_size}B, block {block_size}B");

        self.tree.clear();
        let root = self.tree.insert(Dentry::new("/", FileType::Directory));

        let record = SuperBlockRecord::read(&self.disk)?;
        let is_init = record.magic != NFS_MAGIC;
        let sb = if is_init {
            info!("no file system found (magic {:#x}), formatting", record.magic);
            SuperBlock::format(io_size, disk_size, block_size)
        } else {
            SuperBlock::from_record(&record, io_size, disk_size)?
        };
        sb.check_fits()?;

        if is_init {
            self.format_layout(&sb, root)?;
        }

        self.inode_bitmap =
            InodeBitmap::load(&self.disk, sb.map_inode_offset, sb.inode_map_len(), sb.max_ino)?;
        self.data_bitmap =
            DataBlockBitmap::load(&self.disk, sb.map_data_offset, sb.data_map_len(), sb.data_num)?;
        self.super_block = sb;
        self.super_block.mounted = true;
        self.root = Some(root);

        // 根 inode 统一从磁盘读取
        {
            let node = self.tree.node_mut(root)?;
            node.ino = Some(ROOT_INO);
            node.inode = None;
        }
        self.hydrate(root)?;

        info!(
            "mounted: {} of {} inodes free, {} of {} blocks free",
            self.inode_bitmap.free_count(),
            self.inode_bitmap.total(),
            self.data_bitmap.free_count(),
            self.data_bitmap.total()
        );
        Ok(())
    }

    /// 在空白设备上落下初始布局：先写两张位图（0 号 inode 已被根目录占用）
    /// 和根 inode，最后才写带魔数的超级块。中途失败时魔数仍无效，下次挂载会重新格式化。
    fn format_layout(&mut self, sb: &SuperBlock, root: DentryId) -> Result<()> {
        let mut inode_bitmap = InodeBitmap::new(sb.max_ino, sb.inode_map_len(), sb.map_inode_offset)?;
        let ino = inode_bitmap.alloc()?;
        if ino != ROOT_INO {
            return Err(FileSystemError::Corrupted(format!("root got inode {ino}")));
        }
        inode_bitmap.sync(&self.disk)?;
        DataBlockBitmap::new(sb.data_num, sb.data_map_len(), sb.map_data_offset)?
            .sync(&self.disk)?;

        {
            let node = self.tree.node_mut(root)?;
            node.ino = Some(ROOT_INO);
            node.inode = Some(Inode::new(ROOT_INO, root));
        }
        inode_table::sync_inode(&self.disk, sb, &self.tree, root)?;

        sb.to_record().write(&self.disk)?;
        self.disk.flush()?;
        debug!("formatted: root inode {ROOT_INO} written before super block");
        Ok(())
    }

    /// 卸载：从根开始递归刷盘，写回超级块与两张位图，然后释放内存状态。
    /// 未挂载时直接成功且不做任何 I/O。每一步都会尝试，返回第一个错误。
    pub fn unmount(&mut self) -> Result<()> {
        if !self.super_block.mounted {
            return Ok(());
        }

        let mut first_err: Option<FileSystemError> = None;
        let mut note = |step: &str, result: Result<()>| {
            if let Err(e) = result {
                warn!("unmount: {step} failed: {e}");
                first_err.get_or_insert(e);
            }
        };

        note(
            "flush tree",
            match self.root {
                Some(root) => self.sync_inode(root),
                None => Ok(()),
            },
        );
        note("write super block", self.super_block.to_record().write(&self.disk));
        note("write inode bitmap", self.inode_bitmap.sync(&self.disk));
        note("write data bitmap", self.data_bitmap.sync(&self.disk));
        note("flush device", self.disk.flush());

        self.reset();
        info!("unmounted");
        first_err.map_or(Ok(()), Err)
    }

    /// 重新格式化：丢弃内存中的全部状态（不刷盘），使魔数失效后重新挂载
    pub fn format(&mut self) -> Result<()> {
        self.reset();
        SuperBlockRecord::default().write(&self.disk)?;
        self.mount()
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.root = None;
        self.inode_bitmap = InodeBitmap::default();
        self.data_bitmap = DataBlockBitmap::default();
        self.super_block = SuperBlock::default();
    }

    /// 为目录项分配一个 inode，目录项独占该 inode
    pub fn alloc_inode(&mut self, id: DentryId) -> Result<u32> {
        self.ensure_mounted()?;
        if self.tree.node(id)?.inode.is_some() {
            return Err(FileSystemError::InvalidArgument(
                "entry already owns an inode".to_string(),
            ));
        }

        let ino = self.inode_bitmap.alloc()?;
        let dentry = self.tree.node_mut(id)?;
        dentry.ino = Some(ino);
        dentry.inode = Some(Inode::new(ino, id));
        Ok(ino)
    }

    /// 为 inode 分配 6 个数据块；普通文件同时获得清零的块缓冲
    pub fn alloc_data(&mut self, id: DentryId) -> Result<[u32; DATA_PER_FILE]> {
        self.ensure_mounted()?;
        let block_size = self.block_size();
        let is_regular = !self.tree.node(id)?.is_dir();
        if self.loaded_inode_mut(id)?.slots.iter().any(|s| s.block_no.is_some()) {
            return Err(FileSystemError::InvalidArgument(
                "inode already has data blocks".to_string(),
            ));
        }

        let blocks = self.data_bitmap.alloc_blocks(DATA_PER_FILE)?;
        let mut assigned = [0u32; DATA_PER_FILE];
        let inode = self.loaded_inode_mut(id)?;
        for ((slot, dst), &block_no) in inode.slots.iter_mut().zip(&mut assigned).zip(&blocks) {
            slot.block_no = Some(block_no);
            if is_regular {
                slot.data = Some(vec![0u8; block_size].into_boxed_slice());
            }
            *dst = block_no;
        }
        self.super_block.usage += (DATA_PER_FILE * block_size) as u64;
        Ok(assigned)
    }

    /// 把 `child` 挂到目录 `dir` 下，返回目录项个数。
    /// 目录的第一个子项会触发目录自身数据块的分配。
    pub fn add_child(&mut self, dir: DentryId, child: DentryId) -> Result<u32> {
        self.ensure_mounted()?;
        self.hydrate(dir)?;

        let (empty, has_blocks, dir_cnt) = {
            let inode = self.tree.dir_inode(dir)?;
            (inode.children.is_none(), inode.has_blocks(), inode.dir_cnt as usize)
        };
        if dir_cnt >= dir_capacity(self.block_size()) {
            return Err(FileSystemError::DiskFull);
        }
        if empty && !has_blocks {
            self.alloc_data(dir)?;
        }
        self.tree.push_child(dir, child)
    }

    /// 目录中第 `index` 个子目录项（兄弟链表顺序）
    pub fn get_child(&self, dir: DentryId, index: usize) -> Option<DentryId> {
        self.tree.get_child(dir, index)
    }

    /// 懒加载：目录项的 inode 尚未读入时从磁盘读取，之后一直缓存
    pub fn hydrate(&mut self, id: DentryId) -> Result<()> {
        let dentry = self.tree.node(id)?;
        if dentry.inode.is_some() {
            return Ok(());
        }
        let ino = dentry.ino.ok_or_else(|| {
            FileSystemError::Corrupted(format!("{} has no inode number", dentry.name))
        })?;

        let inode = inode_table::read_inode(&self.disk, &self.super_block, &mut self.tree, id, ino)?;
        self.tree.node_mut(id)?.inode = Some(inode);
        debug!("hydrated inode {ino}");
        Ok(())
    }

    /// 刷写该目录项的 inode（目录会递归到已加载的子项）
    pub fn sync_inode(&self, id: DentryId) -> Result<()> {
        self.ensure_mounted()?;
        inode_table::sync_inode(&self.disk, &self.super_block, &self.tree, id)
    }

    /// 释放目录项占用的 inode 与数据块位（不改动目录树）
    pub(crate) fn release_node(&mut self, id: DentryId) {
        let block_size = self.block_size() as u64;
        let Some(dentry) = self.tree.get(id) else {
            return;
        };
        let Some(inode) = dentry.inode.as_ref() else {
            return;
        };

        let ino = inode.ino;
        let blocks: Vec<u32> = inode.slots.iter().filter_map(|s| s.block_no).collect();
        for &block_no in &blocks {
            self.data_bitmap.free(block_no);
        }
        self.inode_bitmap.free(ino);
        self.super_block.usage = self
            .super_block
            .usage
            .saturating_sub(blocks.len() as u64 * block_size);
        debug!("released inode {ino} and blocks {blocks:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{RamDisk, DISK_SIZE};

    fn mounted() -> FileSystem<RamDisk> {
        let mut fs = FileSystem::new(RamDisk::new(DISK_SIZE));
        fs.mount().unwrap();
        fs
    }

    #[test]
    fn first_child_reserves_directory_blocks() {
        let mut fs = mounted();
        let root = fs.root().unwrap();
        assert!(!fs.inode(root).unwrap().has_blocks());

        let child = fs.tree.insert(Dentry::new("a", FileType::Directory));
        fs.alloc_inode(child).unwrap();
        assert_eq!(fs.add_child(root, child).unwrap(), 1);
        assert!(fs.inode(root).unwrap().has_blocks());
        assert_eq!(fs.data_bitmap().free_count(), 3508 - 6);

        let second = fs.tree.insert(Dentry::new("b", FileType::Regular));
        fs.alloc_inode(second).unwrap();
        assert_eq!(fs.add_child(root, second).unwrap(), 2);
        assert_eq!(fs.data_bitmap().free_count(), 3508 - 6);
        assert_eq!(fs.get_child(root, 0), Some(second));
        assert_eq!(fs.get_child(root, 1), Some(child));
    }

    #[test]
    fn full_directory_rejects_children() {
        let mut fs = mounted();
        let root = fs.root().unwrap();
        let capacity = dir_capacity(fs.block_size());
        for i in 0..capacity {
            let child = fs.tree.insert(Dentry::new(&format!("f{i}"), FileType::Regular));
            fs.alloc_inode(child).unwrap();
            fs.add_child(root, child).unwrap();
        }
        let extra = fs.tree.insert(Dentry::new("extra", FileType::Regular));
        fs.alloc_inode(extra).unwrap();
        assert!(matches!(fs.add_child(root, extra), Err(FileSystemError::DiskFull)));
        assert_eq!(fs.inode(root).unwrap().dir_cnt as usize, capacity);
    }

    #[test]
    fn data_allocation_is_exclusive() {
        let mut fs = mounted();
        let a = fs.tree.insert(Dentry::new("a", FileType::Regular));
        let b = fs.tree.insert(Dentry::new("b", FileType::Regular));
        fs.alloc_inode(a).unwrap();
        fs.alloc_inode(b).unwrap();
        let first = fs.alloc_data(a).unwrap();
        let second = fs.alloc_data(b).unwrap();
        assert!(first.iter().all(|blk| !second.contains(blk)));
        assert!(matches!(fs.alloc_data(a), Err(FileSystemError::InvalidArgument(_))));
        assert_eq!(fs.super_block().usage, 2 * 6 * 1024);
    }

    #[test]
    fn operations_need_a_mount() {
        let mut fs = FileSystem::new(RamDisk::new(DISK_SIZE));
        let id = fs.tree.insert(Dentry::new("x", FileType::Regular));
        assert!(matches!(fs.alloc_inode(id), Err(FileSystemError::NotMounted)));
        assert!(matches!(fs.root(), Err(FileSystemError::NotMounted)));
    }

    #[test]
    fn unmount_releases_cached_entries() {
        let mut fs = mounted();
        fs.mkdir("/a").unwrap();
        assert!(!fs.tree().is_empty());
        fs.unmount().unwrap();
        assert!(fs.tree().is_empty());
    }

    #[test]
    fn fresh_layout_marks_root_on_disk() {
        let ram = RamDisk::new(DISK_SIZE);
        let mut fs = FileSystem::new(ram.clone());
        fs.mount().unwrap();
        let sb = fs.super_block().clone();
        drop(fs);

        let disk = AlignedDisk::new(ram, sb.block_size);
        let bitmap =
            InodeBitmap::load(&disk, sb.map_inode_offset, sb.inode_map_len(), sb.max_ino).unwrap();
        assert!(bitmap.is_used(ROOT_INO));
        assert_eq!(bitmap.free_count(), sb.max_ino as u64 - 1);
    }
}
