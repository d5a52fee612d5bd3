use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fs::{
    config::MAX_NAME_LEN,
    error::{FileSystemError, Result},
    inode_table::Inode,
};

/// 盘上目录项记录的固定长度：ino(4) + 文件名(128) + 类型(4)
pub const DENTRY_RECORD_SIZE: usize = 4 + MAX_NAME_LEN + 4;

// 文件类型，盘上按 0 = 普通文件、1 = 目录编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Regular,
    Directory,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// 目录项在 arena 中的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DentryId(usize);

/// 内存中的目录项。目录项独占它的 inode；inode 只记录回指的句柄。
#[derive(Debug)]
pub struct Dentry {
    pub name: String,
    pub ino: Option<u32>,           // 尚未分配 inode 时为 None
    pub ftype: FileType,
    pub parent: Option<DentryId>,
    pub brother: Option<DentryId>,  // 同一父目录下的下一个兄弟
    pub inode: Option<Inode>,       // 懒加载，首次访问时填充
}

impl Dentry {
    pub fn new(name: &str, ftype: FileType) -> Self {
        Self {
            name: name.to_string(),
            ino: None,
            ftype,
            parent: None,
            brother: None,
            inode: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }
}

/// 文件名必须非空、不超过 128 字节，且不含 `/` 与 NUL
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains(['/', '\0']) {
        return Err(FileSystemError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// 已访问过的目录项缓存。父子、兄弟关系都是 arena 下标，不会形成所有权环。
/// 被删除的槽位不复用，旧句柄只会失效而不会指向别的目录项。
#[derive(Debug, Default)]
pub struct DentryTree {
    slots: Vec<Option<Dentry>>,
}

impl DentryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn insert(&mut self, dentry: Dentry) -> DentryId {
        self.slots.push(Some(dentry));
        DentryId(self.slots.len() - 1)
    }

    pub fn remove(&mut self, id: DentryId) -> Option<Dentry> {
        self.slots.get_mut(id.0).and_then(Option::take)
    }

    pub fn get(&self, id: DentryId) -> Option<&Dentry> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: DentryId) -> Option<&mut Dentry> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// 缓存中存活的目录项数量
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: DentryId) -> Result<&Dentry> {
        self.get(id)
            .ok_or_else(|| FileSystemError::Corrupted(format!("dangling dentry handle {id:?}")))
    }

    pub fn node_mut(&mut self, id: DentryId) -> Result<&mut Dentry> {
        self.get_mut(id)
            .ok_or_else(|| FileSystemError::Corrupted(format!("dangling dentry handle {id:?}")))
    }

    /// 已加载的目录 inode
    pub fn dir_inode(&self, dir: DentryId) -> Result<&Inode> {
        let dentry = self.node(dir)?;
        if !dentry.is_dir() {
            return Err(FileSystemError::NotADirectory(dentry.name.clone()));
        }
        dentry
            .inode
            .as_ref()
            .ok_or_else(|| FileSystemError::Corrupted(format!("{} is not loaded", dentry.name)))
    }

    fn dir_inode_mut(&mut self, dir: DentryId) -> Result<&mut Inode> {
        let dentry = self.node_mut(dir)?;
        if !dentry.is_dir() {
            return Err(FileSystemError::NotADirectory(dentry.name.clone()));
        }
        match dentry.inode.as_mut() {
            Some(inode) => Ok(inode),
            None => Err(FileSystemError::Corrupted(format!("{} is not loaded", dentry.name))),
        }
    }

    /// 按兄弟链表顺序遍历子目录项
    pub fn children(&self, dir: DentryId) -> Children<'_> {
        let head = self
            .get(dir)
            .and_then(|d| d.inode.as_ref())
            .and_then(|inode| inode.children);
        Children {
            tree: self,
            cursor: head,
        }
    }

    /// 头插法挂入子目录项，返回新的目录项个数
    pub fn push_child(&mut self, dir: DentryId, child: DentryId) -> Result<u32> {
        let head = self.dir_inode(dir)?.children;
        {
            let node = self.node_mut(child)?;
            node.parent = Some(dir);
            node.brother = head;
        }
        let inode = self.dir_inode_mut(dir)?;
        inode.children = Some(child);
        inode.dir_cnt += 1;
        Ok(inode.dir_cnt)
    }

    /// 从兄弟链表中摘下子目录项（不释放 arena 槽位）
    pub fn detach_child(&mut self, dir: DentryId, child: DentryId) -> Result<u32> {
        let next = self.node(child)?.brother;
        let prev = self
            .children(dir)
            .take_while(|&id| id != child)
            .last();
        let is_head = self.dir_inode(dir)?.children == Some(child);

        if is_head {
            self.dir_inode_mut(dir)?.children = next;
        } else {
            let prev = prev.ok_or_else(|| {
                FileSystemError::NotFound(format!("{child:?} is not a child of {dir:?}"))
            })?;
            if self.node(prev)?.brother != Some(child) {
                return Err(FileSystemError::NotFound(format!(
                    "{child:?} is not a child of {dir:?}"
                )));
            }
            self.node_mut(prev)?.brother = next;
        }

        let node = self.node_mut(child)?;
        node.parent = None;
        node.brother = None;

        let inode = self.dir_inode_mut(dir)?;
        inode.dir_cnt = inode.dir_cnt.saturating_sub(1);
        Ok(inode.dir_cnt)
    }

    /// 第 `index` 个子目录项（从 0 开始），越界返回 None
    pub fn get_child(&self, dir: DentryId, index: usize) -> Option<DentryId> {
        self.children(dir).nth(index)
    }

    /// 名字完全相等才算命中
    pub fn find_child(&self, dir: DentryId, name: &str) -> Option<DentryId> {
        self.children(dir)
            .find(|&id| self.get(id).is_some_and(|d| d.name == name))
    }
}

pub struct Children<'a> {
    tree: &'a DentryTree,
    cursor: Option<DentryId>,
}

impl Iterator for Children<'_> {
    type Item = DentryId;

    fn next(&mut self) -> Option<DentryId> {
        let current = self.cursor?;
        self.cursor = self.tree.get(current).and_then(|d| d.brother);
        Some(current)
    }
}

/// 盘上目录项记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DentryRecord {
    pub ino: u32,
    #[serde(with = "fixed_name")]
    pub fname: [u8; MAX_NAME_LEN],
    pub ftype: FileType,
}

impl DentryRecord {
    pub fn from_dentry(dentry: &Dentry) -> Result<Self> {
        let ino = dentry.ino.ok_or_else(|| {
            FileSystemError::InvalidArgument(format!("{} has no inode", dentry.name))
        })?;
        let mut fname = [0u8; MAX_NAME_LEN];
        let bytes = dentry.name.as_bytes();
        if bytes.len() > MAX_NAME_LEN {
            return Err(FileSystemError::InvalidPath(dentry.name.clone()));
        }
        fname[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            ino,
            fname,
            ftype: dentry.ftype,
        })
    }

    pub fn name(&self) -> String {
        let end = self
            .fname
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        String::from_utf8_lossy(&self.fname[..end]).into_owned()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// 128 字节的名字按定长元组编码，记录长度因此固定
mod fixed_name {
    use std::fmt;

    use serde::{
        de::{self, SeqAccess, Visitor},
        ser::SerializeTuple,
        Deserializer, Serializer,
    };

    use crate::fs::config::MAX_NAME_LEN;

    pub fn serialize<S: Serializer>(
        name: &[u8; MAX_NAME_LEN],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(MAX_NAME_LEN)?;
        for byte in name {
            tuple.serialize_element(byte)?;
        }
        tuple.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; MAX_NAME_LEN], D::Error> {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = [u8; MAX_NAME_LEN];

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{MAX_NAME_LEN} name bytes")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut name = [0u8; MAX_NAME_LEN];
                for (i, slot) in name.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(name)
            }
        }

        deserializer.deserialize_tuple(MAX_NAME_LEN, NameVisitor)
    }
}

/// 目录列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub ino: Option<u32>,
    pub ftype: FileType,
}
