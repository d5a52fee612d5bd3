use log::debug;

use crate::{
    disk::BlockDevice,
    fs::{
        directory::{DentryId, FileType},
        error::{FileSystemError, Result},
        FileSystem,
    },
};

/// 路径解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub dentry: DentryId, // 命中的目录项，或解析停下的最深目录项
    pub found: bool,
    pub is_root: bool,
}

/// 路径的层级：`/` 为 0，`/a/b` 为 2
pub fn calc_level(path: &str) -> usize {
    components(path).count()
}

pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// 拆成 (父目录路径, 最后一级名字)，根目录没有父目录
pub fn split_parent(path: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = components(path).collect();
    let (name, parents) = parts
        .split_last()
        .ok_or_else(|| FileSystemError::InvalidPath(path.to_string()))?;
    Ok((format!("/{}", parents.join("/")), name.to_string()))
}

impl<D: BlockDevice> FileSystem<D> {
    /// 从根目录逐级解析路径，沿途按需加载 inode。
    ///
    /// 路径中途遇到普通文件时停下，返回该文件的目录项；
    /// 某一级找不到时返回最后检查的目录。返回的目录项保证已加载 inode。
    pub fn lookup(&mut self, path: &str) -> Result<Lookup> {
        self.ensure_mounted()?;
        let root = self.root()?;
        let total_lvl = calc_level(path);

        if total_lvl == 0 {
            self.hydrate(root)?;
            return Ok(Lookup {
                dentry: root,
                found: true,
                is_root: true,
            });
        }

        let mut cursor = root;
        let mut result = Lookup {
            dentry: root,
            found: false,
            is_root: false,
        };

        for (lvl, fname) in components(path).enumerate().map(|(i, f)| (i + 1, f)) {
            self.hydrate(cursor)?;

            if self.tree.node(cursor)?.ftype == FileType::Regular {
                debug!("lookup {path}: level {lvl} is not a directory");
                result.dentry = cursor;
                break;
            }

            match self.tree.find_child(cursor, fname) {
                None => {
                    debug!("lookup {path}: {fname} not found");
                    result.dentry = cursor;
                    break;
                }
                Some(hit) if lvl == total_lvl => {
                    result.dentry = hit;
                    result.found = true;
                }
                Some(hit) => cursor = hit,
            }
        }

        self.hydrate(result.dentry)?;
        Ok(result)
    }

    /// 解析路径，找不到时返回 `NotFound`
    pub fn resolve(&mut self, path: &str) -> Result<DentryId> {
        let lookup = self.lookup(path)?;
        if lookup.found {
            Ok(lookup.dentry)
        } else {
            Err(FileSystemError::NotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_ignore_redundant_slashes() {
        assert_eq!(calc_level("/"), 0);
        assert_eq!(calc_level(""), 0);
        assert_eq!(calc_level("/av/c/d/f"), 4);
        assert_eq!(calc_level("//a///b/"), 2);
    }

    #[test]
    fn splits_parent_and_name() {
        assert_eq!(split_parent("/a/b/c").unwrap(), ("/a/b".to_string(), "c".to_string()));
        assert_eq!(split_parent("/top").unwrap(), ("/".to_string(), "top".to_string()));
        assert!(split_parent("/").is_err());
    }
}
