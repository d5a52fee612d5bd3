use thiserror::Error;

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("Disk I/O error: {0}")]
    Io(#[from] std::io::Error), // 底层 I/O 错误
    #[error("Malformed on-disk record: {0}")]
    Codec(#[from] bincode::Error), // 盘上记录编解码失败
    #[error("Disk space is full")]
    DiskFull, // 数据块位图耗尽
    #[error("No free inode available")]
    InodeFull, // inode 位图耗尽
    #[error("File or directory not found: {0}")]
    NotFound(String),
    #[error("File or directory already exists: {0}")]
    AlreadyExists(String),
    #[error("Expected a directory, found a file: {0}")]
    NotADirectory(String),
    #[error("Expected a file, found a directory: {0}")]
    IsADirectory(String),
    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("File too large: {0}")]
    FileTooLarge(String),
    #[error("File system is not mounted")]
    NotMounted,
    #[error("Device too small: layout needs {required} bytes, device has {actual}")]
    DeviceTooSmall { required: u64, actual: u64 },
    #[error("File system corrupted: {0}")]
    Corrupted(String),
}

const EIO: i32 = 5;
const EACCES: i32 = 13;
const EEXIST: i32 = 17;
const ENOTDIR: i32 = 20;
const EISDIR: i32 = 21;
const EINVAL: i32 = 22;
const EFBIG: i32 = 27;
const ENOSPC: i32 = 28;
const ENOENT: i32 = 2;
const ENOTEMPTY: i32 = 39;

impl FileSystemError {
    /// 分发层向用户报告的负 errno
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::Io(_) | Self::Codec(_) | Self::Corrupted(_) => EIO,
            Self::DiskFull | Self::InodeFull => ENOSPC,
            Self::NotFound(_) => ENOENT,
            Self::AlreadyExists(_) => EEXIST,
            Self::NotADirectory(_) => ENOTDIR,
            Self::IsADirectory(_) => EISDIR,
            Self::DirectoryNotEmpty(_) => ENOTEMPTY,
            Self::InvalidPath(_) | Self::InvalidArgument(_) | Self::NotMounted => EINVAL,
            Self::DeviceTooSmall { .. } => EINVAL,
            Self::AccessDenied(_) => EACCES,
            Self::FileTooLarge(_) => EFBIG,
        };
        -code
    }

    /// 是否属于“空间不足”
    pub fn is_no_space(&self) -> bool {
        matches!(self, Self::DiskFull | Self::InodeFull)
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
