/// 魔数，用于识别已格式化的磁盘
pub const NFS_MAGIC: u32 = 0x4E46_5321;

// 布局中各区域占用的逻辑块数
pub const SUPER_BLOCK_NUM: u64 = 1;
pub const INODE_MAP_BLOCK_NUM: u64 = 1;
pub const DATA_MAP_BLOCK_NUM: u64 = 1;

// 每个 inode 独占一个逻辑块，所以 inode 区块数即最大 inode 数
pub const INODE_BLOCK_NUM: u32 = 585;
pub const DATA_BLOCK_NUM: u32 = 3508;

/// 超级块固定位于磁盘偏移 0
pub const SUPER_OFFSET: u64 = 0;
pub const ROOT_INO: u32 = 0;

/// 每个文件固定 6 个数据块，没有间接块
pub const DATA_PER_FILE: usize = 6;

/// 文件名最大字节数
pub const MAX_NAME_LEN: usize = 128;

/// 硬链接数固定为 1
pub const DEFAULT_LINK: u32 = 1;
