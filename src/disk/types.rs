/// 设备单次 I/O 的大小：512B
/// 底层设备只接受以该大小为单位的读写。
pub const IO_SIZE: usize = 512;

/// 逻辑块大小是 I/O 单元的 2 倍
pub const IO_PER_BLOCK: usize = 2;

/// 虚拟磁盘默认总大小（单位：字节）：4MB
/// 刚好容纳 1 + 1 + 1 + 585 + 3508 个 1KB 逻辑块。
pub const DISK_SIZE: u64 = 4 * 1024 * 1024;
