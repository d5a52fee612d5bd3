use std::io::Result;

/// 原始存储设备：按固定的 I/O 单元读写，并报告自身几何信息。
pub trait BlockDevice: Send + Sync {
    /// 单次 I/O 的字节数
    fn io_size(&self) -> usize;

    /// 设备总容量（字节）
    fn disk_size(&self) -> u64;

    /// 读取第 `unit_id` 个 I/O 单元，`buf.len()` 必须等于 `io_size()`
    fn read_block(&self, unit_id: u64, buf: &mut [u8]) -> Result<()>;

    /// 写入第 `unit_id` 个 I/O 单元，`buf.len()` 必须等于 `io_size()`
    fn write_block(&self, unit_id: u64, buf: &[u8]) -> Result<()>;

    /// 把设备缓存刷到底层介质
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
