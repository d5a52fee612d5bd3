use log::debug;

use crate::{
    disk::block_device::BlockDevice,
    fs::error::{FileSystemError, Result},
};

/// 把任意偏移、任意长度的字节读写转换成设备的整 I/O 单元读写。
///
/// 偏移向下、长度向上按逻辑块对齐，之后在整个对齐区间上逐个 I/O 单元搬运数据。
/// 写操作总是先读出整个对齐区间，拼入调用者的数据后再整体写回，
/// 因此只覆盖半个块的写入不会破坏同一块中的其他字节。
#[derive(Debug)]
pub struct AlignedDisk<D: BlockDevice> {
    device: D,
    block_size: usize, // 逻辑块大小
}

impl<D: BlockDevice> AlignedDisk<D> {
    pub fn new(device: D, block_size: usize) -> Self {
        Self { device, block_size }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn io_size(&self) -> usize {
        self.device.io_size()
    }

    pub fn disk_size(&self) -> u64 {
        self.device.disk_size()
    }

    /// 返回 (对齐后的起始偏移, 偏差, 对齐后的长度)
    fn align(&self, offset: u64, size: usize) -> (u64, usize, usize) {
        let block = self.block_size as u64;
        let offset_aligned = offset / block * block;
        let bias = (offset - offset_aligned) as usize;
        let size_aligned = (size + bias).div_ceil(self.block_size) * self.block_size;
        (offset_aligned, bias, size_aligned)
    }

    fn read_span(&self, offset_aligned: u64, buf: &mut [u8]) -> Result<()> {
        let io_size = self.io_size();
        let first_unit = offset_aligned / io_size as u64;
        for (i, chunk) in buf.chunks_mut(io_size).enumerate() {
            self.device.read_block(first_unit + i as u64, chunk)?;
        }
        Ok(())
    }

    fn write_span(&self, offset_aligned: u64, buf: &[u8]) -> Result<()> {
        let io_size = self.io_size();
        let first_unit = offset_aligned / io_size as u64;
        for (i, chunk) in buf.chunks(io_size).enumerate() {
            self.device.write_block(first_unit + i as u64, chunk)?;
        }
        Ok(())
    }

    /// 从 `offset` 读取 `size` 个字节
    pub fn read(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let (offset_aligned, bias, size_aligned) = self.align(offset, size);
        let mut temp = vec![0u8; size_aligned];
        self.read_span(offset_aligned, &mut temp)?;
        Ok(temp[bias..bias + size].to_vec())
    }

    /// 读取到调用者提供的缓冲区
    pub fn read_into(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let bytes = self.read(offset, out.len())?;
        out.copy_from_slice(&bytes);
        Ok(())
    }

    /// 把 `data` 写到 `offset` 处（读-改-写整个对齐区间）
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let (offset_aligned, bias, size_aligned) = self.align(offset, data.len());
        let mut temp = vec![0u8; size_aligned];
        self.read_span(offset_aligned, &mut temp)?;
        temp[bias..bias + data.len()].copy_from_slice(data);
        self.write_span(offset_aligned, &temp)?;
        debug!(
            "wrote {} bytes at {offset} (aligned span {offset_aligned}+{size_aligned})",
            data.len()
        );
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush().map_err(FileSystemError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::RamDisk;

    fn disk() -> (RamDisk, AlignedDisk<RamDisk>) {
        let ram = RamDisk::with_io_size(8 * 1024, 512);
        (ram.clone(), AlignedDisk::new(ram, 1024))
    }

    #[test]
    fn unaligned_write_keeps_neighbours() {
        let (ram, disk) = disk();
        disk.write(0, &[0x11; 3072]).unwrap();

        disk.write(1000, b"straddle").unwrap();

        let raw = ram.snapshot(0, 3072);
        assert!(raw[..1000].iter().all(|&b| b == 0x11));
        assert_eq!(&raw[1000..1008], b"straddle");
        assert!(raw[1008..].iter().all(|&b| b == 0x11));
    }

    #[test]
    fn unaligned_read_slices_span() {
        let (_ram, disk) = disk();
        let pattern: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        disk.write(0, &pattern).unwrap();

        assert_eq!(disk.read(1500, 700).unwrap(), pattern[1500..2200].to_vec());
        assert_eq!(disk.read(0, 1).unwrap(), vec![pattern[0]]);
        assert_eq!(disk.read(4095, 1).unwrap(), vec![pattern[4095]]);
    }

    #[test]
    fn device_error_surfaces_as_io() {
        let (ram, disk) = disk();
        ram.set_fail_writes(true);
        let err = disk.write(10, b"x").unwrap_err();
        assert!(matches!(err, FileSystemError::Io(_)));

        let err = disk.read(8 * 1024, 1).unwrap_err();
        assert!(matches!(err, FileSystemError::Io(_)));
    }
}
