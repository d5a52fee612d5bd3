use std::{
    io::{self, Result},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use crate::disk::{block_device::BlockDevice, types::IO_SIZE};

/// 内存盘。克隆出的句柄共享同一份存储，方便“卸载后重新挂载”。
#[derive(Debug, Clone)]
pub struct RamDisk {
    data: Arc<Mutex<Vec<u8>>>,
    io_size: usize,
    io_count: Arc<AtomicU64>,       // 已执行的读写次数
    fail_writes: Arc<AtomicBool>,   // 为 true 时所有写操作返回错误
}

impl RamDisk {
    pub fn new(disk_size: u64) -> Self {
        Self::with_io_size(disk_size, IO_SIZE)
    }

    pub fn with_io_size(disk_size: u64, io_size: usize) -> Self {
        Self {
            data: Arc::new(Mutex::new(vec![0u8; disk_size as usize])),
            io_size,
            io_count: Arc::new(AtomicU64::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 自创建以来的 I/O 次数
    pub fn io_count(&self) -> u64 {
        self.io_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 直接拷贝出一段原始字节
    pub fn snapshot(&self, offset: usize, len: usize) -> Vec<u8> {
        match self.data.lock() {
            Ok(data) => data[offset..offset + len].to_vec(),
            Err(poisoned) => poisoned.into_inner()[offset..offset + len].to_vec(),
        }
    }

    fn range(&self, unit_id: u64, len: usize, total: usize) -> Result<std::ops::Range<usize>> {
        let start = unit_id as usize * self.io_size;
        if len != self.io_size || start + len > total {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad io request: unit {unit_id}, {len} bytes"),
            ));
        }
        Ok(start..start + len)
    }
}

impl BlockDevice for RamDisk {
    fn io_size(&self) -> usize {
        self.io_size
    }

    fn disk_size(&self) -> u64 {
        self.data.lock().map(|d| d.len() as u64).unwrap_or(0)
    }

    fn read_block(&self, unit_id: u64, buf: &mut [u8]) -> Result<()> {
        self.io_count.fetch_add(1, Ordering::SeqCst);
        let data = self
            .data
            .lock()
            .map_err(|_| io::Error::other("ram disk poisoned"))?;
        let range = self.range(unit_id, buf.len(), data.len())?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write_block(&self, unit_id: u64, buf: &[u8]) -> Result<()> {
        self.io_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure"));
        }
        let mut data = self
            .data
            .lock()
            .map_err(|_| io::Error::other("ram disk poisoned"))?;
        let range = self.range(unit_id, buf.len(), data.len())?;
        data[range].copy_from_slice(buf);
        Ok(())
    }
}
