use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use log::{debug, info};

use crate::disk::{
    block_device::BlockDevice,
    types::{DISK_SIZE, IO_SIZE},
};

/// 以宿主机上的镜像文件作为磁盘
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    disk_size: u64, // 镜像大小（字节）
    io_size: usize, // 单次 I/O 大小
}

impl FileDisk {
    /// 打开（必要时创建）默认几何参数的磁盘镜像
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_geometry(path, DISK_SIZE, IO_SIZE)
    }

    /// 打开镜像；文件不足 `disk_size` 时扩展到该大小
    pub fn with_geometry<P: AsRef<Path>>(path: P, disk_size: u64, io_size: usize) -> Result<Self> {
        if io_size == 0 || disk_size % io_size as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("disk size {disk_size} is not a multiple of io size {io_size}"),
            ));
        }

        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len < disk_size {
            info!("growing disk image {} from {len} to {disk_size} bytes", path.display());
            file.set_len(disk_size)?;
        }

        Ok(Self {
            file: Mutex::new(file),
            disk_size,
            io_size,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("disk image lock poisoned"))
    }

    fn check(&self, unit_id: u64, len: usize) -> Result<u64> {
        let offset = unit_id * self.io_size as u64;
        if len != self.io_size || offset + len as u64 > self.disk_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad io request: unit {unit_id}, {len} bytes"),
            ));
        }
        Ok(offset)
    }
}

impl BlockDevice for FileDisk {
    fn io_size(&self) -> usize {
        self.io_size
    }

    fn disk_size(&self) -> u64 {
        self.disk_size
    }

    fn read_block(&self, unit_id: u64, buf: &mut [u8]) -> Result<()> {
        let offset = self.check(unit_id, buf.len())?;
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, unit_id: u64, buf: &[u8]) -> Result<()> {
        let offset = self.check(unit_id, buf.len())?;
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.lock()?;
        file.flush()?;
        file.sync_data()?;
        debug!("disk image flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_image() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("newfs-{}.img", uuid::Uuid::new_v4()))
    }

    #[test]
    fn grows_image_and_round_trips_units() {
        let path = temp_image();
        let disk = FileDisk::with_geometry(&path, 8 * 512, 512).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 * 512);

        let unit = [0xABu8; 512];
        disk.write_block(3, &unit).unwrap();
        let mut back = [0u8; 512];
        disk.read_block(3, &mut back).unwrap();
        assert_eq!(back, unit);

        disk.read_block(2, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rejects_out_of_range_unit() {
        let path = temp_image();
        let disk = FileDisk::with_geometry(&path, 4 * 512, 512).unwrap();
        let mut buf = [0u8; 512];
        assert!(disk.read_block(4, &mut buf).is_err());
        assert!(disk.write_block(0, &buf[..100]).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
