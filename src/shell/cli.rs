use std::path::PathBuf;

use clap::Parser;
use newfs::disk::{DISK_SIZE, IO_SIZE};

/// NewFS 交互式 shell
#[derive(Debug, Parser)]
#[command(name = "newfs", version, about)]
pub struct Cli {
    /// Disk image backing the file system
    #[arg(long, short, default_value = "disk.img")]
    pub device: PathBuf,

    /// Image size in bytes, used when the image is created or too small
    #[arg(long, default_value_t = DISK_SIZE)]
    pub size: u64,

    /// Device I/O unit in bytes; the logical block is twice this
    #[arg(long, default_value_t = IO_SIZE)]
    pub io_size: usize,
}
