pub mod aligned;
pub mod block_device;
pub mod file_disk;
pub mod ram_disk;
pub mod types;

pub use aligned::AlignedDisk;
pub use block_device::BlockDevice;
pub use file_disk::FileDisk;
pub use ram_disk::RamDisk;
pub use types::{DISK_SIZE, IO_PER_BLOCK, IO_SIZE};
