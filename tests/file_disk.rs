mod common;

use common::temp_image;
use newfs::{BlockDevice, FileDisk, FileSystem};

#[test]
fn image_file_persists_between_opens() {
    let path = temp_image();

    {
        let disk = FileDisk::open(&path).unwrap();
        let mut fs = FileSystem::new(disk);
        fs.mount().unwrap();
        fs.mkdir("/etc").unwrap();
        fs.create("/etc/motd").unwrap();
        fs.write("/etc/motd", 0, b"welcome aboard").unwrap();
        fs.unmount().unwrap();
    }

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 * 1024 * 1024);

    {
        let disk = FileDisk::open(&path).unwrap();
        assert_eq!(disk.io_size(), 512);
        let mut fs = FileSystem::new(disk);
        fs.mount().unwrap();
        assert_eq!(fs.read("/etc/motd", 0, 100).unwrap(), b"welcome aboard".to_vec());
        let names: Vec<String> = fs.readdir("/etc").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["motd"]);
        fs.unmount().unwrap();
    }

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn mismatched_geometry_is_rejected() {
    let path = temp_image();
    assert!(FileDisk::with_geometry(&path, 1000, 512).is_err());
    let _ = std::fs::remove_file(&path);
}
