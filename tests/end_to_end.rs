mod common;

use common::{blank_disk, mount};
use newfs::{FileSystemError, FileType};

#[test]
fn file_contents_survive_remount() {
    let disk = blank_disk();
    let mut fs = mount(&disk);

    fs.mkdir("/a").unwrap();
    fs.create("/a/f").unwrap();
    let payload = b"the quick brown fox jumps over it all";
    assert_eq!(payload.len(), 37);
    assert_eq!(fs.write("/a/f", 0, payload).unwrap(), 37);
    fs.sync_path("/a").unwrap();
    fs.unmount().unwrap();

    let mut fs = mount(&disk);
    let lookup = fs.lookup("/a/f").unwrap();
    assert!(lookup.found);
    assert_eq!(fs.dentry(lookup.dentry).unwrap().ftype, FileType::Regular);
    assert_eq!(fs.inode(lookup.dentry).unwrap().size, 37);
    assert_eq!(fs.read("/a/f", 0, 64).unwrap(), payload.to_vec());
}

#[test]
fn writes_spanning_blocks_read_back() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.create("/span").unwrap();

    let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
    fs.write("/span", 900, &data).unwrap();
    assert_eq!(fs.stat("/span").unwrap().size, 1200);
    fs.unmount().unwrap();

    let mut fs = mount(&disk);
    assert_eq!(fs.read("/span", 900, 300).unwrap(), data);
    // 写入点之前的空洞读出为 0
    assert!(fs.read("/span", 0, 900).unwrap().iter().all(|&b| b == 0));
    assert!(fs.read("/span", 1200, 10).unwrap().is_empty());
}

#[test]
fn writes_past_six_blocks_are_rejected() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.create("/big").unwrap();

    assert!(fs.write("/big", 0, &vec![7u8; 6 * 1024]).is_ok());
    let err = fs.write("/big", 6000, &[1u8; 200]).unwrap_err();
    assert!(matches!(err, FileSystemError::FileTooLarge(_)));
    assert_eq!(fs.stat("/big").unwrap().size, 6 * 1024);
}

#[test]
fn directory_order_survives_remount() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.mkdir("/d").unwrap();
    for name in ["one", "two", "three"] {
        fs.create(&format!("/d/{name}")).unwrap();
    }
    fs.mkdir("/d/sub").unwrap();

    let before: Vec<String> = fs.readdir("/d").unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(before, ["sub", "three", "two", "one"]);
    fs.unmount().unwrap();

    let mut fs = mount(&disk);
    let after = fs.readdir("/d").unwrap();
    let names: Vec<&str> = after.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, before);
    assert_eq!(after[0].ftype, FileType::Directory);
    assert!(after.iter().all(|e| e.ino.is_some()));
}

#[test]
fn many_entries_straddle_block_boundaries() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.mkdir("/many").unwrap();
    for i in 0..20 {
        fs.mkdir(&format!("/many/entry-{i:02}")).unwrap();
    }
    fs.unmount().unwrap();

    let mut fs = mount(&disk);
    let entries = fs.readdir("/many").unwrap();
    assert_eq!(entries.len(), 20);
    for i in 0..20 {
        assert!(fs.lookup(&format!("/many/entry-{i:02}")).unwrap().found);
    }
}

#[test]
fn unlink_reclaims_inode_and_blocks() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    // 根目录的第一个子项会占用根目录自己的数据块
    fs.mkdir("/keep").unwrap();
    let base = fs.statfs().unwrap();

    fs.create("/gone").unwrap();
    let used = fs.statfs().unwrap();
    assert_eq!(used.free_inodes, base.free_inodes - 1);
    assert_eq!(used.free_blocks, base.free_blocks - 6);

    fs.unlink("/gone").unwrap();
    let after = fs.statfs().unwrap();
    assert_eq!(after.free_inodes, base.free_inodes);
    assert_eq!(after.free_blocks, base.free_blocks);
    assert_eq!(after.usage, base.usage);
    assert!(!fs.lookup("/gone").unwrap().found);
    fs.unmount().unwrap();

    let mut fs = mount(&disk);
    assert!(!fs.lookup("/gone").unwrap().found);
    assert_eq!(fs.statfs().unwrap().free_inodes, base.free_inodes);
    let names: Vec<String> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["keep"]);
}

#[test]
fn rmdir_rules() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.mkdir("/dir").unwrap();
    fs.create("/dir/file").unwrap();

    assert!(matches!(fs.rmdir("/"), Err(FileSystemError::AccessDenied(_))));
    assert!(matches!(fs.rmdir("/dir"), Err(FileSystemError::DirectoryNotEmpty(_))));
    assert!(matches!(fs.rmdir("/dir/file"), Err(FileSystemError::NotADirectory(_))));
    assert!(matches!(fs.unlink("/dir"), Err(FileSystemError::IsADirectory(_))));
    assert!(matches!(fs.read("/dir", 0, 1), Err(FileSystemError::IsADirectory(_))));

    fs.unlink("/dir/file").unwrap();
    fs.rmdir("/dir").unwrap();
    assert!(fs.readdir("/").unwrap().is_empty());
}

#[test]
fn duplicate_and_invalid_names_are_rejected() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.create("/x").unwrap();
    assert!(matches!(fs.create("/x"), Err(FileSystemError::AlreadyExists(_))));
    assert!(matches!(fs.mkdir("/x"), Err(FileSystemError::AlreadyExists(_))));
    assert!(fs.create(&format!("/{}", "n".repeat(200))).is_err());
    assert!(matches!(fs.create("/missing/x"), Err(FileSystemError::NotFound(_))));
    assert!(fs.mkdir("/").is_err());
    assert_eq!(fs.readdir("/").unwrap().len(), 1);
}

#[test]
fn stat_reports_inode_details() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.mkdir("/s").unwrap();
    fs.create("/s/f").unwrap();
    fs.write("/s/f", 0, b"hello").unwrap();

    let file = fs.stat("/s/f").unwrap();
    assert_eq!(file.ftype, FileType::Regular);
    assert_eq!(file.size, 5);
    assert_eq!(file.link, 1);
    assert_eq!(file.blocks.len(), 6);

    let dir = fs.stat("/s").unwrap();
    assert_eq!(dir.ftype, FileType::Directory);
    assert_eq!(dir.dir_cnt, 1);
    assert_eq!(dir.blocks.len(), 6);
    assert!(file.blocks.iter().all(|b| !dir.blocks.contains(b)));
}

#[test]
fn same_handle_can_remount() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.create("/persist").unwrap();
    fs.write("/persist", 0, b"abc").unwrap();
    fs.unmount().unwrap();
    assert!(!fs.is_mounted());

    fs.mount().unwrap();
    assert_eq!(fs.read("/persist", 0, 3).unwrap(), b"abc".to_vec());
}

#[test]
fn format_resets_usage() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    let volume = fs.statfs().unwrap().volume_id;
    fs.mkdir("/tmp").unwrap();
    fs.create("/tmp/a").unwrap();
    fs.format().unwrap();

    let st = fs.statfs().unwrap();
    assert_eq!(st.usage, 0);
    assert_eq!(st.free_inodes, st.total_inodes - 1);
    assert_eq!(st.free_blocks, st.total_blocks);
    assert_ne!(st.volume_id, volume);
    assert!(fs.readdir("/").unwrap().is_empty());
}

#[test]
fn huge_offsets_do_not_overflow() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.create("/f").unwrap();
    fs.write("/f", 0, b"data").unwrap();

    assert_eq!(fs.read("/f", 1, usize::MAX).unwrap(), b"ata".to_vec());
    assert!(fs.read("/f", usize::MAX, usize::MAX).unwrap().is_empty());
    assert!(matches!(
        fs.write("/f", usize::MAX, b"x"),
        Err(FileSystemError::FileTooLarge(_))
    ));
    assert!(matches!(
        fs.write("/f", 1, &[0u8; 6 * 1024]),
        Err(FileSystemError::FileTooLarge(_))
    ));
    assert_eq!(fs.stat("/f").unwrap().size, 4);
    assert_eq!(fs.read("/f", 0, 4).unwrap(), b"data".to_vec());
}

#[test]
fn truncate_shrinks_and_zero_fills() {
    let disk = blank_disk();
    let mut fs = mount(&disk);
    fs.create("/t").unwrap();
    fs.write("/t", 0, &[9u8; 1500]).unwrap();

    fs.truncate("/t", 10).unwrap();
    assert_eq!(fs.stat("/t").unwrap().size, 10);
    assert_eq!(fs.read("/t", 0, 100).unwrap(), vec![9u8; 10]);

    // 再变长时旧内容不会重新出现
    fs.truncate("/t", 1500).unwrap();
    let grown = fs.read("/t", 0, 1500).unwrap();
    assert!(grown[..10].iter().all(|&b| b == 9));
    assert!(grown[10..].iter().all(|&b| b == 0));

    assert!(matches!(
        fs.truncate("/t", 6 * 1024 + 1),
        Err(FileSystemError::FileTooLarge(_))
    ));
    fs.mkdir("/d").unwrap();
    assert!(matches!(fs.truncate("/d", 0), Err(FileSystemError::IsADirectory(_))));
    fs.unmount().unwrap();

    let mut fs = mount(&disk);
    assert_eq!(fs.stat("/t").unwrap().size, 1500);
    assert!(fs.read("/t", 10, 1490).unwrap().iter().all(|&b| b == 0));
}
