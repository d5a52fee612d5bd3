use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use newfs::{
    fs::inode_table::file_capacity,
    utils::{format_volume_id, resolve_path},
    BlockDevice, FileSystem, FileSystemError, FileType,
};
use std::error::Error;

#[derive(Debug)]
pub enum Command {
    Help,
    Ls(Option<String>),
    Pwd,
    Mkdir(String),
    Rmdir(String),
    Create(String),
    Rm(String),
    Cd(String),
    Read(String),
    Write(String, String),
    Stat(String),
    Df,
    Sync,
    Format,
    Exit,
}

pub fn execute_command<D: BlockDevice>(
    cmd: &Command,
    fs: &mut FileSystem<D>,
    current_dir: &mut String,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls(path) => {
            let target = resolve_path(current_dir, path.as_deref().unwrap_or("."));
            let mut entries = fs.readdir(&target)?;
            entries.sort_by(|a, b| match (a.ftype, b.ftype) {
                (FileType::Directory, FileType::Regular) => std::cmp::Ordering::Less,
                (FileType::Regular, FileType::Directory) => std::cmp::Ordering::Greater,
                _ => a.name.cmp(&b.name),
            });
            if entries.is_empty() {
                println!("{}", "(empty)".bright_black());
            }
            for entry in entries {
                match entry.ftype {
                    FileType::Directory => println!("📁  {}", entry.name.blue().bold()),
                    FileType::Regular => println!("📄  {}", entry.name),
                }
            }
        }
        Command::Pwd => println!("📍 {}", current_dir.cyan()),
        Command::Mkdir(name) => {
            let path = resolve_path(current_dir, name);
            fs.mkdir(&path)?;
            println!("✅ Created directory: {}", path.green());
        }
        Command::Rmdir(name) => {
            let path = resolve_path(current_dir, name);
            fs.rmdir(&path)?;
            println!("🗑️ Removed directory: {}", path.red());
        }
        Command::Create(name) => {
            let path = resolve_path(current_dir, name);
            fs.create(&path)?;
            println!("📝 Created file: {}", path.green());
        }
        Command::Rm(name) => {
            let path = resolve_path(current_dir, name);
            fs.unlink(&path)?;
            println!("❌ Deleted file: {}", path.red());
        }
        Command::Cd(path) => {
            let target = resolve_path(current_dir, path);
            let stat = fs.stat(&target)?;
            if stat.ftype != FileType::Directory {
                return Err(format!("not a directory: {target}").into());
            }
            *current_dir = target;
            println!("📂 Moved to {}", current_dir.blue());
        }
        Command::Read(file) => {
            let path = resolve_path(current_dir, file);
            let size = fs.stat(&path)?.size as usize;
            let bytes = fs.read(&path, 0, size)?;
            println!("📖 {} ({} bytes)", path.cyan(), bytes.len());
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        Command::Write(file, content) => {
            let path = resolve_path(current_dir, file);
            let written = overwrite_file(fs, &path, content.as_bytes())?;
            println!("✏️  Wrote {} bytes to {}", written, path.cyan());
        }
        Command::Stat(file) => {
            let path = resolve_path(current_dir, file);
            let stat = fs.stat(&path)?;
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {}\n{}: {} bytes\n{}: {}\n{}: {:?}\n",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                path,
                "Inode".blue(),
                stat.ino,
                "Type".blue(),
                stat.ftype,
                "Size".blue(),
                stat.size,
                "Entries".blue(),
                stat.dir_cnt,
                "Blocks".blue(),
                stat.blocks
            );
        }
        Command::Df => {
            let st = fs.statfs()?;
            println!("{}", "💽 Disk Usage".bright_yellow().bold());
            println!("{}: {}", "Volume".blue(), format_volume_id(&st.volume_id));
            println!("{}: {} B", "Block size".blue(), st.block_size);
            println!(
                "{}: {} / {} free",
                "Inodes".blue(),
                st.free_inodes,
                st.total_inodes
            );
            println!(
                "{}: {} / {} free",
                "Blocks".blue(),
                st.free_blocks,
                st.total_blocks
            );
            println!("{}: {} B", "Used".blue(), st.usage);
        }
        Command::Sync => {
            fs.sync_path("/")?;
            println!("{}", "💾 All loaded inodes flushed".green());
        }
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt("Formatting erases every file. Continue?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled".yellow());
                return Ok(());
            }

            println!("💾 Formatting virtual disk...");
            let pb = ProgressBar::new(2);
            pb.set_style(
                ProgressStyle::with_template("[{bar:40.green/black}] {pos}/{len} {msg}")?
                    .progress_chars("#>-"),
            );
            pb.set_message("writing layout");
            fs.format()?;
            pb.inc(1);
            pb.set_message("loading root");
            fs.lookup("/")?;
            pb.inc(1);
            pb.finish_with_message("✅ Disk formatted successfully!");
            *current_dir = "/".to_string();
        }
        Command::Exit => println!("{}", "👋 Exiting NewFS shell...".yellow().bold()),
    }

    Ok(())
}

/// 覆盖写：从头写入并截断到新内容长度。
/// 内容放不下时直接报错，原文件（或不存在的状态）保持不变。
pub fn overwrite_file<D: BlockDevice>(
    fs: &mut FileSystem<D>,
    path: &str,
    content: &[u8],
) -> newfs::Result<usize> {
    let capacity = file_capacity(fs.block_size());
    if content.len() > capacity {
        return Err(FileSystemError::FileTooLarge(format!(
            "{path}: {} bytes exceeds {capacity}",
            content.len()
        )));
    }

    if !fs.lookup(path)?.found {
        fs.create(path)?;
    }
    let written = fs.write(path, 0, content)?;
    fs.truncate(path, content.len())?;
    Ok(written)
}

fn print_help() {
    println!("{}", "📘 NewFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls [dir]           List directory entries
  pwd                Print current path
  mkdir <dir>        Create directory
  rmdir <dir>        Remove empty directory
  create <file>      Create file
  rm <file>          Remove file
  cd <dir>           Change directory
  read <file>        Read file content
  write <file> <str> Write string into file
  stat <path>        Show inode info
  df                 Show inode and block usage
  sync               Flush loaded inodes to disk
  format             Format virtual disk
  help               Show this help message
  exit               Unmount and quit the shell
"
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use newfs::{disk::DISK_SIZE, RamDisk};

    fn mounted() -> FileSystem<RamDisk> {
        let mut fs = FileSystem::new(RamDisk::new(DISK_SIZE));
        fs.mount().unwrap();
        fs
    }

    #[test]
    fn overwrite_replaces_and_shrinks_content() {
        let mut fs = mounted();
        assert_eq!(overwrite_file(&mut fs, "/note", b"a long first draft").unwrap(), 18);
        assert_eq!(overwrite_file(&mut fs, "/note", b"short").unwrap(), 5);
        assert_eq!(fs.read("/note", 0, 100).unwrap(), b"short".to_vec());
        assert_eq!(fs.readdir("/").unwrap().len(), 1);
    }

    #[test]
    fn oversized_overwrite_keeps_old_file() {
        let mut fs = mounted();
        overwrite_file(&mut fs, "/keep", b"precious").unwrap();
        let inodes_free = fs.inode_bitmap().free_count();

        let too_big = vec![b'x'; 6 * 1024 + 1];
        let err = overwrite_file(&mut fs, "/keep", &too_big).unwrap_err();
        assert!(matches!(err, FileSystemError::FileTooLarge(_)));
        assert_eq!(fs.read("/keep", 0, 100).unwrap(), b"precious".to_vec());
        assert_eq!(fs.inode_bitmap().free_count(), inodes_free);

        assert!(overwrite_file(&mut fs, "/fresh", &too_big).is_err());
        assert!(!fs.lookup("/fresh").unwrap().found);
    }
}
