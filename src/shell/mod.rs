pub mod cli;
pub mod command;
pub mod parse;

use crate::shell::{cli::Cli, command::execute_command, parse::parse_command};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use newfs::{utils::current_timestamp, FileDisk, FileSystem};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{error::Error, io::stdout, path::PathBuf};

pub fn start_shell(cli: Cli) {
    let mut fs = match boot(&cli) {
        Ok(fs) => fs,
        Err(e) => {
            println!("{} {}", "❌ Boot failed:".red().bold(), e);
            return;
        }
    };

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    let mut current_dir = String::from("/");

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history.\n".bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".newfs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => log::warn!("history disabled: {e}"),
    }

    // 命令补全
    let commands: Vec<String> = [
        "help", "ls", "pwd", "mkdir", "rmdir", "create", "rm", "cd", "read", "write", "stat",
        "df", "sync", "format", "exit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}:{}",
                format!("{}@{}", username, hostname).green(),
                current_dir.blue()
            )),
            DefaultPromptSegment::Basic("NewFS".bright_blue().bold().to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs, &mut current_dir) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting NewFS...".yellow());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    match fs.unmount() {
        Ok(()) => println!("{}", "💾 Unmounted cleanly. GoodBye!".bright_yellow()),
        Err(e) => println!("{} {}", "❌ Unmount failed:".red().bold(), e),
    }
}

/// 打开磁盘镜像并挂载，进度条跟随真实步骤推进
fn boot(cli: &Cli) -> Result<FileSystem<FileDisk>, Box<dyn Error>> {
    let mut stdout = stdout();
    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    println!("{}", "[NewFS Booting...]".bright_yellow().bold());

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    pb.set_message(format!("🧠 Opening {}", cli.device.display()));
    let disk = FileDisk::with_geometry(&cli.device, cli.size, cli.io_size)?;
    pb.inc(1);

    pb.set_message("⚙️  Mounting file system...");
    let mut fs = FileSystem::new(disk);
    fs.mount()?;
    pb.inc(1);

    pb.set_message("📁 Loading root directory...");
    let root_entries = fs.readdir("/")?.len();
    pb.inc(1);
    pb.finish_with_message("✅ Ready!");

    execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print(format!(
            "Welcome to NewFS v{} (mounted {} at {}, {} entries in /)\n",
            env!("CARGO_PKG_VERSION"),
            cli.device.display(),
            current_timestamp(),
            root_entries
        )),
        ResetColor
    )?;

    Ok(fs)
}
