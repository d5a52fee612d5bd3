use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls(args.first().map(|s| s.to_string()))),
        "pwd" => Some(Command::Pwd),
        "mkdir" => args.first().map(|&name| Command::Mkdir(name.to_string())),
        "rmdir" => args.first().map(|&name| Command::Rmdir(name.to_string())),
        "create" | "touch" => args.first().map(|&name| Command::Create(name.to_string())),
        "rm" => args.first().map(|&name| Command::Rm(name.to_string())),
        "cd" => Some(Command::Cd(args.first().unwrap_or(&"/").to_string())),
        "read" | "cat" => args.first().map(|&name| Command::Read(name.to_string())),
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(args[0].to_string(), args[1..].join(" ")))
            } else {
                None
            }
        }
        "stat" => args.first().map(|&name| Command::Stat(name.to_string())),
        "df" => Some(Command::Df),
        "sync" => Some(Command::Sync),
        "format" => Some(Command::Format),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_with_spaces() {
        match parse_command("write notes.txt hello   big world") {
            Some(Command::Write(file, content)) => {
                assert_eq!(file, "notes.txt");
                assert_eq!(content, "hello big world");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(parse_command("mkdir").is_none());
        assert!(parse_command("write only-file").is_none());
        assert!(parse_command("bogus").is_none());
        assert!(matches!(parse_command("ls"), Some(Command::Ls(None))));
        assert!(matches!(parse_command("cd"), Some(Command::Cd(p)) if p == "/"));
    }
}
