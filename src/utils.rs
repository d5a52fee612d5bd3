use chrono::Local;
use uuid::Uuid;

/// 当前本地时间，用于 shell 中的提示信息
pub fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 生成一个随机卷标识
pub fn generate_volume_id() -> [u8; 16] {
    *Uuid::new_v4().as_bytes()
}

pub fn format_volume_id(id: &[u8; 16]) -> String {
    Uuid::from_bytes(*id).hyphenated().to_string()
}

/// 把相对路径拼到当前目录上，并处理 `.` 与 `..`
pub fn resolve_path(current_dir: &str, path: &str) -> String {
    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        current_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_dot_segments() {
        assert_eq!(resolve_path("/", "a"), "/a");
        assert_eq!(resolve_path("/a/b", "../c"), "/a/c");
        assert_eq!(resolve_path("/a", "/x/./y/"), "/x/y");
        assert_eq!(resolve_path("/", ".."), "/");
    }

    #[test]
    fn volume_id_formats_as_uuid() {
        let id = generate_volume_id();
        assert_eq!(format_volume_id(&id).len(), 36);
    }
}
