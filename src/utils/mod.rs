use std::path::{Path, PathBuf};

use regex::Regex;

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Pull an item identifier out of a pasted archive.org item URL.
///
/// Accepts `/details/<id>`, `/metadata/<id>` and `/download/<id>/...` links.
/// Plain search text yields `None`.
pub fn extract_identifier(input: &str) -> Option<String> {
    let re = Regex::new(
        r"^(?:https?://)?(?:www\.)?archive\.org/(?:details|metadata|download)/([A-Za-z0-9._-]+)",
    )
    .ok()?;
    re.captures(input.trim()).map(|caps| caps[1].to_string())
}

/// First path of the form `name (n).ext` next to `path` that does not exist.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1u32..)
        .map(|n| {
            let name = match &ext {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Human readable byte count, e.g. `1.5 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test/file.exe"), "test_file.exe");
        assert_eq!(sanitize_filename("normal-name.zip"), "normal-name.zip");
    }

    #[test]
    fn test_extract_identifier() {
        assert_eq!(
            extract_identifier("https://archive.org/details/winzip_8.1").as_deref(),
            Some("winzip_8.1")
        );
        assert_eq!(
            extract_identifier("archive.org/download/msoffice97/SETUP.EXE").as_deref(),
            Some("msoffice97")
        );
        assert_eq!(extract_identifier("winamp 2.95"), None);
    }

    #[test]
    fn test_next_free_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("setup.exe");
        assert_eq!(next_free_path(&target), target);

        std::fs::write(&target, b"x").unwrap();
        std::fs::write(dir.path().join("setup (1).exe"), b"x").unwrap();
        assert_eq!(next_free_path(&target), dir.path().join("setup (2).exe"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(734_003_200), "700.0 MiB");
    }
}
