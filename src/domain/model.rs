use std::fmt;
use std::path::PathBuf;

/// File suffixes treated as installers or installer archives.
pub const INSTALLER_EXTENSIONS: [&str; 6] = ["exe", "msi", "zip", "7z", "rar", "iso"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Full path of the file inside the item, as listed in the manifest.
    pub name: String,
    /// Lower-cased, always one of [`INSTALLER_EXTENSIONS`].
    pub extension: String,
    pub size: Option<u64>,
    pub download_url: String,
}

impl FileCandidate {
    /// Last path component of `name`, used as the default save name.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for FileCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "{} ({})", self.name, crate::utils::format_bytes(size)),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Returns the lower-cased extension of `name` when it is an installer type.
pub fn installer_extension(name: &str) -> Option<String> {
    let file_name = name.rsplit('/').next()?;
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    INSTALLER_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DownloadStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl DownloadStatus {
    fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub candidate: FileCandidate,
    pub destination_path: PathBuf,
    pub bytes_written: u64,
    status: DownloadStatus,
}

impl DownloadTask {
    pub fn new(candidate: FileCandidate, destination_path: PathBuf) -> Self {
        Self {
            candidate,
            destination_path,
            bytes_written: 0,
            status: DownloadStatus::Pending,
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    /// Moves the task forward. Backward moves and moves out of a terminal
    /// state are refused and return `false`.
    pub fn advance(&mut self, next: DownloadStatus) -> bool {
        if self.status.is_terminal() || next <= self.status {
            return false;
        }
        self.status = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> FileCandidate {
        FileCandidate {
            name: "disk1/SETUP.EXE".to_string(),
            extension: "exe".to_string(),
            size: Some(2048),
            download_url: "https://archive.org/download/item/disk1/SETUP.EXE".to_string(),
        }
    }

    #[test]
    fn test_installer_extension_is_case_insensitive() {
        assert_eq!(installer_extension("Setup.EXE").as_deref(), Some("exe"));
        assert_eq!(installer_extension("data.ISO").as_deref(), Some("iso"));
        assert_eq!(installer_extension("pack.7Z").as_deref(), Some("7z"));
        assert_eq!(installer_extension("readme.txt"), None);
    }

    #[test]
    fn test_installer_extension_uses_last_component() {
        assert_eq!(installer_extension("cd.zip/readme"), None);
        assert_eq!(installer_extension("dir.v2/tool.msi").as_deref(), Some("msi"));
        assert_eq!(installer_extension(".zip").as_deref(), Some("zip"));
        assert_eq!(installer_extension("disk1/.ISO").as_deref(), Some("iso"));
        assert_eq!(installer_extension("disk1/."), None);
        assert_eq!(installer_extension("archive.tar.gz"), None);
    }

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(candidate().file_name(), "SETUP.EXE");
    }

    #[test]
    fn test_status_moves_forward_only() {
        let mut task = DownloadTask::new(candidate(), PathBuf::from("/tmp/SETUP.EXE"));
        assert_eq!(task.status(), DownloadStatus::Pending);
        assert!(task.advance(DownloadStatus::InProgress));
        assert!(!task.advance(DownloadStatus::Pending));
        assert!(task.advance(DownloadStatus::Completed));
        assert!(!task.advance(DownloadStatus::Failed));
        assert_eq!(task.status(), DownloadStatus::Completed);
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let mut task = DownloadTask::new(candidate(), PathBuf::from("/tmp/SETUP.EXE"));
        assert!(task.advance(DownloadStatus::Failed));
        assert!(!task.advance(DownloadStatus::InProgress));
    }
}
