use std::path::PathBuf;

use futures::stream::BoxStream;
use tracing::{debug, info, warn};

use super::download_executor::{DownloadEvent, DownloadExecutor, DownloadHandle};
use crate::{
    api::ApiClient,
    domain::{AppError, FileCandidate, SearchResult},
    utils::{next_free_path, sanitize_filename},
};

/// Entry point for the UI: every method here is safe to run on a worker.
#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
    executor: DownloadExecutor,
}

impl DownloadCoordinator {
    pub fn new(api_client: ApiClient) -> Self {
        let executor = DownloadExecutor::new(api_client.clone());
        Self {
            api_client,
            executor,
        }
    }

    pub async fn search(&self, query: String) -> Result<Vec<SearchResult>, AppError> {
        Ok(self.api_client.search(&query).await?)
    }

    pub async fn list_files(&self, identifier: String) -> Result<Vec<FileCandidate>, AppError> {
        Ok(self.api_client.list_files(&identifier).await?)
    }

    pub fn item_page_url(&self, identifier: &str) -> Result<String, AppError> {
        Ok(self.api_client.item_page_url(identifier)?)
    }

    pub fn suggested_filename(candidate: &FileCandidate) -> String {
        let name = sanitize_filename(candidate.file_name());
        let name = name.trim_matches(|c| c == '.' || c == ' ');
        // A bare dotfile such as `.zip` would otherwise lose its extension
        if name.is_empty() || name.eq_ignore_ascii_case(&candidate.extension) {
            format!("download.{}", candidate.extension)
        } else {
            name.to_string()
        }
    }

    pub async fn choose_save_path(&self, suggested_filename: String) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_title("Save installer as")
            .set_file_name(&suggested_filename)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    /// Where a download chosen for `path` should go: `path` itself, or the
    /// next free `name (n).ext` next to it when `path` is taken.
    pub async fn free_destination(&self, path: PathBuf) -> PathBuf {
        let requested = path.clone();
        let free = tokio::task::spawn_blocking(move || next_free_path(&path))
            .await
            .unwrap_or_else(|e| {
                warn!("Destination lookup aborted: {}", e);
                requested.clone()
            });
        if free != requested {
            info!(
                existing = %requested.display(),
                renamed = %free.display(),
                "Destination exists, saving under a new name"
            );
        }
        free
    }

    pub fn start_download(
        &self,
        candidate: FileCandidate,
        destination: PathBuf,
    ) -> Result<(DownloadHandle, BoxStream<'static, DownloadEvent>), AppError> {
        self.executor.download(candidate, destination)
    }

    /// Opens `url` in the system's default browser.
    pub async fn open_in_browser(&self, url: String) -> Result<(), AppError> {
        debug!(url = %url, "Opening item page");
        tokio::task::spawn_blocking(move || open::that(&url))
            .await
            .map_err(|e| AppError::Browser(e.to_string()))?
            .map_err(|e| AppError::Browser(e.to_string()))
    }
}
