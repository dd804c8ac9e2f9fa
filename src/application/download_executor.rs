use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    domain::{AppError, DownloadStatus, DownloadTask, FileCandidate},
};

/// Attempts at finding an unused `.part` name before giving up.
const PARTIAL_NAME_ATTEMPTS: u32 = 32;

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Cumulative bytes on disk; `total` is `None` when the server sent no length.
    Progress { bytes_written: u64, total: Option<u64> },
    /// Always the last event of a download stream.
    Finished(Result<DownloadTask, AppError>),
}

/// Cancel switch for one download.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    id: u64,
    cancellation: CancellationToken,
}

impl DownloadHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[derive(Clone)]
pub struct DownloadExecutor {
    api_client: ApiClient,
    next_id: Arc<AtomicU64>,
}

impl DownloadExecutor {
    pub fn new(api_client: ApiClient) -> Self {
        Self {
            api_client,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Prepares a transfer of `candidate` to `destination`.
    ///
    /// Does no I/O itself. When the returned stream is first polled, an
    /// existing `destination` ends it with [`AppError::AlreadyExists`] before
    /// any request goes out; the caller picks another path or gives up.
    ///
    /// The body is written to a hidden `.part` file next to `destination` and
    /// renamed over it only after the last byte is flushed. Every failure,
    /// cancellation included, removes the `.part` file.
    pub fn download(
        &self,
        candidate: FileCandidate,
        destination: PathBuf,
    ) -> Result<(DownloadHandle, BoxStream<'static, DownloadEvent>), AppError> {
        if destination.file_name().is_none() {
            return Err(AppError::InvalidInput(format!(
                "Not a file path: {}",
                destination.display()
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = DownloadHandle::new(id);

        let stream = futures::stream::unfold(
            DownloadRuntimeState::Start {
                client: self.api_client.clone(),
                task: DownloadTask::new(candidate, destination),
                handle: handle.clone(),
            },
            step,
        )
        .boxed();

        Ok((handle, stream))
    }
}

fn temp_path_for(destination: &Path, id: u64, attempt: u32) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if attempt == 0 {
        format!(".{}.{}.part", file_name, id)
    } else {
        format!(".{}.{}-{}.part", file_name, id, attempt)
    };
    destination.with_file_name(name)
}

/// Creates a fresh `.part` file, stepping past names left over by earlier runs.
async fn create_partial(
    destination: &Path,
    id: u64,
) -> std::io::Result<(tokio::fs::File, PartialFile)> {
    let mut attempt = 0;
    loop {
        let path = temp_path_for(destination, id, attempt);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, PartialFile::new(path))),
            Err(e)
                if e.kind() == std::io::ErrorKind::AlreadyExists
                    && attempt + 1 < PARTIAL_NAME_ATTEMPTS =>
            {
                debug!(path = %path.display(), "Partial file name taken, trying next");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Deletes the partial file when dropped, unless the download was kept.
struct PartialFile {
    path: PathBuf,
    kept: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, kept: false }
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove partial file: {}", e),
        }
    }
}

enum DownloadRuntimeState {
    Start {
        client: ApiClient,
        task: DownloadTask,
        handle: DownloadHandle,
    },
    Downloading {
        // Declared before `partial` so the handle closes before the file is removed.
        file: tokio::fs::File,
        partial: PartialFile,
        stream: BoxStream<'static, crate::api::Result<bytes::Bytes>>,
        task: DownloadTask,
        total: Option<u64>,
        handle: DownloadHandle,
    },
    Finished,
}

fn finish(
    mut task: DownloadTask,
    result: Result<(), AppError>,
) -> (DownloadEvent, DownloadRuntimeState) {
    let event = match result {
        Ok(()) => {
            task.advance(DownloadStatus::Completed);
            info!(
                file = %task.candidate.name,
                path = %task.destination_path.display(),
                bytes = task.bytes_written,
                "Download completed"
            );
            DownloadEvent::Finished(Ok(task))
        }
        Err(err) => {
            task.advance(DownloadStatus::Failed);
            match &err {
                AppError::Cancelled => info!(file = %task.candidate.name, "Download cancelled"),
                _ => warn!(file = %task.candidate.name, "Download failed: {}", err),
            }
            DownloadEvent::Finished(Err(err))
        }
    };
    (event, DownloadRuntimeState::Finished)
}

async fn step(state: DownloadRuntimeState) -> Option<(DownloadEvent, DownloadRuntimeState)> {
    match state {
        DownloadRuntimeState::Start {
            client,
            mut task,
            handle,
        } => {
            if handle.is_cancelled() {
                return Some(finish(task, Err(AppError::Cancelled)));
            }
            if tokio::fs::try_exists(&task.destination_path)
                .await
                .unwrap_or(false)
            {
                let existing = task.destination_path.clone();
                return Some(finish(task, Err(AppError::AlreadyExists(existing))));
            }

            task.advance(DownloadStatus::InProgress);
            info!(url = %task.candidate.download_url, "Download started");

            let response = tokio::select! {
                biased;
                _ = handle.cancellation.cancelled() => None,
                response = client.download_file_stream(&task.candidate.download_url) => Some(response),
            };
            let (total, stream) = match response {
                Some(Ok(response)) => response,
                Some(Err(e)) => return Some(finish(task, Err(e.into()))),
                None => return Some(finish(task, Err(AppError::Cancelled))),
            };

            let (file, partial) = match create_partial(&task.destination_path, handle.id).await {
                Ok(created) => created,
                Err(e) => {
                    return Some(finish(
                        task,
                        Err(AppError::Disk(format!("Failed to create file: {}", e))),
                    ))
                }
            };

            Some((
                DownloadEvent::Progress {
                    bytes_written: 0,
                    total,
                },
                DownloadRuntimeState::Downloading {
                    file,
                    partial,
                    stream,
                    task,
                    total,
                    handle,
                },
            ))
        }
        DownloadRuntimeState::Downloading {
            mut file,
            partial,
            mut stream,
            mut task,
            total,
            handle,
        } => {
            // A stalled read must not hold up a cancel.
            let next = tokio::select! {
                biased;
                _ = handle.cancellation.cancelled() => None,
                next = stream.next() => Some(next),
            };
            let Some(next) = next else {
                drop(stream);
                drop(file);
                drop(partial);
                return Some(finish(task, Err(AppError::Cancelled)));
            };

            match next {
                Some(Ok(chunk)) => {
                    if let Err(e) = file.write_all(&chunk).await {
                        drop(file);
                        drop(partial);
                        return Some(finish(
                            task,
                            Err(AppError::Disk(format!("Write error: {}", e))),
                        ));
                    }

                    task.bytes_written += chunk.len() as u64;

                    Some((
                        DownloadEvent::Progress {
                            bytes_written: task.bytes_written,
                            total,
                        },
                        DownloadRuntimeState::Downloading {
                            file,
                            partial,
                            stream,
                            task,
                            total,
                            handle,
                        },
                    ))
                }
                Some(Err(e)) => {
                    drop(file);
                    drop(partial);
                    Some(finish(task, Err(e.into())))
                }
                None => {
                    let result = complete(file, partial, &task, total).await;
                    Some(finish(task, result))
                }
            }
        }
        DownloadRuntimeState::Finished => None,
    }
}

/// Flushes the partial file and moves it onto the destination.
async fn complete(
    mut file: tokio::fs::File,
    partial: PartialFile,
    task: &DownloadTask,
    total: Option<u64>,
) -> Result<(), AppError> {
    if let Some(expected) = total {
        if expected != task.bytes_written {
            return Err(AppError::Network(format!(
                "Connection closed after {} of {} bytes",
                task.bytes_written, expected
            )));
        }
    }

    let synced = async {
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);
    synced.map_err(|e| AppError::Disk(format!("Failed to sync file: {}", e)))?;

    // Someone may have created the destination while we were downloading.
    if tokio::fs::try_exists(&task.destination_path)
        .await
        .unwrap_or(false)
    {
        return Err(AppError::AlreadyExists(task.destination_path.clone()));
    }

    tokio::fs::rename(&partial.path, &task.destination_path)
        .await
        .map_err(|e| AppError::Disk(format!("Failed to move file into place: {}", e)))?;
    partial.keep();
    Ok(())
}
