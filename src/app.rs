use std::collections::HashMap;
use std::path::PathBuf;

use futures::StreamExt;
use iced::Task;
use tracing::debug;

use crate::api::{ApiClient, ApiConfig};
use crate::application::{DownloadCoordinator, DownloadEvent, DownloadHandle};
use crate::domain::{AppError, DownloadStatus, FileCandidate, SearchResult};
use crate::ui::{BrowserView, DownloadRow, UiMessage};

/// All UI state. Only `update` mutates it; workers report back through
/// [`Message`].
pub struct ArchiveApp {
    view: BrowserView,
    coordinator: DownloadCoordinator,
    // Cancel switches of running downloads, keyed by handle id
    active_downloads: HashMap<u64, DownloadHandle>,
    // Bumped per listing request; only the latest answer is applied
    listing_seq: u64,
}

impl Default for ArchiveApp {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

impl ArchiveApp {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            view: BrowserView::default(),
            coordinator: DownloadCoordinator::new(ApiClient::new(config)),
            active_downloads: HashMap::new(),
            listing_seq: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(UiMessage),
    SearchCompleted(Result<Vec<SearchResult>, AppError>),
    /// (Request sequence, Identifier, Candidates)
    FilesListed(u64, String, Result<Vec<FileCandidate>, AppError>),
    /// (Candidate, Free path next to the selected one)
    SaveLocationChosen(FileCandidate, Option<PathBuf>),
    BrowserOpened(Result<(), AppError>),
    /// (Download id, Event)
    Download(u64, DownloadEvent),
}

pub fn update(app: &mut ArchiveApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());
            return handle_ui(app, ui_msg);
        }
        Message::SearchCompleted(result) => {
            app.view.is_searching = false;
            match result {
                Ok(results) => {
                    app.view.status_message = format!("Search complete: {} results", results.len());
                    app.view.replace_results(results);
                }
                Err(e) => {
                    app.view.status_message = format!("Search failed: {}", e);
                }
            }
        }
        Message::FilesListed(seq, identifier, result) => {
            if seq != app.listing_seq {
                debug!(identifier = %identifier, seq, "Ignoring superseded file list");
                return Task::none();
            }

            app.view.is_listing = false;
            match result {
                Ok(candidates) => {
                    app.view.status_message = if candidates.is_empty() {
                        format!("No installer files found in {}", identifier)
                    } else {
                        format!("{} candidate files found", candidates.len())
                    };
                    app.view.selected_file = candidates.first().cloned();
                    app.view.candidates = candidates;
                }
                Err(e) => {
                    app.view.status_message =
                        format!("Failed to fetch metadata for {}: {}", identifier, e);
                }
            }
        }
        Message::SaveLocationChosen(candidate, path_opt) => match path_opt {
            Some(path) => return start_download(app, candidate, path),
            None => {
                // User cancelled dialog
                app.view.status_message = "Download cancelled".to_string();
            }
        },
        Message::BrowserOpened(result) => {
            if let Err(e) = result {
                app.view.status_message = e.to_string();
            }
        }
        Message::Download(id, event) => apply_download_event(app, id, event),
    }
    Task::none()
}

fn handle_ui(app: &mut ArchiveApp, message: UiMessage) -> Task<Message> {
    match message {
        UiMessage::SearchPressed => {
            let query = app.view.query.trim().to_string();
            if query.is_empty() {
                app.view.status_message = "Please enter a search query".to_string();
                return Task::none();
            }
            if app.view.is_searching {
                return Task::none();
            }

            // A pasted item link skips the search and lists the item directly
            if let Some(identifier) = crate::utils::extract_identifier(&query) {
                app.view.replace_results(vec![SearchResult {
                    title: identifier.clone(),
                    identifier,
                }]);
                app.view.selected = Some(0);
                refresh_item_page_url(app);
                return list_files(app);
            }

            app.view.is_searching = true;
            app.view.status_message = "Searching...".to_string();
            let coordinator = app.coordinator.clone();
            Task::perform(
                async move { coordinator.search(query).await },
                Message::SearchCompleted,
            )
        }
        UiMessage::ResultSelected(_) => {
            app.listing_seq += 1;
            app.view.is_listing = false;
            refresh_item_page_url(app);
            Task::none()
        }
        UiMessage::ListFilesPressed => list_files(app),
        UiMessage::CopyLinkPressed => match app.view.item_page_url.clone() {
            Some(url) => {
                app.view.status_message = format!("Copied {}", url);
                iced::clipboard::write(url)
            }
            None => Task::none(),
        },
        UiMessage::OpenPagePressed => match app.view.item_page_url.clone() {
            Some(url) => {
                let coordinator = app.coordinator.clone();
                Task::perform(
                    async move { coordinator.open_in_browser(url).await },
                    Message::BrowserOpened,
                )
            }
            None => Task::none(),
        },
        UiMessage::DownloadPressed => {
            let Some(candidate) = app.view.selected_file.clone() else {
                app.view.status_message = "Please select a file from the candidate list".to_string();
                return Task::none();
            };
            app.view.status_message = "Please select save location...".to_string();

            let coordinator = app.coordinator.clone();
            let suggested = DownloadCoordinator::suggested_filename(&candidate);
            Task::perform(
                async move {
                    match coordinator.choose_save_path(suggested).await {
                        Some(path) => Some(coordinator.free_destination(path).await),
                        None => None,
                    }
                },
                move |path| Message::SaveLocationChosen(candidate.clone(), path),
            )
        }
        UiMessage::CancelPressed(id) => {
            if let Some(handle) = app.active_downloads.get(&id) {
                handle.cancel();
                if let Some(row) = app.view.download_mut(id) {
                    row.cancel_requested = true;
                    row.note = "Cancelling...".to_string();
                }
            }
            Task::none()
        }
        UiMessage::QueryChanged(_) | UiMessage::FileSelected(_) | UiMessage::ClearFinishedPressed => {
            Task::none()
        }
    }
}

fn refresh_item_page_url(app: &mut ArchiveApp) {
    let Some(identifier) = app.view.selected_result().map(|r| r.identifier.clone()) else {
        return;
    };
    match app.coordinator.item_page_url(&identifier) {
        Ok(url) => app.view.item_page_url = Some(url),
        Err(e) => app.view.status_message = e.to_string(),
    }
}

fn list_files(app: &mut ArchiveApp) -> Task<Message> {
    let Some(identifier) = app.view.selected_result().map(|r| r.identifier.clone()) else {
        return Task::none();
    };

    app.listing_seq += 1;
    let seq = app.listing_seq;
    app.view.is_listing = true;
    app.view.status_message = format!("Fetching metadata for {}", identifier);

    let coordinator = app.coordinator.clone();
    Task::perform(
        {
            let identifier = identifier.clone();
            async move { coordinator.list_files(identifier).await }
        },
        move |result| Message::FilesListed(seq, identifier.clone(), result),
    )
}

fn start_download(app: &mut ArchiveApp, candidate: FileCandidate, path: PathBuf) -> Task<Message> {
    let name = candidate.name.clone();
    match app.coordinator.start_download(candidate, path.clone()) {
        Ok((handle, stream)) => {
            let id = handle.id();
            app.view.status_message = format!("Downloading to: {}", path.display());
            app.view.downloads.push(DownloadRow::new(id, name, path));
            app.active_downloads.insert(id, handle);

            Task::stream(stream.map(move |event| Message::Download(id, event)))
        }
        Err(e) => {
            app.view.status_message = format!("Download failed: {}", e);
            Task::none()
        }
    }
}

fn apply_download_event(app: &mut ArchiveApp, id: u64, event: DownloadEvent) {
    let Some(row) = app.view.download_mut(id) else {
        return;
    };

    match event {
        DownloadEvent::Progress {
            bytes_written,
            total,
        } => {
            row.status = DownloadStatus::InProgress;
            row.bytes_written = bytes_written;
            row.total = total;
            if !row.cancel_requested {
                row.note = match total {
                    Some(t) if t > 0 => {
                        format!("Downloading: {:.1}%", bytes_written as f64 * 100.0 / t as f64)
                    }
                    _ => format!("Downloaded {}", crate::utils::format_bytes(bytes_written)),
                };
            }
        }
        DownloadEvent::Finished(result) => {
            app.active_downloads.remove(&id);
            match result {
                Ok(task) => {
                    row.status = DownloadStatus::Completed;
                    row.bytes_written = task.bytes_written;
                    row.note = "Saved".to_string();
                    app.view.status_message =
                        format!("Saved: {}", task.destination_path.display());
                }
                Err(AppError::Cancelled) => {
                    row.status = DownloadStatus::Failed;
                    row.note = "Cancelled".to_string();
                }
                Err(e) => {
                    row.status = DownloadStatus::Failed;
                    row.note = format!("Failed: {}", e);
                    app.view.status_message = format!("Download failed: {}", e);
                }
            }
        }
    }
}

pub fn view(app: &ArchiveApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
