use std::path::PathBuf;

use iced::{
    widget::{
        button, column, container, pick_list, progress_bar, row, scrollable, text, text_input,
        Column, Space,
    },
    Element, Length,
};

use crate::domain::{DownloadStatus, FileCandidate, SearchResult};
use crate::utils::format_bytes;

/// One line in the downloads panel
#[derive(Debug, Clone)]
pub struct DownloadRow {
    pub id: u64,
    pub name: String,
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub total: Option<u64>,
    pub status: DownloadStatus,
    pub note: String,
    pub cancel_requested: bool,
}

impl DownloadRow {
    pub fn new(id: u64, name: String, destination: PathBuf) -> Self {
        Self {
            id,
            name,
            destination,
            bytes_written: 0,
            total: None,
            status: DownloadStatus::Pending,
            note: "Connecting...".to_string(),
            cancel_requested: false,
        }
    }

    fn progress(&self) -> f32 {
        match self.total {
            Some(total) if total > 0 => self.bytes_written as f32 / total as f32,
            _ => 0.0,
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.status, DownloadStatus::Pending | DownloadStatus::InProgress)
    }
}

/// Main view state
pub struct BrowserView {
    pub query: String,
    pub status_message: String,
    pub is_searching: bool,
    pub results: Vec<SearchResult>,
    pub selected: Option<usize>,
    pub item_page_url: Option<String>,
    pub is_listing: bool,
    pub candidates: Vec<FileCandidate>,
    pub selected_file: Option<FileCandidate>,
    pub downloads: Vec<DownloadRow>,
}

impl Default for BrowserView {
    fn default() -> Self {
        Self {
            query: String::new(),
            status_message: "Search for software or paste an archive.org item link".to_string(),
            is_searching: false,
            results: Vec::new(),
            selected: None,
            item_page_url: None,
            is_listing: false,
            candidates: Vec::new(),
            selected_file: None,
            downloads: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum UiMessage {
    QueryChanged(String),
    SearchPressed,
    ResultSelected(usize),
    ListFilesPressed,
    CopyLinkPressed,
    OpenPagePressed,
    FileSelected(FileCandidate),
    DownloadPressed,
    CancelPressed(u64),
    ClearFinishedPressed,
}

impl BrowserView {
    pub fn update(&mut self, message: UiMessage) {
        match message {
            UiMessage::QueryChanged(query) => {
                self.query = query;
            }
            UiMessage::ResultSelected(index) => {
                if index < self.results.len() {
                    self.selected = Some(index);
                    self.item_page_url = None;
                    self.candidates.clear();
                    self.selected_file = None;
                }
            }
            UiMessage::FileSelected(file) => {
                self.selected_file = Some(file);
            }
            UiMessage::ClearFinishedPressed => {
                self.downloads.retain(DownloadRow::is_active);
            }
            // Will be handled by the app
            _ => {}
        }
    }

    pub fn selected_result(&self) -> Option<&SearchResult> {
        self.selected.and_then(|index| self.results.get(index))
    }

    pub fn replace_results(&mut self, results: Vec<SearchResult>) {
        self.results = results;
        self.selected = None;
        self.item_page_url = None;
        self.candidates.clear();
        self.selected_file = None;
    }

    pub fn download_mut(&mut self, id: u64) -> Option<&mut DownloadRow> {
        self.downloads.iter_mut().find(|row| row.id == id)
    }

    pub fn view(&self) -> Element<'_, UiMessage> {
        let search_row = row![
            text_input("Search query or item link...", &self.query)
                .on_input(UiMessage::QueryChanged)
                .on_submit(UiMessage::SearchPressed)
                .padding(10),
            button("Search")
                .on_press_maybe((!self.is_searching).then_some(UiMessage::SearchPressed))
                .padding([10, 20]),
        ]
        .spacing(10);

        let results = Column::with_children(self.results.iter().enumerate().map(|(i, result)| {
            let style = if self.selected == Some(i) {
                button::primary
            } else {
                button::text
            };
            button(text(format!("{} ({})", result.title, result.identifier)).size(14))
                .on_press(UiMessage::ResultSelected(i))
                .style(style)
                .width(Length::Fill)
                .into()
        }))
        .spacing(2);

        column![
            text("Internet Archive Installer Fetch").size(28),
            search_row,
            text(&self.status_message).size(14),
            container(scrollable(results).height(Length::Fill)).height(Length::FillPortion(3)),
            self.details_view(),
            Space::new().height(Length::Fixed(10.0)),
            self.downloads_view(),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }

    fn details_view(&self) -> Element<'_, UiMessage> {
        let Some(result) = self.selected_result() else {
            return text("Select a result to see its files").size(14).into();
        };

        let link = self.item_page_url.as_deref().unwrap_or_default();
        let actions = row![
            button("List candidate files")
                .on_press_maybe((!self.is_listing).then_some(UiMessage::ListFilesPressed)),
            button("Copy page link")
                .on_press_maybe(self.item_page_url.as_ref().map(|_| UiMessage::CopyLinkPressed)),
            button("Open in browser")
                .on_press_maybe(self.item_page_url.as_ref().map(|_| UiMessage::OpenPagePressed)),
        ]
        .spacing(10);

        let files = row![
            pick_list(
                self.candidates.as_slice(),
                self.selected_file.clone(),
                UiMessage::FileSelected
            )
            .placeholder("Candidate files")
            .width(Length::Fill),
            button("Download")
                .on_press_maybe(self.selected_file.as_ref().map(|_| UiMessage::DownloadPressed)),
        ]
        .spacing(10);

        column![
            text(format!("Title: {}", result.title)).size(16),
            text(format!("Identifier: {}", result.identifier)).size(14),
            text(link).size(12),
            actions,
            files,
        ]
        .spacing(6)
        .into()
    }

    fn downloads_view(&self) -> Element<'_, UiMessage> {
        if self.downloads.is_empty() {
            return Space::new().height(Length::Shrink).into();
        }

        let rows = Column::with_children(self.downloads.iter().map(|download| {
            let amount = match download.total {
                Some(total) => format!(
                    "{} / {}",
                    format_bytes(download.bytes_written),
                    format_bytes(total)
                ),
                None => format_bytes(download.bytes_written),
            };
            let cancel = button("Cancel").on_press_maybe(
                (download.is_active() && !download.cancel_requested)
                    .then_some(UiMessage::CancelPressed(download.id)),
            );

            column![
                row![
                    text(&download.name).size(14).width(Length::Fill),
                    text(amount).size(12),
                    cancel,
                ]
                .spacing(10),
                progress_bar(0.0..=1.0, download.progress()),
                text(format!("{} ({})", download.note, download.destination.display())).size(12),
            ]
            .spacing(4)
            .into()
        }))
        .spacing(8);

        column![
            row![
                text("Downloads").size(18).width(Length::Fill),
                button("Clear finished").on_press(UiMessage::ClearFinishedPressed),
            ],
            scrollable(rows).height(Length::Fixed(180.0)),
        ]
        .spacing(6)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<SearchResult> {
        vec![
            SearchResult { title: "WinZip 8.1".into(), identifier: "winzip81".into() },
            SearchResult { title: "Office 97".into(), identifier: "office97".into() },
        ]
    }

    #[test]
    fn test_selecting_result_clears_files() {
        let mut view = BrowserView::default();
        view.replace_results(results());
        view.candidates.push(FileCandidate {
            name: "setup.exe".into(),
            extension: "exe".into(),
            size: None,
            download_url: String::new(),
        });

        view.update(UiMessage::ResultSelected(1));
        assert_eq!(view.selected_result().unwrap().identifier, "office97");
        assert!(view.candidates.is_empty());

        view.update(UiMessage::ResultSelected(9));
        assert_eq!(view.selected, Some(1));
    }

    #[test]
    fn test_clear_finished_keeps_active_downloads() {
        let mut view = BrowserView::default();
        let mut done = DownloadRow::new(1, "a.zip".into(), PathBuf::from("a.zip"));
        done.status = DownloadStatus::Completed;
        view.downloads.push(done);
        view.downloads.push(DownloadRow::new(2, "b.zip".into(), PathBuf::from("b.zip")));

        view.update(UiMessage::ClearFinishedPressed);
        assert_eq!(view.downloads.len(), 1);
        assert_eq!(view.downloads[0].id, 2);
    }
}
