pub mod download_coordinator;
pub mod download_executor;

pub use download_coordinator::DownloadCoordinator;
pub use download_executor::{DownloadEvent, DownloadHandle};
