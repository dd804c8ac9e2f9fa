pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    installer_extension, DownloadStatus, DownloadTask, FileCandidate, SearchResult,
};
