pub mod interfaces;
pub mod services;
pub mod utils;

pub use interfaces::error::DownloaderError;
pub use services::downloader::{CollectionDownloader, DownloadOptions, DownloadSummary};
