pub mod downloader;
pub mod ipfs;
pub mod marketplace;
pub mod storage;
