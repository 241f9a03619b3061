pub mod file;

pub use file::LocalFileManager;
