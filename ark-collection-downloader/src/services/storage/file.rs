use crate::interfaces::error::DownloaderError;
use serde_json::Value;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

const METADATA_DIR: &str = "image_data";
const PARTIAL_SUFFIX: &str = ".part";

/// Local layout of a downloaded collection:
///
/// ```text
/// <output_dir>/<collection>/<id>.<ext>
/// <output_dir>/<collection>/image_data/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileManager {
    collection_dir: PathBuf,
    image_extension: String,
}

impl LocalFileManager {
    pub fn new(output_dir: impl AsRef<Path>, collection: &str, image_extension: &str) -> Self {
        Self {
            collection_dir: output_dir.as_ref().join(collection),
            image_extension: image_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn collection_dir(&self) -> &Path {
        &self.collection_dir
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.collection_dir.join(METADATA_DIR)
    }

    pub fn image_path(&self, file_stem: &str) -> PathBuf {
        self.collection_dir
            .join(format!("{}.{}", file_stem, self.image_extension))
    }

    pub fn metadata_path(&self, file_stem: &str) -> PathBuf {
        self.metadata_dir().join(format!("{}.json", file_stem))
    }

    /// Creates the collection directory, and the metadata one if requested.
    pub async fn prepare(&self, with_metadata: bool) -> io::Result<()> {
        fs::create_dir_all(&self.collection_dir).await?;
        if with_metadata {
            fs::create_dir_all(self.metadata_dir()).await?;
        }
        Ok(())
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Writes `content` next to `path` first, then renames it into place so an
    /// interrupted run never leaves a truncated file behind.
    pub async fn save(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let partial = partial_path(path);
        fs::write(&partial, content).await?;
        if let Err(e) = fs::rename(&partial, path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }
        trace!("Saved {} bytes to {}", content.len(), path.display());
        Ok(())
    }

    /// Stores a pretty printed JSON record, unless the file already exists.
    /// Returns `true` when a file was written.
    pub async fn save_json(&self, path: &Path, value: &Value) -> Result<bool, DownloaderError> {
        if self.exists(path).await {
            return Ok(false);
        }
        let content = serde_json::to_vec_pretty(value)?;
        self.save(path, &content).await?;
        Ok(true)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}
