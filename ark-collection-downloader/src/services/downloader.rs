use crate::interfaces::error::DownloaderError;
use crate::interfaces::nft::{padding_width, NftPage, NftRecord, PageRequest};
use crate::services::ipfs::IpfsGateways;
use crate::services::marketplace::{page_count, MarketplaceApi};
use crate::services::storage::LocalFileManager;
use crate::utils::app_config::{AppConfig, PaginationMode};

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{header, Client as ReqwestClient};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub image_extension: String,
    pub page_size: u32,
    pub pagination: PaginationMode,
    pub max_concurrent_downloads: usize,
    pub max_concurrent_pages: usize,
    pub save_metadata: bool,
}

impl From<&AppConfig> for DownloadOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            image_extension: config.image_extension.clone(),
            page_size: config.page_size,
            pagination: config.pagination,
            max_concurrent_downloads: config.max_concurrent_downloads,
            max_concurrent_pages: config.max_concurrent_pages,
            save_metadata: config.save_metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    MissingIdentifier,
    MissingImage,
    Fetch(String),
    Write(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    AlreadyPresent,
    Failed(FailureReason),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl DownloadSummary {
    pub fn record(mut self, outcome: &DownloadOutcome) -> Self {
        match outcome {
            DownloadOutcome::Downloaded => self.downloaded += 1,
            DownloadOutcome::AlreadyPresent => self.already_present += 1,
            DownloadOutcome::Failed(_) => self.failed += 1,
        }
        self
    }

    pub fn total(&self) -> usize {
        self.downloaded + self.already_present + self.failed
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} already present, {} failed",
            self.downloaded, self.already_present, self.failed
        )
    }
}

/// Drops records whose identifier was already listed, keeping the first one.
/// A listing that moves between pages can return the same item twice.
pub fn dedup_by_identifier(nfts: Vec<NftRecord>) -> Vec<NftRecord> {
    let before = nfts.len();
    let mut seen = HashSet::new();
    let nfts: Vec<NftRecord> = nfts
        .into_iter()
        .filter(|nft| match &nft.identifier {
            Some(identifier) => seen.insert(identifier.clone()),
            None => true,
        })
        .collect();

    if nfts.len() < before {
        debug!("Dropped {} duplicated items", before - nfts.len());
    }
    nfts
}

/// HTTP client used for image requests.
pub fn image_client(user_agent: &str, timeout: Duration) -> Result<ReqwestClient, DownloaderError> {
    let mut headers = header::HeaderMap::new();
    let user_agent = header::HeaderValue::from_str(user_agent)
        .map_err(|e| DownloaderError::Config(format!("invalid user agent: {}", e)))?;
    headers.insert(header::USER_AGENT, user_agent);

    Ok(ReqwestClient::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

/// Downloads every image of a collection into a local directory.
///
/// The collection is resolved and fully enumerated before anything is
/// written to disk, so a fatal API error leaves no output behind. Images are
/// then fetched with at most `max_concurrent_downloads` requests in flight,
/// and each task reports its own outcome.
pub struct CollectionDownloader<M: MarketplaceApi> {
    marketplace: M,
    http: ReqwestClient,
    gateways: IpfsGateways,
    options: DownloadOptions,
}

impl<M: MarketplaceApi> CollectionDownloader<M> {
    pub fn new(
        marketplace: M,
        http: ReqwestClient,
        gateways: IpfsGateways,
        options: DownloadOptions,
    ) -> Self {
        Self {
            marketplace,
            http,
            gateways,
            options,
        }
    }

    pub async fn download_collection(
        &self,
        collection: &str,
    ) -> Result<DownloadSummary, DownloaderError> {
        let collection = collection.trim().to_lowercase();

        let info = self.marketplace.fetch_collection(&collection).await?;
        info!(
            "Beginning download of \"{}\" collection ({} items)",
            collection, info.total_supply
        );

        let nfts = self.enumerate(&collection, info.total_supply).await?;
        let nfts = dedup_by_identifier(nfts);
        info!("Found {} items in \"{}\"", nfts.len(), collection);

        let files = LocalFileManager::new(
            &self.options.output_dir,
            &collection,
            &self.options.image_extension,
        );
        files.prepare(self.options.save_metadata).await?;

        let width = padding_width(info.total_supply);
        let summary = stream::iter(nfts.iter())
            .map(|nft| self.acquire(&files, nft, width))
            .buffer_unordered(self.options.max_concurrent_downloads)
            .fold(DownloadSummary::default(), |summary, outcome| async move {
                summary.record(&outcome)
            })
            .await;

        Ok(summary)
    }

    /// Lists every item of the collection, issuing at most
    /// `ceil(total_supply / page_size)` listing requests.
    pub async fn enumerate(
        &self,
        collection: &str,
        total_supply: u64,
    ) -> Result<Vec<NftRecord>, DownloaderError> {
        let pages = page_count(total_supply, self.options.page_size);
        debug!(
            "Listing \"{}\" with up to {} pages of {}",
            collection, pages, self.options.page_size
        );

        match self.options.pagination {
            PaginationMode::Cursor => self.enumerate_with_cursor(collection, pages).await,
            PaginationMode::Offset => self.enumerate_with_offset(collection, pages).await,
        }
    }

    async fn enumerate_with_cursor(
        &self,
        collection: &str,
        pages: u64,
    ) -> Result<Vec<NftRecord>, DownloaderError> {
        let mut nfts = Vec::new();
        let mut cursor: Option<String> = None;

        for page_index in 0..pages {
            let request = PageRequest {
                limit: self.options.page_size,
                offset: None,
                cursor: cursor.take(),
            };
            let page = self.marketplace.fetch_nfts_page(collection, &request).await?;

            let is_empty = page.nfts.is_empty();
            cursor = page.cursor().map(str::to_string);
            nfts.extend(page.nfts);

            if is_empty || cursor.is_none() {
                debug!("Listing ended after page {}", page_index + 1);
                break;
            }
        }

        Ok(nfts)
    }

    async fn enumerate_with_offset(
        &self,
        collection: &str,
        pages: u64,
    ) -> Result<Vec<NftRecord>, DownloaderError> {
        let page_size = self.options.page_size;

        let pages: Vec<NftPage> = stream::iter(0..pages)
            .map(|page_index| {
                let request = PageRequest {
                    limit: page_size,
                    offset: Some(page_index * page_size as u64),
                    cursor: None,
                };
                async move { self.marketplace.fetch_nfts_page(collection, &request).await }
            })
            .buffer_unordered(self.options.max_concurrent_pages)
            .try_collect()
            .await?;

        Ok(pages.into_iter().flat_map(|page| page.nfts).collect())
    }

    async fn acquire(
        &self,
        files: &LocalFileManager,
        nft: &NftRecord,
        width: usize,
    ) -> DownloadOutcome {
        let Some(identifier) = &nft.identifier else {
            warn!("❌ Item without a numeric identifier: {}", nft.raw);
            return DownloadOutcome::Failed(FailureReason::MissingIdentifier);
        };
        let file_stem = identifier.padded(width);

        if self.options.save_metadata {
            let path = files.metadata_path(&file_stem);
            if let Err(e) = files.save_json(&path, &nft.raw).await {
                warn!("Failed to save metadata of item {}: {}", identifier, e);
            }
        }

        let Some(locator) = nft.image_url.as_deref() else {
            warn!("❌ Item {} has no image", identifier);
            return DownloadOutcome::Failed(FailureReason::MissingImage);
        };

        let path = files.image_path(&file_stem);
        if files.exists(&path).await {
            debug!("Item {} already downloaded", identifier);
            return DownloadOutcome::AlreadyPresent;
        }

        let content = match self.fetch_image(locator).await {
            Ok(content) => content,
            Err(e) => {
                warn!("❌ Failed to download item {}: {}", identifier, e);
                return DownloadOutcome::Failed(FailureReason::Fetch(e.to_string()));
            }
        };

        match files.save(&path, &content).await {
            Ok(()) => {
                info!("✅ Item {} saved to {}", identifier, path.display());
                DownloadOutcome::Downloaded
            }
            Err(e) => {
                warn!("❌ Failed to write {}: {}", path.display(), e);
                DownloadOutcome::Failed(FailureReason::Write(e.to_string()))
            }
        }
    }

    /// Tries each candidate URL of `locator` in order until one succeeds.
    async fn fetch_image(&self, locator: &str) -> Result<Vec<u8>, DownloaderError> {
        let mut last_error = None;

        for url in self.gateways.candidate_urls(locator) {
            match self.fetch_bytes(&url).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    debug!("Could not fetch {}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DownloaderError::Config(format!("no URL to fetch for {}", locator))
        }))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloaderError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloaderError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
