pub mod opensea;

use crate::interfaces::error::DownloaderError;
use crate::interfaces::nft::{CollectionInfo, NftPage, PageRequest};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Read access to the marketplace REST API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketplaceApi {
    async fn fetch_collection(&self, collection: &str) -> Result<CollectionInfo, DownloaderError>;

    async fn fetch_nfts_page(
        &self,
        collection: &str,
        request: &PageRequest,
    ) -> Result<NftPage, DownloaderError>;
}

/// Number of listing requests needed to cover `total` items.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64)
}
