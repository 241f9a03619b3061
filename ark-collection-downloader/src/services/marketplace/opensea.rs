use super::MarketplaceApi;
use crate::interfaces::error::DownloaderError;
use crate::interfaces::nft::{CollectionInfo, NftPage, PageRequest};

use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

const API_KEY_HEADER: &str = "X-API-KEY";

/// `MarketplaceApi` backed by the OpenSea v2 REST API.
pub struct OpenSeaClient {
    client: ReqwestClient,
    base_url: String,
    api_key: Option<String>,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
}

#[async_trait]
impl MarketplaceApi for OpenSeaClient {
    async fn fetch_collection(&self, collection: &str) -> Result<CollectionInfo, DownloaderError> {
        let url = format!("{}/api/v2/collections/{}", self.base_url, collection);
        let info: CollectionInfo = self.get_json(collection, &url, &[]).await?;

        if info.total_supply == 0 {
            return Err(DownloaderError::CollectionNotFound(collection.to_string()));
        }
        Ok(info)
    }

    async fn fetch_nfts_page(
        &self,
        collection: &str,
        request: &PageRequest,
    ) -> Result<NftPage, DownloaderError> {
        let url = format!("{}/api/v2/collection/{}/nfts", self.base_url, collection);

        let mut query = vec![("limit", request.limit.to_string())];
        if let Some(offset) = request.offset {
            query.push(("offset", offset.to_string()));
        }
        if let Some(cursor) = &request.cursor {
            query.push(("next", cursor.clone()));
        }

        let page: NftPage = self.get_json(collection, &url, &query).await?;
        debug!(
            "Fetched {} items of '{}' (offset: {:?}, has next: {})",
            page.nfts.len(),
            collection,
            request.offset,
            page.cursor().is_some()
        );
        Ok(page)
    }
}

impl OpenSeaClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        user_agents: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, DownloaderError> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;
        let user_agents: Vec<String> = user_agents
            .into_iter()
            .filter(|agent| !agent.trim().is_empty())
            .collect();
        if user_agents.is_empty() {
            return Err(DownloaderError::Config(
                "at least one user agent is required".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
            user_agents,
            next_agent: AtomicUsize::new(0),
        })
    }

    /// Round robin over the configured user agents.
    fn next_user_agent(&self) -> &str {
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[index]
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        collection: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, DownloaderError> {
        trace!("GET {} {:?}", url, query);

        let mut request = self
            .client
            .get(url)
            .query(query)
            .header(header::USER_AGENT, self.next_user_agent())
            .header(header::ACCEPT, "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            }
            StatusCode::NOT_FOUND => Err(DownloaderError::CollectionNotFound(
                collection.to_string(),
            )),
            StatusCode::TOO_MANY_REQUESTS => Err(DownloaderError::Throttled(url.to_string())),
            status => Err(DownloaderError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}
