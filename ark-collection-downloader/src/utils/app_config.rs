use crate::interfaces::error::DownloaderError;
use crate::services::ipfs::IpfsGateways;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

// DEFAULT CONFIGURATION WHEN NO CONFIG FILE IS PASSED
const API_BASE_URL: &str = "https://api.opensea.io";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 12_2_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36";
/// Maximum page size accepted by the listing endpoint.
pub const MAX_PAGE_SIZE: u32 = 200;
const OUTPUT_DIR: &str = "images";
const IMAGE_EXTENSION: &str = "png";
const MAX_CONCURRENT_DOWNLOADS: usize = 16;
const MAX_CONCURRENT_PAGES: usize = 4;
const REQUEST_TIMEOUT_IN_SEC: u64 = 30;
const IPFS_GATEWAY_URI: &str = "https://ipfs.io/ipfs/";
const IPFS_FALLBACK_GATEWAYS: [&str; 4] = [
    "https://cloudflare-ipfs.com/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
    "https://dweb.link/ipfs/",
    "https://nftstorage.link/ipfs/",
];
const RUST_LOG: &str = "info";

pub const ENV_PREFIX: &str = "ARK_DOWNLOADER";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Follow the `next` token returned by each page.
    #[default]
    Cursor,
    /// Issue every `offset` request up front.
    Offset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub pagination: PaginationMode,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
    #[serde(default)]
    pub save_metadata: bool,
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    #[serde(default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: usize,
    #[serde(default = "default_request_timeout_in_sec")]
    pub request_timeout_in_sec: u64,
    #[serde(default = "default_ipfs_gateway_uri")]
    pub ipfs_gateway_uri: String,
    #[serde(default = "default_ipfs_fallback_gateways")]
    pub ipfs_fallback_gateways: Vec<String>,
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            user_agents: default_user_agents(),
            page_size: default_page_size(),
            pagination: PaginationMode::default(),
            output_dir: default_output_dir(),
            image_extension: default_image_extension(),
            save_metadata: false,
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_concurrent_pages: default_max_concurrent_pages(),
            request_timeout_in_sec: default_request_timeout_in_sec(),
            ipfs_gateway_uri: default_ipfs_gateway_uri(),
            ipfs_fallback_gateways: default_ipfs_fallback_gateways(),
            rust_log: default_rust_log(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from an optional YAML file, then from
    /// `ARK_DOWNLOADER_*` environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self, DownloaderError> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DownloaderError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(DownloaderError::Config(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.max_concurrent_downloads == 0 || self.max_concurrent_pages == 0 {
            return Err(DownloaderError::Config(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.primary_user_agent().is_none() {
            return Err(DownloaderError::Config(
                "at least one user agent is required".to_string(),
            ));
        }
        if self.image_extension.trim().is_empty() {
            return Err(DownloaderError::Config(
                "image_extension must not be empty".to_string(),
            ));
        }
        IpfsGateways::new(&self.ipfs_gateway_uri, &self.ipfs_fallback_gateways)?;
        Ok(())
    }

    /// First non blank user agent of the pool.
    pub fn primary_user_agent(&self) -> Option<&str> {
        self.user_agents
            .iter()
            .map(|agent| agent.trim())
            .find(|agent| !agent.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_in_sec)
    }
}

pub fn default_api_base_url() -> String {
    API_BASE_URL.to_owned()
}

pub fn default_user_agents() -> Vec<String> {
    vec![USER_AGENT.to_owned()]
}

pub fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

pub fn default_output_dir() -> String {
    OUTPUT_DIR.to_owned()
}

pub fn default_image_extension() -> String {
    IMAGE_EXTENSION.to_owned()
}

pub fn default_max_concurrent_downloads() -> usize {
    MAX_CONCURRENT_DOWNLOADS
}

pub fn default_max_concurrent_pages() -> usize {
    MAX_CONCURRENT_PAGES
}

pub fn default_request_timeout_in_sec() -> u64 {
    REQUEST_TIMEOUT_IN_SEC
}

pub fn default_ipfs_gateway_uri() -> String {
    IPFS_GATEWAY_URI.to_owned()
}

pub fn default_ipfs_fallback_gateways() -> Vec<String> {
    IPFS_FALLBACK_GATEWAYS
        .iter()
        .map(|gateway| gateway.to_string())
        .collect()
}

pub fn default_rust_log() -> String {
    RUST_LOG.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_fill_defaults_for_missing_keys() {
        let file = yaml_file("api_key: \"secret\"\n");
        let config = AppConfig::load(file.path().to_str()).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.page_size, 200);
        assert_eq!(config.pagination, PaginationMode::Cursor);
        assert_eq!(config.output_dir, "images");
        assert_eq!(config.image_extension, "png");
        assert_eq!(config.ipfs_gateway_uri, "https://ipfs.io/ipfs/");
        assert_eq!(config.ipfs_fallback_gateways.len(), 4);
        assert!(!config.save_metadata);
    }

    #[test]
    fn test_read_overrides_from_yaml() {
        let file = yaml_file(
            "page_size: 50\npagination: offset\nsave_metadata: true\nmax_concurrent_downloads: 2\nipfs_fallback_gateways:\n  - \"https://mirror.example/ipfs/\"\n",
        );
        let config = AppConfig::load(file.path().to_str()).unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.pagination, PaginationMode::Offset);
        assert!(config.save_metadata);
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(
            config.ipfs_fallback_gateways,
            vec!["https://mirror.example/ipfs/".to_string()]
        );
    }

    #[test]
    fn test_reject_page_size_above_api_maximum() {
        let file = yaml_file("page_size: 500\n");
        match AppConfig::load(file.path().to_str()) {
            Err(DownloaderError::Config(message)) => assert!(message.contains("page_size")),
            other => panic!("Expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_reject_empty_ipfs_gateway() {
        let file = yaml_file("ipfs_gateway_uri: \"\"\n");
        match AppConfig::load(file.path().to_str()) {
            Err(DownloaderError::Config(message)) => assert!(message.contains("IPFS gateway")),
            other => panic!("Expected a configuration error, got {:?}", other),
        }

        let config = AppConfig {
            ipfs_gateway_uri: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_primary_user_agent_skips_blank_entries() {
        let config = AppConfig {
            user_agents: vec!["".to_string(), "  ".to_string(), "agent-b".to_string()],
            ..AppConfig::default()
        };
        assert_eq!(config.primary_user_agent(), Some("agent-b"));
        assert!(config.validate().is_ok());

        let config = AppConfig {
            user_agents: vec![" ".to_string()],
            ..AppConfig::default()
        };
        assert_eq!(config.primary_user_agent(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_concurrency() {
        let config = AppConfig {
            max_concurrent_downloads: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
