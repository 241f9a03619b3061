use crate::interfaces::error::DownloaderError;
use url::Url;

const IPFS_SCHEME: &str = "ipfs://";

/// Ordered list of IPFS HTTP gateways, each given as a base URI ending
/// with `/ipfs/` (e.g. `https://ipfs.io/ipfs/`).
#[derive(Debug, Clone)]
pub struct IpfsGateways {
    canonical: Url,
    fallbacks: Vec<Url>,
}

impl IpfsGateways {
    pub fn new(canonical: &str, fallbacks: &[String]) -> Result<Self, DownloaderError> {
        let canonical = parse_gateway(canonical)?;
        let fallbacks = fallbacks
            .iter()
            .filter(|gateway| !gateway.trim().is_empty())
            .map(|gateway| parse_gateway(gateway))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            canonical,
            fallbacks,
        })
    }

    /// Content path (`<cid>[/<path>]`) of a locator, when it is an `ipfs://`
    /// URI or points at the canonical gateway. The scheme is ignored when
    /// matching the gateway, host and port are not.
    pub fn content_path(&self, locator: &str) -> Option<String> {
        let locator = locator.trim();
        if let Some(path) = strip_ipfs_scheme(locator) {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            return Some(path.to_string()).filter(|path| !path.is_empty());
        }

        let url = Url::parse(locator).ok()?;
        if !matches!(url.scheme(), "http" | "https")
            || url.host_str() != self.canonical.host_str()
            || url.port() != self.canonical.port()
        {
            return None;
        }

        let path = url.path().strip_prefix(self.canonical.path())?;
        let mut content = path.to_string();
        if let Some(query) = url.query() {
            content.push('?');
            content.push_str(query);
        }
        Some(content).filter(|content| !content.is_empty())
    }

    /// URLs to try, in order, to fetch `locator`.
    ///
    /// IPFS locators are served by the canonical gateway first, then by each
    /// fallback. Any other locator is fetched as is.
    pub fn candidate_urls(&self, locator: &str) -> Vec<String> {
        let Some(path) = self.content_path(locator) else {
            return vec![locator.to_string()];
        };

        let first = if strip_ipfs_scheme(locator.trim()).is_some() {
            gateway_url(&self.canonical, &path)
        } else {
            locator.trim().to_string()
        };

        let mut urls = vec![first];
        for gateway in &self.fallbacks {
            let url = gateway_url(gateway, &path);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

/// Parses a gateway base URI, making sure its path ends with `/`.
pub fn parse_gateway(gateway: &str) -> Result<Url, DownloaderError> {
    let gateway = gateway.trim();
    if gateway.is_empty() {
        return Err(DownloaderError::Config(
            "IPFS gateway URI must not be empty".to_string(),
        ));
    }

    let mut url = Url::parse(gateway).map_err(|e| {
        DownloaderError::Config(format!("invalid IPFS gateway '{}': {}", gateway, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DownloaderError::Config(format!(
            "IPFS gateway '{}' must be an http(s) URL",
            gateway
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn strip_ipfs_scheme(locator: &str) -> Option<&str> {
    let scheme = locator.get(..IPFS_SCHEME.len())?;
    if scheme.eq_ignore_ascii_case(IPFS_SCHEME) {
        locator.get(IPFS_SCHEME.len()..)
    } else {
        None
    }
}

fn gateway_url(gateway: &Url, content_path: &str) -> String {
    format!("{}{}", gateway.as_str(), content_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateways() -> IpfsGateways {
        IpfsGateways::new(
            "https://ipfs.io/ipfs/",
            &[
                "https://cloudflare-ipfs.com/ipfs".to_string(),
                "https://dweb.link/ipfs/".to_string(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ipfs_scheme_tries_canonical_then_fallbacks() {
        let urls = gateways().candidate_urls("ipfs://QmHash/1.png");
        assert_eq!(
            urls,
            vec![
                "https://ipfs.io/ipfs/QmHash/1.png",
                "https://cloudflare-ipfs.com/ipfs/QmHash/1.png",
                "https://dweb.link/ipfs/QmHash/1.png",
            ]
        );
    }

    #[test]
    fn test_ipfs_scheme_duplicated_prefix() {
        let urls = gateways().candidate_urls("ipfs://ipfs/QmHash");
        assert_eq!(urls[0], "https://ipfs.io/ipfs/QmHash");
    }

    #[test]
    fn test_canonical_locator_stays_first() {
        let urls = gateways().candidate_urls("http://ipfs.io/ipfs/QmHash/7.png");
        assert_eq!(urls[0], "http://ipfs.io/ipfs/QmHash/7.png");
        assert_eq!(urls[1], "https://cloudflare-ipfs.com/ipfs/QmHash/7.png");
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn test_canonical_host_is_case_insensitive() {
        let urls = gateways().candidate_urls("https://IPFS.io/ipfs/QmHash/1.png");
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[1], "https://cloudflare-ipfs.com/ipfs/QmHash/1.png");
    }

    #[test]
    fn test_canonical_with_explicit_default_port() {
        let urls = gateways().candidate_urls("https://ipfs.io:443/ipfs/QmHash/1.png");
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[2], "https://dweb.link/ipfs/QmHash/1.png");
    }

    #[test]
    fn test_other_port_is_not_canonical() {
        let urls = gateways().candidate_urls("https://ipfs.io:8080/ipfs/QmHash/1.png");
        assert_eq!(urls, vec!["https://ipfs.io:8080/ipfs/QmHash/1.png"]);
    }

    #[test]
    fn test_other_locators_are_fetched_directly() {
        let urls = gateways().candidate_urls("https://i.seadn.io/gcs/files/abc.png");
        assert_eq!(urls, vec!["https://i.seadn.io/gcs/files/abc.png"]);

        let urls = gateways().candidate_urls("https://gateway.pinata.cloud/ipfs/QmHash");
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_empty_canonical_gateway_is_rejected() {
        let result = IpfsGateways::new("", &["https://dweb.link/ipfs/".to_string()]);
        assert!(matches!(result, Err(DownloaderError::Config(_))));

        assert!(parse_gateway("   ").is_err());
        assert!(parse_gateway("not a url").is_err());
        assert!(parse_gateway("ftp://ipfs.io/ipfs/").is_err());
    }

    #[test]
    fn test_canonical_gateway_not_repeated_in_fallbacks() {
        let gateways = IpfsGateways::new(
            "https://ipfs.io/ipfs/",
            &[
                "https://ipfs.io/ipfs/".to_string(),
                "https://dweb.link/ipfs/".to_string(),
            ],
        )
        .unwrap();
        let urls = gateways.candidate_urls("ipfs://QmHash");
        assert_eq!(
            urls,
            vec!["https://ipfs.io/ipfs/QmHash", "https://dweb.link/ipfs/QmHash"]
        );
    }

    #[test]
    fn test_empty_ipfs_locator() {
        assert_eq!(gateways().content_path("ipfs://"), None);
        assert_eq!(gateways().candidate_urls("ipfs://"), vec!["ipfs://"]);
    }
}
