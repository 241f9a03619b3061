use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Collection summary returned by the marketplace metadata endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_supply: u64,
}

/// Numeric token identifier, kept as decimal digits since token ids
/// are not bounded by `u64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenId(String);

impl TokenId {
    pub fn parse(value: &Value) -> Option<Self> {
        let digits = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.as_u64()?.to_string(),
            _ => return None,
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            Some(TokenId("0".to_string()))
        } else {
            Some(TokenId(trimmed.to_string()))
        }
    }

    /// Left pads the identifier with zeros up to `width` digits.
    pub fn padded(&self, width: usize) -> String {
        format!("{:0>width$}", self.0, width = width)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One collection item as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct NftRecord {
    pub identifier: Option<TokenId>,
    pub image_url: Option<String>,
    pub raw: Value,
}

impl From<Value> for NftRecord {
    fn from(raw: Value) -> Self {
        let identifier = raw.get("identifier").and_then(TokenId::parse);
        let image_url = raw
            .get("image_url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Self {
            identifier,
            image_url,
            raw,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NftPage {
    #[serde(default)]
    pub nfts: Vec<NftRecord>,
    #[serde(default)]
    pub next: Option<String>,
}

impl NftPage {
    /// Continuation token, if the remote side has more items.
    pub fn cursor(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| !next.is_empty())
    }
}

/// Parameters of a single listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: Option<u64>,
    pub cursor: Option<String>,
}

/// Number of digits used to name the files of a collection of `total_supply` items.
pub fn padding_width(total_supply: u64) -> usize {
    total_supply.to_string().len()
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("total_supply is not an unsigned integer")),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
        _ => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pad_identifier_to_collection_width() {
        let id = TokenId::parse(&json!("7")).unwrap();
        assert_eq!(id.padded(padding_width(1000)), "0007");
        assert_eq!(id.padded(padding_width(3)), "7");
    }

    #[test]
    fn test_not_truncate_identifier_longer_than_width() {
        let id = TokenId::parse(&json!(12345)).unwrap();
        assert_eq!(id.padded(3), "12345");
    }

    #[test]
    fn test_normalize_token_identifiers() {
        assert_eq!(TokenId::parse(&json!("007")).unwrap().to_string(), "7");
        assert_eq!(TokenId::parse(&json!("000")).unwrap().to_string(), "0");
        assert_eq!(TokenId::parse(&json!(42)).unwrap().to_string(), "42");
        assert!(TokenId::parse(&json!("0x2a")).is_none());
        assert!(TokenId::parse(&json!("")).is_none());
        assert!(TokenId::parse(&json!(null)).is_none());
        assert!(TokenId::parse(&json!(-1)).is_none());
    }

    #[test]
    fn test_keep_identifiers_beyond_u64() {
        let big = "340282366920938463463374607431768211455";
        let id = TokenId::parse(&json!(big)).unwrap();
        assert_eq!(id.to_string(), big);
    }

    #[test]
    fn test_read_image_url_from_canonical_field_only() {
        let record = NftRecord::from(json!({
            "identifier": "1",
            "image_url": "  ",
            "display_image_url": "https://example.com/1.png"
        }));
        assert_eq!(record.image_url, None);

        let record = NftRecord::from(json!({
            "identifier": "1",
            "image_url": "https://example.com/1.png"
        }));
        assert_eq!(record.image_url.as_deref(), Some("https://example.com/1.png"));
    }

    #[test]
    fn test_deserialize_page_and_keep_raw_records() {
        let page: NftPage = serde_json::from_value(json!({
            "nfts": [
                { "identifier": "0", "image_url": "https://example.com/0.png", "name": "zero" },
                { "identifier": "1" }
            ],
            "next": ""
        }))
        .unwrap();

        assert_eq!(page.nfts.len(), 2);
        assert_eq!(page.nfts[0].raw["name"], "zero");
        assert_eq!(page.nfts[1].image_url, None);
        assert_eq!(page.cursor(), None);
    }

    #[test]
    fn test_accept_total_supply_as_string_or_number() {
        let info: CollectionInfo = serde_json::from_value(json!({ "total_supply": 10 })).unwrap();
        assert_eq!(info.total_supply, 10);
        let info: CollectionInfo =
            serde_json::from_value(json!({ "total_supply": "10000" })).unwrap();
        assert_eq!(info.total_supply, 10000);
        let info: CollectionInfo = serde_json::from_value(json!({ "name": "x" })).unwrap();
        assert_eq!(info.total_supply, 0);
    }
}
