pub mod error;
pub mod nft;
