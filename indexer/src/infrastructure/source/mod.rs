pub mod client;
pub mod error;

pub use client::HttpBlockSource;
pub use error::SourceError;

use async_trait::async_trait;

use crate::domain::models::RawHeight;
use crate::domain::types::Height;

/// Where raw chain data comes from
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Highest height the source can serve
    async fn chain_head(&self) -> Result<Height, SourceError>;

    /// Block, validators, events and extrinsics of `height`
    async fn get_height(&self, height: Height) -> Result<RawHeight, SourceError>;
}
