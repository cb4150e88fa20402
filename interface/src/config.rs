use crate::common::ss58format::Ss58AddressFormat;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Per chain settings of a [`Client`](crate::Client).
///
/// ```
/// use tessera::config::ChainConfig;
///
/// let config = ChainConfig::from_json(r#"{ "ss58_prefix": 0, "mortality_period": 64 }"#).unwrap();
/// assert_eq!(config.ss58_prefix, 0);
/// assert_eq!(config.storage_page_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub ss58_prefix: u16,
    /// Number of blocks a transaction stays valid for. `None` creates
    /// immortal transactions.
    pub mortality_period: Option<u64>,
    pub default_tip: u128,
    /// Number of keys requested per `state_getKeysPaged` call.
    pub storage_page_size: u32,
    pub extrinsic_version: u8,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            ss58_prefix: Ss58AddressFormat::SUBSTRATE.prefix(),
            mortality_period: Some(64),
            default_tip: 0,
            storage_page_size: 100,
            extrinsic_version: 4,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
    pub fn ss58_format(&self) -> Ss58AddressFormat {
        self.ss58_prefix.into()
    }
}
