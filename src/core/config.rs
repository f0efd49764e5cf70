//! Configuration for tile scheduling behaviour
//!
//! Settings can be picked from presets through [`TileLayerProfile`] or built
//! by hand, and both round-trip through JSON so an application can keep them
//! in its own settings file.

use crate::core::constants::DEFAULT_MAX_IN_FLIGHT;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TileLayerProfile {
    Balanced,
    LowBandwidth,
    Aggressive,
    Custom(TileLayerConfig),
}

impl TileLayerProfile {
    pub fn resolve(&self) -> TileLayerConfig {
        match self {
            Self::Balanced => TileLayerConfig {
                padding_cols: 1,
                padding_rows: 1,
                max_in_flight: DEFAULT_MAX_IN_FLIGHT,
                cache_capacity: Some(1024),
                request_timeout_ms: 10_000,
            },
            Self::LowBandwidth => TileLayerConfig {
                padding_cols: 0,
                padding_rows: 0,
                max_in_flight: 2,
                cache_capacity: Some(256),
                request_timeout_ms: 30_000,
            },
            Self::Aggressive => TileLayerConfig {
                padding_cols: 2,
                padding_rows: 2,
                max_in_flight: 16,
                cache_capacity: None,
                request_timeout_ms: 5_000,
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for TileLayerProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerConfig {
    /// Extra columns resolved on each side of the visible area
    pub padding_cols: u32,
    /// Extra rows resolved on each side of the visible area
    pub padding_rows: u32,
    /// Fetches allowed to run at once; further requests wait as queued
    pub max_in_flight: usize,
    /// LRU capacity of the tile cache, `None` for unbounded
    pub cache_capacity: Option<usize>,
    /// Per-request timeout used by the HTTP fetcher
    pub request_timeout_ms: u64,
}

impl TileLayerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(MapError::Configuration(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.cache_capacity == Some(0) {
            return Err(MapError::Configuration(
                "cache_capacity must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    /// Configuration for unit tests: no padding, unbounded cache.
    pub fn for_testing() -> Self {
        Self {
            padding_cols: 0,
            padding_rows: 0,
            max_in_flight: 4,
            cache_capacity: None,
            request_timeout_ms: 1_000,
        }
    }
}

impl Default for TileLayerConfig {
    fn default() -> Self {
        TileLayerProfile::default().resolve()
    }
}
