//! # tilegrid
//!
//! Viewport-driven tile resolution for slippy-map style tile pyramids.
//!
//! Given a pixel viewport centered on a fractional tile address, the crate
//! works out which tiles have to be shown, substitutes cached ancestor tiles
//! while the exact ones are still loading, and drives an asynchronous fetch
//! pipeline ordered by distance from the viewport center.

pub mod core;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod tiles;

pub use crate::core::config;

// Re-export public API
pub use core::{
    config::{TileLayerConfig, TileLayerProfile},
    geo::{LatLng, Point, TileAddress, TileKey},
    projection::{Equirectangular, Projection, SphericalMercator},
    viewport::Viewport,
};

pub use layers::tile::{Resolution, ResolutionPlan, TileLayer, TilePlacement, ViewportResolver};

pub use tiles::{
    cache::{CacheStats, RequestOutcome, RequestStatus, Subscription, TileCache, TileData, TileEvent},
    prioritizer::RequestPrioritizer,
    provider::{FetchOperation, TileFetcher, TileProvider},
};

#[cfg(feature = "http")]
pub use tiles::provider::UrlTemplateFetcher;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fetch error for tile {key}: {reason}")]
    Fetch { key: TileKey, reason: String },
}

/// Error type alias for convenience
pub type Error = MapError;
