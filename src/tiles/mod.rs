pub mod cache;
pub mod prioritizer;
pub mod provider;

// Re-exports for convenience
pub use cache::{CacheStats, RequestOutcome, RequestStatus, Subscription, TileCache, TileData, TileEvent};
pub use prioritizer::RequestPrioritizer;
pub use provider::{FetchOperation, TileFetcher, TileProvider, TileProviderBuilder};
