//! Core TileLayer implementation

use super::resolver::{Resolution, ViewportResolver};
use crate::{
    core::{
        config::TileLayerConfig,
        geo::{LatLng, Point, TileAddress},
        viewport::Viewport,
    },
    prelude::{Arc, BTreeSet},
    runtime::GlobalSpawner,
    tiles::{
        cache::{Subscription, TileCache, TileData},
        provider::TileProvider,
    },
    MapError, Result,
};

#[cfg(feature = "debug")]
use log;

/// Screen rectangle of one drawable tile, in layer pixels
#[derive(Debug, Clone)]
pub struct TilePlacement {
    pub address: TileAddress,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub data: TileData,
}

/// A tile layer: one provider, one viewport and the cache feeding it.
///
/// View mutations only mark the layer dirty. The drawable set is recomputed
/// lazily when it is read, and also whenever the cache reports that tiles
/// were added or removed since the last read.
pub struct TileLayer {
    id: String,
    config: TileLayerConfig,
    provider: Option<Arc<TileProvider>>,
    viewport: Viewport,
    cache: TileCache,
    subscription: Subscription,
    drawable: BTreeSet<TileAddress>,
    last_resolution: Option<Resolution>,
}

impl TileLayer {
    /// Create a layer without a provider, using a cache sized from `config`.
    pub fn new(id: impl Into<String>, config: TileLayerConfig) -> Result<Self> {
        config.validate()?;
        let cache = TileCache::with_options(
            config.max_in_flight,
            config.cache_capacity,
            Arc::new(GlobalSpawner),
        );
        Ok(Self::with_cache(id, config, cache))
    }

    /// Create a layer around an existing cache.
    ///
    /// The cache may be shared with other layers. The layer requests and
    /// cancels tiles in its own scope, so its resolution passes and its
    /// teardown never withdraw requests made by anyone else.
    pub fn with_cache(id: impl Into<String>, config: TileLayerConfig, cache: TileCache) -> Self {
        let cache = cache.scoped();
        let mut viewport = Viewport::default();
        viewport.set_padding(config.padding_cols, config.padding_rows);
        let subscription = cache.subscribe();
        Self {
            id: id.into(),
            config,
            provider: None,
            viewport,
            cache,
            subscription,
            drawable: BTreeSet::new(),
            last_resolution: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<TileProvider>) -> Self {
        self.set_provider(provider);
        self
    }

    /// Adopt a provider's zoom range and tile size.
    pub fn set_provider(&mut self, provider: Arc<TileProvider>) {
        self.viewport
            .set_zoom_limits(provider.min_zoom() as f64, provider.max_zoom() as f64);
        let size = provider.tile_size();
        self.viewport.set_tile_size(size.x, size.y);
        self.provider = Some(provider);
    }

    /// Attach a provider and fit the view to a `width` x `height` pixel area,
    /// picking the zoom at which the world spans the shorter side.
    pub fn setup(&mut self, provider: Arc<TileProvider>, width: f64, height: f64) {
        self.viewport.resize(width, height);
        let size = provider.tile_size();
        let scale = width.min(height) / size.x.min(size.y);
        let zoom = provider.clamp_zoom(provider.zoom_for_scale(scale));
        self.set_provider(provider);
        self.viewport
            .set_center(TileAddress::default().rebase_to_zoom(zoom));

        #[cfg(feature = "debug")]
        log::debug!(
            "tile layer '{}' set up at {}x{} zoom {:.2}",
            self.id,
            width,
            height,
            self.viewport.zoom()
        );
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &TileLayerConfig {
        &self.config
    }

    pub fn provider(&self) -> Option<&Arc<TileProvider>> {
        self.provider.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Result of the most recent resolution pass, if any.
    pub fn last_resolution(&self) -> Option<&Resolution> {
        self.last_resolution.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.viewport.is_dirty() || !self.subscription.receiver().is_empty()
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_by(&mut self, delta: f64, anchor: Option<Point>) {
        self.viewport.zoom_by(delta, anchor);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
    }

    pub fn set_center(&mut self, center: TileAddress) {
        self.viewport.set_center(center);
    }

    pub fn set_padding(&mut self, padding_cols: u32, padding_rows: u32) {
        self.viewport.set_padding(padding_cols, padding_rows);
    }

    /// Center the view on a geographic coordinate.
    pub fn recenter(&mut self, coordinate: LatLng, zoom: f64) -> Result<()> {
        let provider = self.require_provider()?;
        self.viewport.recenter(&provider, coordinate, zoom);
        Ok(())
    }

    pub fn layer_point_to_tile_address(&self, point: Point) -> TileAddress {
        self.viewport.layer_point_to_tile_address(point)
    }

    /// Tiles to draw for the current view, re-resolving first if the view or
    /// the cache changed since the last call.
    pub fn drawable(&mut self) -> Result<&BTreeSet<TileAddress>> {
        let provider = self.require_provider()?;

        if !self.subscription.drain().is_empty() {
            self.viewport.mark_dirty();
        }
        if self.viewport.take_dirty() {
            let resolution = ViewportResolver::resolve(&self.viewport, &provider, &self.cache);
            self.drawable = resolution.drawable.clone();
            self.last_resolution = Some(resolution);
        }

        Ok(&self.drawable)
    }

    /// Screen placement of every drawable tile, coarse to fine so finer tiles
    /// paint over the ancestors standing in for them.
    ///
    /// Tiles evicted since resolution are skipped.
    pub fn placements(&mut self) -> Result<Vec<TilePlacement>> {
        self.drawable()?;

        let tile_size = self.viewport.tile_size();
        let zoom = self.viewport.zoom();
        let placements = self
            .drawable
            .iter()
            .filter_map(|address| {
                let data = self.cache.lookup(*address)?;
                let scale = 2_f64.powf(zoom - address.zoom);
                let origin = self.viewport.tile_address_to_layer_point(address);
                Some(TilePlacement {
                    address: *address,
                    x: origin.x,
                    y: origin.y,
                    width: tile_size.x * scale,
                    height: tile_size.y * scale,
                    data,
                })
            })
            .collect();

        Ok(placements)
    }

    /// Drop all pending requests and wait for running fetches to finish.
    ///
    /// Blocks the calling thread.
    pub fn shutdown(&self) {
        let _cancelled = self.cache.cancel_all();
        self.cache.join_all();

        #[cfg(feature = "debug")]
        log::debug!(
            "tile layer '{}' shut down, {} queued requests dropped",
            self.id,
            _cancelled
        );
    }

    fn require_provider(&self) -> Result<Arc<TileProvider>> {
        self.provider.clone().ok_or_else(|| {
            MapError::Configuration(format!("tile layer '{}' has no provider", self.id))
        })
    }
}

impl Drop for TileLayer {
    fn drop(&mut self) {
        self.cache.cancel_all();
        self.cache.unsubscribe(self.subscription.id());
    }
}

impl std::fmt::Debug for TileLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLayer")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("viewport", &self.viewport)
            .field("drawable", &self.drawable.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileKey;
    use crate::runtime::spawners::ThreadSpawner;
    use crate::tiles::cache::RequestStatus;
    use crate::tiles::provider::TileFetcher;
    use async_trait::async_trait;
    use std::time::Duration;

    struct ByteFetcher;

    #[async_trait]
    impl TileFetcher for ByteFetcher {
        async fn fetch(&self, key: TileKey) -> Result<Vec<u8>> {
            Ok(vec![key.zoom])
        }
    }

    fn provider() -> Arc<TileProvider> {
        Arc::new(
            TileProvider::builder(Arc::new(ByteFetcher))
                .with_zoom_range(0, 6)
                .build()
                .unwrap(),
        )
    }

    fn layer() -> TileLayer {
        let cache = TileCache::with_options(4, None, Arc::new(ThreadSpawner));
        TileLayer::with_cache("test", TileLayerConfig::for_testing(), cache)
    }

    #[test]
    fn test_missing_provider_is_configuration_error() {
        let mut layer = layer();
        assert!(matches!(layer.drawable(), Err(MapError::Configuration(_))));
        assert!(matches!(
            layer.recenter(LatLng::new(0.0, 0.0), 3.0),
            Err(MapError::Configuration(_))
        ));
    }

    #[test]
    fn test_setup_picks_zoom_from_size() {
        let mut layer = layer();
        layer.setup(provider(), 1024.0, 512.0);
        // The shorter side spans two tiles: zoom 1.
        assert!((layer.viewport().zoom() - 1.0).abs() < 1e-9);
        let center = layer.viewport().center();
        assert!((center.column - 1.0).abs() < 1e-9);
        assert!((center.row - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_is_lazy() {
        let mut layer = layer();
        layer.setup(provider(), 256.0, 256.0);
        assert!(layer.last_resolution().is_none());

        layer.drawable().unwrap();
        assert!(layer.last_resolution().is_some());
        layer.shutdown();
    }

    #[test]
    fn test_completed_fetches_become_placements() {
        let mut layer = layer();
        layer.setup(provider(), 256.0, 256.0);
        assert!(layer.placements().unwrap().is_empty());

        layer.shutdown();
        let placements = layer.placements().unwrap();
        assert_eq!(placements.len(), 1);
        let placement = &placements[0];
        assert_eq!(placement.address, TileAddress::new(0.0, 0.0, 0.0));
        assert_eq!((placement.x, placement.y), (0.0, 0.0));
        assert_eq!((placement.width, placement.height), (256.0, 256.0));
        assert_eq!(*placement.data, vec![0]);
    }

    #[test]
    fn test_ancestor_placement_is_scaled() {
        let cache = TileCache::with_options(1, None, Arc::new(ThreadSpawner));
        cache.insert(TileKey::new(0, 0, 0), vec![0]);
        let mut layer = TileLayer::with_cache("scaled", TileLayerConfig::for_testing(), cache);
        layer.set_provider(provider());
        layer.resize(256.0, 256.0);
        layer.set_center(TileAddress::new(1.5, 1.5, 1.0));

        let placements = layer.placements().unwrap();
        let root = placements
            .iter()
            .find(|p| p.address == TileAddress::new(0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!((root.width, root.height), (512.0, 512.0));
        assert_eq!((root.x, root.y), (-256.0, -256.0));
        layer.shutdown();
    }

    #[test]
    fn test_dropping_layer_keeps_shared_requests() {
        let cache = TileCache::with_options(1, None, Arc::new(ThreadSpawner));
        let running = TileKey::new(3, 0, 0);
        let waiting = TileKey::new(3, 1, 0);
        cache.request_fetch(running, Box::pin(futures::future::pending::<Result<Vec<u8>>>()));
        cache.request_fetch(waiting, Box::pin(futures::future::pending::<Result<Vec<u8>>>()));

        let mut other =
            TileLayer::with_cache("other", TileLayerConfig::for_testing(), cache.clone());
        other.setup(provider(), 256.0, 256.0);
        other.drawable().unwrap();
        drop(other);

        assert_eq!(cache.request_status(running), Some(RequestStatus::InFlight));
        assert_eq!(cache.request_status(waiting), Some(RequestStatus::Queued));
        cache.cancel_all();
    }

    #[test]
    fn test_cache_events_mark_layer_dirty() {
        let mut layer = layer();
        layer.setup(provider(), 256.0, 256.0);
        layer.drawable().unwrap();
        layer.shutdown();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !layer.is_dirty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(layer.is_dirty());
        assert_eq!(layer.drawable().unwrap().len(), 1);
    }
}
