//! Tile providers: the fixed geometry of a tile source plus the boundary
//! through which its imagery is fetched.

use crate::core::constants::{DEFAULT_MAX_ZOOM, MAX_SUPPORTED_ZOOM, TILE_SIZE};
use crate::core::geo::{LatLng, Point, TileAddress, TileKey};
use crate::core::projection::{Projection, SphericalMercator};
use crate::prelude::{Arc, BoxFuture};
use crate::{MapError, Result};
use async_trait::async_trait;
use std::fmt;

/// Deferred fetch of one tile. Nothing happens until the future is polled,
/// so building one for an address that turns out to be cached costs nothing.
pub type FetchOperation = BoxFuture<'static, Result<Vec<u8>>>;

/// Transport used to retrieve tile imagery.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, key: TileKey) -> Result<Vec<u8>>;
}

/// Describes a tile source: supported zoom range, tile pixel size,
/// projection and attribution. Immutable once built.
pub struct TileProvider {
    min_zoom: u8,
    max_zoom: u8,
    tile_width: u32,
    tile_height: u32,
    projection: Box<dyn Projection>,
    attribution: String,
    fetcher: Arc<dyn TileFetcher>,
}

impl TileProvider {
    /// Create a provider, rejecting an inverted zoom range or empty tiles.
    pub fn new(
        min_zoom: u8,
        max_zoom: u8,
        tile_width: u32,
        tile_height: u32,
        projection: Box<dyn Projection>,
        attribution: impl Into<String>,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Result<Self> {
        if min_zoom > max_zoom {
            return Err(MapError::Configuration(format!(
                "min_zoom {} is greater than max_zoom {}",
                min_zoom, max_zoom
            )));
        }
        if max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(MapError::Configuration(format!(
                "max_zoom {} exceeds the supported maximum {}",
                max_zoom, MAX_SUPPORTED_ZOOM
            )));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(MapError::Configuration(format!(
                "tile size {}x{} must be positive",
                tile_width, tile_height
            )));
        }

        Ok(Self {
            min_zoom,
            max_zoom,
            tile_width,
            tile_height,
            projection,
            attribution: attribution.into(),
            fetcher,
        })
    }

    /// Start a builder with web-map defaults around `fetcher`.
    pub fn builder(fetcher: Arc<dyn TileFetcher>) -> TileProviderBuilder {
        TileProviderBuilder::new(fetcher)
    }

    /// OpenStreetMap's public raster tiles.
    #[cfg(feature = "http")]
    pub fn openstreetmap() -> Result<Self> {
        let fetcher = UrlTemplateFetcher::new("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")
            .with_subdomains(["a", "b", "c"]);
        Self::builder(Arc::new(fetcher))
            .with_attribution("© OpenStreetMap contributors")
            .build()
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn tile_size(&self) -> Point {
        Point::new(self.tile_width as f64, self.tile_height as f64)
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    pub fn projection(&self) -> &dyn Projection {
        self.projection.as_ref()
    }

    /// Fractional zoom at which one world unit spans `scale` tiles.
    pub fn zoom_for_scale(&self, scale: f64) -> f64 {
        scale.log2()
    }

    /// Clamp a zoom level into the provider's supported range.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.min_zoom as f64;
        }
        zoom.clamp(self.min_zoom as f64, self.max_zoom as f64)
    }

    /// Address of `coordinate` at zoom 0.
    pub fn geo_to_tile(&self, coordinate: LatLng) -> TileAddress {
        TileAddress::new(0.0, 0.0, 0.0).from_geo_with(self.projection(), coordinate)
    }

    pub fn tile_to_geo(&self, address: &TileAddress) -> LatLng {
        address.to_geo_with(self.projection())
    }

    /// Deferred fetch of the tile containing `address`.
    pub fn fetch(&self, address: &TileAddress) -> FetchOperation {
        let key = address.key();
        let fetcher = self.fetcher.clone();
        Box::pin(async move { fetcher.fetch(key).await })
    }
}

impl fmt::Debug for TileProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileProvider")
            .field("min_zoom", &self.min_zoom)
            .field("max_zoom", &self.max_zoom)
            .field("tile_width", &self.tile_width)
            .field("tile_height", &self.tile_height)
            .field("projection", &self.projection.name())
            .field("attribution", &self.attribution)
            .finish()
    }
}

/// Builder for [`TileProvider`]
pub struct TileProviderBuilder {
    min_zoom: u8,
    max_zoom: u8,
    tile_width: u32,
    tile_height: u32,
    projection: Box<dyn Projection>,
    attribution: String,
    fetcher: Arc<dyn TileFetcher>,
}

impl TileProviderBuilder {
    pub fn new(fetcher: Arc<dyn TileFetcher>) -> Self {
        Self {
            min_zoom: 0,
            max_zoom: DEFAULT_MAX_ZOOM,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            projection: Box::new(SphericalMercator),
            attribution: String::new(),
            fetcher,
        }
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_projection(mut self, projection: impl Projection + 'static) -> Self {
        self.projection = Box::new(projection);
        self
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn build(self) -> Result<TileProvider> {
        TileProvider::new(
            self.min_zoom,
            self.max_zoom,
            self.tile_width,
            self.tile_height,
            self.projection,
            self.attribution,
            self.fetcher,
        )
    }
}

#[cfg(feature = "http")]
pub use http::UrlTemplateFetcher;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use once_cell::sync::Lazy;

    /// Shared async HTTP client for tile fetching
    static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        reqwest::Client::builder()
            .user_agent(concat!("tilegrid/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(16)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    });

    /// Fetches tiles from a `{z}/{x}/{y}` URL template.
    ///
    /// `{s}` is replaced by one of the configured subdomains, picked from the
    /// tile position so the same tile always hits the same host.
    #[derive(Debug, Clone)]
    pub struct UrlTemplateFetcher {
        template: String,
        subdomains: Vec<String>,
        timeout: std::time::Duration,
    }

    impl UrlTemplateFetcher {
        pub fn new(template: impl Into<String>) -> Self {
            Self {
                template: template.into(),
                subdomains: Vec::new(),
                timeout: std::time::Duration::from_secs(10),
            }
        }

        pub fn with_subdomains<I, S>(mut self, subdomains: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.subdomains = subdomains.into_iter().map(Into::into).collect();
            self
        }

        pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
            self.timeout = timeout;
            self
        }

        pub fn url(&self, key: TileKey) -> String {
            let mut url = self
                .template
                .replace("{z}", &key.zoom.to_string())
                .replace("{x}", &key.column.to_string())
                .replace("{y}", &key.row.to_string());

            if !self.subdomains.is_empty() {
                let idx = ((key.column as usize) + (key.row as usize)) % self.subdomains.len();
                url = url.replace("{s}", &self.subdomains[idx]);
            }
            url
        }
    }

    #[async_trait]
    impl TileFetcher for UrlTemplateFetcher {
        async fn fetch(&self, key: TileKey) -> Result<Vec<u8>> {
            let response = HTTP_CLIENT
                .get(self.url(key))
                .timeout(self.timeout)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(MapError::Fetch {
                    key,
                    reason: format!("HTTP {}", response.status()),
                });
            }

            Ok(response.bytes().await?.to_vec())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_url_template_with_subdomains() {
            let fetcher = UrlTemplateFetcher::new("https://{s}.example.com/{z}/{x}/{y}.png")
                .with_subdomains(["a", "b", "c"]);
            assert_eq!(
                fetcher.url(TileKey::new(3, 4, 1)),
                "https://c.example.com/3/4/1.png"
            );
        }

        #[test]
        fn test_url_template_without_subdomains() {
            let fetcher = UrlTemplateFetcher::new("file:///tiles/{z}/{x}/{y}.png");
            assert_eq!(fetcher.url(TileKey::new(0, 0, 0)), "file:///tiles/0/0/0.png");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::Equirectangular;

    struct EchoFetcher;

    #[async_trait]
    impl TileFetcher for EchoFetcher {
        async fn fetch(&self, key: TileKey) -> Result<Vec<u8>> {
            Ok(vec![key.zoom, key.column as u8, key.row as u8])
        }
    }

    fn provider() -> TileProvider {
        TileProvider::builder(Arc::new(EchoFetcher))
            .with_attribution("test")
            .build()
            .unwrap()
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let inverted = TileProvider::builder(Arc::new(EchoFetcher))
            .with_zoom_range(5, 2)
            .build();
        assert!(matches!(inverted, Err(MapError::Configuration(_))));

        let empty = TileProvider::builder(Arc::new(EchoFetcher))
            .with_tile_size(0, 256)
            .build();
        assert!(matches!(empty, Err(MapError::Configuration(_))));
    }

    #[test]
    fn test_accessors() {
        let provider = provider();
        assert_eq!(provider.min_zoom(), 0);
        assert_eq!(provider.max_zoom(), DEFAULT_MAX_ZOOM);
        assert_eq!(provider.tile_size(), Point::new(256.0, 256.0));
        assert_eq!(provider.attribution(), "test");
        assert_eq!(provider.projection().name(), "EPSG:3857");
    }

    #[test]
    fn test_zoom_for_scale() {
        let provider = provider();
        assert!((provider.zoom_for_scale(4.0) - 2.0).abs() < 1e-12);
        assert!((provider.zoom_for_scale(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_geo_round_trip() {
        let provider = provider();
        for coordinate in [
            LatLng::new(51.5074, -0.1278),
            LatLng::new(-41.2865, 174.7762),
            LatLng::new(0.0, 0.0),
        ] {
            let tile = provider.geo_to_tile(coordinate);
            assert_eq!(tile.zoom, 0.0);
            let back = provider.tile_to_geo(&tile);
            assert!((back.lat - coordinate.lat).abs() < 1e-9);
            assert!((back.lng - coordinate.lng).abs() < 1e-9);

            // Round trip holds at any zoom.
            let deep = tile.rebase_to_zoom(12.0);
            let back = provider.tile_to_geo(&deep);
            assert!((back.lat - coordinate.lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_custom_projection() {
        let provider = TileProvider::builder(Arc::new(EchoFetcher))
            .with_projection(Equirectangular)
            .build()
            .unwrap();
        let tile = provider.geo_to_tile(LatLng::new(0.0, 0.0));
        assert!((tile.row - 0.5).abs() < 1e-12);
        assert!((tile.column - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fetch_operation_uses_floored_key() {
        let provider = provider();
        let data = futures::executor::block_on(provider.fetch(&TileAddress::new(1.7, 2.2, 2.0)))
            .unwrap();
        assert_eq!(data, vec![2, 2, 1]);
    }
}
