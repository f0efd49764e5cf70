//! Core constants derived from common web-map conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Latitude limit of the spherical Mercator projection (EPSG:3857).
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_8;

/// Highest zoom level served by the common public tile servers.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Zoom levels are stored in a `u8`; anything above this cannot be keyed.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Concurrent fetches per cache when no configuration is given.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 6;
