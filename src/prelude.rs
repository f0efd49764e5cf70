//! Prelude module for common tilegrid types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tilegrid::prelude::*;`

pub use crate::core::{
    config::{TileLayerConfig, TileLayerProfile},
    geo::{LatLng, Point, TileAddress, TileKey},
    projection::{Equirectangular, Projection, SphericalMercator},
    viewport::Viewport,
};

pub use crate::layers::tile::{Resolution, ResolutionPlan, TileLayer, TilePlacement, ViewportResolver};

pub use crate::tiles::{
    cache::{CacheStats, RequestOutcome, Subscription, TileCache, TileData, TileEvent},
    prioritizer::RequestPrioritizer,
    provider::{FetchOperation, TileFetcher, TileProvider},
};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::{Error as MapError, Result};

pub use std::{
    cmp::Ordering,
    collections::{BTreeSet, VecDeque},
    pin::Pin,
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::future::BoxFuture;
pub use futures::Future;
