pub mod tile;

pub use tile::{TileLayer, TilePlacement, ViewportResolver};
