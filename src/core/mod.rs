//! Core data model: coordinates, projections, viewport state and configuration.

pub mod config;
pub mod constants;
pub mod geo;
pub mod projection;
pub mod viewport;
