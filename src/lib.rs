//! Synthetic optical tract profiles and their complexity metrics.

pub mod analysis;
pub mod complexity;
pub mod config;
pub mod engine;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod numeric;
pub mod report;
pub mod spline;
pub mod stats;
pub mod synth;
