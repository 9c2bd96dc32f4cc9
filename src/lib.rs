//! medv_serve: a single-model inference service for median home values.
//!
//! The service loads two frozen artifacts at startup, a standardization
//! scaler and a gradient-boosted regression ensemble, and serves scalar
//! predictions over HTTP. Requests carry up to thirteen numeric fields;
//! the pipeline places them into training order, applies the fitted
//! z-score transform, and runs the ensemble.

// Core scoring modules
pub mod errors;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod standardizer;

// Service modules
pub mod config;
pub mod state;
pub mod web;

pub use config::{load_config, AppConfig};
pub use errors::{MedvError, MedvResult};
pub use pipeline::Pipeline;
pub use state::AppState;
