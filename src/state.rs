//! Shared application state, built once at startup.
//!
//! Everything handlers touch lives behind one `Arc<AppState>`. The state
//! is immutable after `initialize` returns; handlers only read it, so no
//! lock sits on the request path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::MedvResult;
use crate::pipeline::Pipeline;

/// Fallback request form, compiled in so the service can always render
/// the home page even when `static_dir` is absent on a host.
const DEFAULT_FORM_PAGE: &str = include_str!("../static/index.html");

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
    pub form_page: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Validate the configuration and load both artifacts. Any error here
    /// is fatal to startup; this is the gate that keeps a half-configured
    /// process from ever binding the listener.
    pub fn initialize(config: AppConfig) -> MedvResult<Arc<Self>> {
        config.validate()?;
        let pipeline = Pipeline::load(&config.scaler_path, &config.model_path)?;

        let page_path = config.static_dir.join("index.html");
        let form_page = match std::fs::read_to_string(&page_path) {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    path = %page_path.display(),
                    error = %e,
                    "form page not readable, serving the built-in page"
                );
                DEFAULT_FORM_PAGE.to_string()
            }
        };

        info!(
            scaler = %config.scaler_path.display(),
            model = %config.model_path.display(),
            trees = pipeline.tree_count(),
            "service state initialized"
        );

        Ok(Arc::new(Self {
            config,
            pipeline,
            form_page,
            started_at: Utc::now(),
        }))
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
