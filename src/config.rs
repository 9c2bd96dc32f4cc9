//! Runtime configuration: defaults, then `medv.toml`, then `MEDV_*`
//! environment variables, later layers winning.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::errors::{MedvError, MedvResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("artifacts/preprocessor.json")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("artifacts/model.json")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scaler_path: default_scaler_path(),
            model_path: default_model_path(),
            static_dir: default_static_dir(),
        }
    }
}

impl AppConfig {
    /// Address string for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> MedvResult<()> {
        if self.host.trim().is_empty() {
            return Err(MedvError::config("host must be set"));
        }
        if self.port == 0 {
            return Err(MedvError::config("port must be nonzero"));
        }
        if self.scaler_path.as_os_str().is_empty() {
            return Err(MedvError::config("scaler_path must be set"));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(MedvError::config("model_path must be set"));
        }
        Ok(())
    }
}

pub fn load_config() -> MedvResult<AppConfig> {
    let figment = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file("medv.toml"))
        .merge(Env::prefixed("MEDV_"));

    let config: AppConfig = figment
        .extract()
        .map_err(|e| MedvError::config(e.to_string()))?;

    config.validate()?;

    Ok(config)
}
