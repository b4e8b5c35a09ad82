//! Runtime configuration
//!
//! Resolved once at process start from `kodekalender.toml` plus
//! `KALENDER_`-prefixed environment variables. Selects the storage
//! backend and carries the optional simulated-clock overrides.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::game_clock::{ClockOverride, GameClock};

/// Endpoint of the shared multi-tenant document store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub tenant: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend selector: "sled" (local single-tenant) or "remote".
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub sled_path: Option<String>,
    #[serde(default)]
    pub remote: Option<RemoteStoreConfig>,
}

fn default_backend() -> String {
    "sled".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: default_backend(),
            sled_path: None,
            remote: None,
        }
    }
}

impl StorageConfig {
    /// Configured sled path, or a per-user data directory fallback.
    pub fn sled_path_or_default(&self) -> String {
        match &self.sled_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join("kodekalender")
                .join("sessions")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Simulated-clock overrides for testing and content previews.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClockConfig {
    #[serde(default)]
    pub simulated_day: Option<u32>,
    #[serde(default)]
    pub simulated_month: Option<u32>,
}

impl ClockConfig {
    pub fn to_clock(&self) -> GameClock {
        GameClock::new(ClockOverride::new(self.simulated_day, self.simulated_month))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KalenderConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

pub fn load_config() -> Result<KalenderConfig, figment::Error> {
    let figment = Figment::from(Serialized::defaults(KalenderConfig::default()))
        .merge(Toml::file("kodekalender.toml"))
        .merge(Env::prefixed("KALENDER_"));

    let config: KalenderConfig = figment.extract()?;

    if config.storage.backend == "remote" && config.storage.remote.is_none() {
        return Err(figment::Error::from(
            "storage.remote must be set when storage.backend is \"remote\"".to_string(),
        ));
    }

    Ok(config)
}
