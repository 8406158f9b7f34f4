use crate::event_bus::DispatchPolicy;
use application::config::InteractionConfig;
use config::{Config, Environment, File};
use dotenvy::dotenv;
use log::warn;
use serde::Deserialize;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

/// Longest accepted play throttle window, one week
pub const MAX_PLAY_THROTTLE_SECS: u64 = 7 * 24 * 60 * 60;

fn clamp_play_throttle(secs: u64) -> u64 {
    if secs > MAX_PLAY_THROTTLE_SECS {
        warn!(
            "play_throttle_secs {} exceeds {}, using the maximum",
            secs, MAX_PLAY_THROTTLE_SECS
        );
        return MAX_PLAY_THROTTLE_SECS;
    }
    secs
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    database_url: String,
    /// Apply pending migrations on startup
    run_migrations: bool,
    database: RawDatabaseConfig,
    interaction: RawInteractionConfig,
    effects: RawEffectsConfig,
    log: RawLogConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            database_url: "".to_string(),
            run_migrations: false,
            database: RawDatabaseConfig::default(),
            interaction: RawInteractionConfig::default(),
            effects: RawEffectsConfig::default(),
            log: RawLogConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawDatabaseConfig {
    max_connections: u32,
    min_connections: u32,
    connect_timeout_secs: u64,
    acquire_timeout_secs: u64,
    idle_timeout_secs: u64,
    max_lifetime_secs: u64,
}

impl Default for RawDatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 90,
            min_connections: 20,
            connect_timeout_secs: 3,
            acquire_timeout_secs: 8,
            idle_timeout_secs: 60,
            max_lifetime_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawInteractionConfig {
    /// Repeat plays within this many seconds are not counted
    play_throttle_secs: u64,
}

impl Default for RawInteractionConfig {
    fn default() -> Self {
        Self {
            play_throttle_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawEffectsConfig {
    fire_and_forget: bool,
    max_attempts: u32,
    retry_backoff_ms: u64,
    max_in_flight: usize,
}

impl Default for RawEffectsConfig {
    fn default() -> Self {
        Self {
            fire_and_forget: true,
            max_attempts: 3,
            retry_backoff_ms: 200,
            max_in_flight: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawLogConfig {
    level: String,
    file: String,
}

impl Default for RawLogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "app.log".to_string(),
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub file: String,
}

#[derive(Debug, Clone)]
pub struct AppConfigImpl {
    pub database_url: Arc<RwLock<String>>,
    pub run_migrations: bool,
    pub play_throttle_secs: Arc<AtomicU64>,
    pub database: Arc<RwLock<DatabaseConfig>>,
    pub effects: Arc<RwLock<DispatchPolicy>>,
    pub log: Arc<RwLock<LogConfig>>,
}

impl AppConfigImpl {
    fn new(data: RawConfig) -> Self {
        let database_config = DatabaseConfig {
            max_connections: data.database.max_connections,
            min_connections: data.database.min_connections,
            connect_timeout: Duration::from_secs(data.database.connect_timeout_secs),
            acquire_timeout: Duration::from_secs(data.database.acquire_timeout_secs),
            idle_timeout: Duration::from_secs(data.database.idle_timeout_secs),
            max_lifetime: Duration::from_secs(data.database.max_lifetime_secs),
        };
        let dispatch_policy = DispatchPolicy {
            fire_and_forget: data.effects.fire_and_forget,
            max_attempts: data.effects.max_attempts.max(1),
            retry_backoff: Duration::from_millis(data.effects.retry_backoff_ms),
            max_in_flight: data.effects.max_in_flight.max(1),
        };
        let log_config = LogConfig {
            level: data.log.level,
            file: data.log.file,
        };
        AppConfigImpl {
            database_url: Arc::new(RwLock::new(data.database_url)),
            run_migrations: data.run_migrations,
            play_throttle_secs: Arc::new(AtomicU64::new(clamp_play_throttle(
                data.interaction.play_throttle_secs,
            ))),
            database: Arc::new(RwLock::new(database_config)),
            effects: Arc::new(RwLock::new(dispatch_policy)),
            log: Arc::new(RwLock::new(log_config)),
        }
    }

    pub fn load() -> Result<AppConfigImpl, Box<dyn Error>> {
        dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let raw: RawConfig = config.try_deserialize()?;
        Ok(AppConfigImpl::new(raw))
    }

    pub fn database_url(&self) -> String {
        let cfg_val = self.database_url.read().unwrap();
        (*cfg_val).clone()
    }

    pub fn database(&self) -> DatabaseConfig {
        let cfg_val = self.database.read().unwrap();
        cfg_val.clone()
    }

    pub fn effects(&self) -> DispatchPolicy {
        let cfg_val = self.effects.read().unwrap();
        cfg_val.clone()
    }

    pub fn log(&self) -> LogConfig {
        let cfg_val = self.log.read().unwrap();
        cfg_val.clone()
    }

    /// Change the throttle window of a running service. Services built from
    /// this config or a clone of it read the new value on their next play.
    pub fn set_play_throttle_secs(&self, secs: u64) {
        self.play_throttle_secs
            .store(clamp_play_throttle(secs), Ordering::SeqCst);
    }
}

impl Default for AppConfigImpl {
    fn default() -> Self {
        AppConfigImpl::new(RawConfig::default())
    }
}

impl InteractionConfig for AppConfigImpl {
    fn play_throttle_window(&self) -> chrono::Duration {
        let secs = self
            .play_throttle_secs
            .load(Ordering::SeqCst)
            .min(MAX_PLAY_THROTTLE_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}
