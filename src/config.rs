use crate::engine::{DecayParams, RatingPipeline};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Maximum undo snapshots kept; the oldest is trimmed past this.
    pub ledger_capacity: usize,
    /// How long a staged submission waits for confirmation before expiring.
    pub pending_ttl_ms: i64,
    pub decay_enabled: bool,
    /// Wall-clock interval between scheduled decay sweeps.
    pub decay_sweep_interval_ms: i64,
    pub decay: DecayParams,
    pub pipeline: RatingPipeline,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let ledger_capacity = parse_i64(&env_map, "LEDGER_CAPACITY", 100)?;
        if ledger_capacity <= 0 {
            return Err(ConfigError::InvalidValue(
                "LEDGER_CAPACITY".to_string(),
                "must be positive".to_string(),
            ));
        }

        let pending_ttl_ms = parse_i64(&env_map, "PENDING_TTL_MS", 120_000)?;

        let decay = DecayParams {
            grace_ms: parse_i64(&env_map, "DECAY_GRACE_MS", 30 * 24 * 3_600_000)?,
            interval_ms: parse_i64(&env_map, "DECAY_INTERVAL_MS", 7 * 24 * 3_600_000)?,
            elo_per_step: parse_f64(&env_map, "DECAY_ELO_PER_STEP", 5.0)?,
            elo_floor: parse_f64(&env_map, "DECAY_ELO_FLOOR", 900.0)?,
            sigma_growth: parse_f64(&env_map, "DECAY_SIGMA_GROWTH", 0.5)?,
        };

        let pipeline = RatingPipeline {
            dampen_short_pods: parse_bool(&env_map, "DAMPEN_SHORT_PODS", true)?,
            minimum_change: parse_bool(&env_map, "MINIMUM_CHANGE", true)?,
            participation_bonus: parse_bool(&env_map, "PARTICIPATION_BONUS", true)?,
            phantom_padding: parse_bool(&env_map, "PHANTOM_PADDING", true)?,
        };

        Ok(Config {
            port,
            database_path,
            ledger_capacity: ledger_capacity as usize,
            pending_ttl_ms,
            decay_enabled: parse_bool(&env_map, "DECAY_ENABLED", false)?,
            decay_sweep_interval_ms: parse_i64(&env_map, "DECAY_SWEEP_INTERVAL_MS", 3_600_000)?,
            decay,
            pipeline,
        })
    }
}

fn parse_i64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(s) => s.parse::<i64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid i64".to_string())
        }),
    }
}

fn parse_f64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(s) => s.parse::<f64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid f64".to_string())
        }),
    }
}

fn parse_bool(
    env_map: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match env_map.get(key).map(|s| s.as_str()) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be true or false, got {}", other),
        )),
    }
}
