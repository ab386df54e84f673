use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::error::{LimiterError, LimiterResult};

/// Bucket parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LimiterConfig {
    /// Maximum number of tokens the bucket holds
    #[validate(range(exclusive_min = 0.0))]
    pub capacity: f64,

    /// Tokens added per second
    #[validate(range(exclusive_min = 0.0))]
    pub refill_rate: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 5.0,
            refill_rate: 5.0,
        }
    }
}

impl LimiterConfig {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }

    /// Both limits must be positive and finite; nothing is clamped.
    pub fn validate_limits(&self) -> LimiterResult<()> {
        self.validate()?;
        if !self.capacity.is_finite() || !self.refill_rate.is_finite() {
            return Err(LimiterError::Configuration(
                "capacity and refill_rate must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the simulation drives a shared limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Concurrent workers per round
    pub workers: usize,

    /// Tokens each worker asks for
    pub tokens_per_request: f64,

    pub rounds: u32,

    /// Delay before each worker makes its request
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,

    /// Pause between rounds
    #[serde(with = "humantime_serde")]
    pub round_interval: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            tokens_per_request: 1.0,
            rounds: 1,
            start_delay: Duration::from_secs(1),
            round_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limiter: LimiterConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limiter: LimiterConfig::default(),
            simulation: SimulationConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, keeping defaults for unset ones
    pub fn from_env() -> LimiterResult<Self> {
        let defaults = Config::default();

        let config = Config {
            limiter: LimiterConfig {
                capacity: env_or("BUCKET_CAPACITY", defaults.limiter.capacity)?,
                refill_rate: env_or("BUCKET_REFILL_RATE", defaults.limiter.refill_rate)?,
            },
            simulation: SimulationConfig {
                workers: env_or("SIM_WORKERS", defaults.simulation.workers)?,
                tokens_per_request: env_or("SIM_TOKENS", defaults.simulation.tokens_per_request)?,
                rounds: env_or("SIM_ROUNDS", defaults.simulation.rounds)?,
                start_delay: env_duration_or("SIM_START_DELAY", defaults.simulation.start_delay)?,
                round_interval: env_duration_or(
                    "SIM_ROUND_INTERVAL",
                    defaults.simulation.round_interval,
                )?,
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> LimiterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LimiterError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            LimiterError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LimiterResult<()> {
        self.limiter.validate_limits()?;

        if self.simulation.workers == 0 {
            return Err(LimiterError::Configuration(
                "workers must be greater than 0".to_string(),
            ));
        }
        if self.simulation.rounds == 0 {
            return Err(LimiterError::Configuration(
                "rounds must be greater than 0".to_string(),
            ));
        }
        let tokens = self.simulation.tokens_per_request;
        if !tokens.is_finite() || tokens <= 0.0 {
            return Err(LimiterError::Configuration(format!(
                "tokens_per_request must be greater than 0, got {}",
                tokens
            )));
        }

        Ok(())
    }
}

fn env_or<T>(name: &str, default: T) -> LimiterResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            LimiterError::Configuration(format!("Invalid value for {}: {:?} ({})", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

fn env_duration_or(name: &str, default: Duration) -> LimiterResult<Duration> {
    match env::var(name) {
        Ok(raw) => humantime::parse_duration(raw.trim()).map_err(|e| {
            LimiterError::Configuration(format!("Invalid duration for {}: {:?} ({})", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
