pub mod config;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod simulation;
pub mod token_bucket;

pub use config::{Config, LimiterConfig, SimulationConfig};
pub use error::{LimiterError, LimiterResult};
pub use limiter::TokenBucketLimiter;
pub use token_bucket::{BucketSnapshot, TokenBucket};
