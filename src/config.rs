//! Runtime Configuration
//! Mission: One typed view of flags, environment and `.env` files

use crate::auth::TokenLifetimes;
use crate::store::{Backpressure, StoreConfig};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;

/// One year.
const MAX_ACCESS_TTL_MINUTES: i64 = 525_600;
/// Ten years.
const MAX_REFRESH_TTL_DAYS: i64 = 3_650;

#[derive(Parser, Debug, Clone)]
#[command(name = "road-patrol")]
#[command(about = "Multi-tenant road inspection backend")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "road_patrol.db")]
    pub database_path: String,

    /// HMAC secret for signing tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(
        long,
        env = "ACCESS_TOKEN_TTL_MINUTES",
        default_value = "120",
        value_parser = clap::value_parser!(i64).range(1..=MAX_ACCESS_TTL_MINUTES)
    )]
    pub access_token_ttl_minutes: i64,

    #[arg(
        long,
        env = "REFRESH_TOKEN_TTL_DAYS",
        default_value = "30",
        value_parser = clap::value_parser!(i64).range(1..=MAX_REFRESH_TTL_DAYS)
    )]
    pub refresh_token_ttl_days: i64,

    /// Store operations allowed to wait for the worker
    #[arg(long, env = "STORE_QUEUE_CAPACITY", default_value = "256")]
    pub store_queue_capacity: usize,

    /// What to do when the store queue is full
    #[arg(long, env = "STORE_BACKPRESSURE", value_enum, default_value = "wait")]
    pub store_backpressure: Backpressure,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    #[arg(long, env = "BOOTSTRAP_TENANT_ID", default_value = "1")]
    pub bootstrap_tenant_id: i64,

    #[arg(long, env = "BOOTSTRAP_ADMIN_USERNAME", default_value = "admin")]
    pub bootstrap_admin_username: String,

    /// No bootstrap admin is created unless this is set
    #[arg(long, env = "BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    pub bootstrap_admin_password: Option<String>,
}

impl Config {
    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: chrono::Duration::minutes(self.access_token_ttl_minutes),
            refresh: chrono::Duration::days(self.refresh_token_ttl_days),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            queue_capacity: self.store_queue_capacity,
            backpressure: self.store_backpressure,
        }
    }
}

/// Load `.env` from the working directory (and parents), then from the crate root.
pub fn load_env() {
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
