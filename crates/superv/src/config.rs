//! Configuration loading from environment variables.
//!
//! Uses the following environment variables:
//! - `SUPERV_DATABASE_URL`: PostgreSQL connection string (required by the CLI)
//! - `SHORT_BATCH_SIZE`: short-running tests per run request (default: 10)
//! - `LONG_BATCH_SIZE`: long-running tests per run request (default: 2)
//! - `SUPERV_IMAGE_FREEZE`: reject component image updates when `true` or `1`
//! - `SUPERV_LOG`: log filter directives (default: `RUST_LOG`, then `info`)

use std::env;
use std::num::NonZeroUsize;

use anyhow::{Context, Result};

use crate::batcher::{BatchSizes, DEFAULT_LONG_BATCH_SIZE, DEFAULT_SHORT_BATCH_SIZE};

pub const DATABASE_URL_ENV: &str = "SUPERV_DATABASE_URL";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database_url: Option<String>,
    pub batch_sizes: BatchSizes,
    pub image_freeze: bool,
    pub log_filter: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` file if present, then reads from environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let short = positive_size(&lookup, "SHORT_BATCH_SIZE", DEFAULT_SHORT_BATCH_SIZE)?;
        let long = positive_size(&lookup, "LONG_BATCH_SIZE", DEFAULT_LONG_BATCH_SIZE)?;

        let image_freeze = lookup("SUPERV_IMAGE_FREEZE")
            .map(|value| value == "true" || value == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url: lookup(DATABASE_URL_ENV).filter(|value| !value.is_empty()),
            batch_sizes: BatchSizes { short, long },
            image_freeze,
            log_filter: lookup("SUPERV_LOG").filter(|value| !value.is_empty()),
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .with_context(|| format!("{DATABASE_URL_ENV} environment variable is required"))
    }
}

fn positive_size(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: NonZeroUsize,
) -> Result<NonZeroUsize> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<NonZeroUsize>()
        .with_context(|| format!("{key} must be a positive integer, got {raw:?}"))
}
