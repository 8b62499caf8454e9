//! Postgres fixture for backend tests.
//!
//! Tests opt in by exporting `SUPERV_TEST_DATABASE_URL`. Without it every
//! Postgres-backed test returns early so the suite stays runnable offline.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::OnceCell;

pub const TEST_DATABASE_URL_ENV: &str = "SUPERV_TEST_DATABASE_URL";

const POOL_MAX_CONNECTIONS: u32 = 8;
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(15);

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Return a migrated pool, or `None` when no test database is configured.
pub async fn postgres_setup() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(dsn) = env::var(TEST_DATABASE_URL_ENV) else {
        eprintln!("{TEST_DATABASE_URL_ENV} not set; skipping postgres test");
        return None;
    };

    let pool = connect_pool(&dsn)
        .await
        .unwrap_or_else(|err| panic!("postgres_setup connect failed: {err:#}"));
    MIGRATED
        .get_or_try_init(|| async { migrate(&pool).await })
        .await
        .unwrap_or_else(|err| panic!("postgres_setup bootstrap failed: {err:#}"));
    Some(pool)
}

async fn connect_pool(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
        .connect(dsn)
        .await
        .with_context(|| format!("connect to {TEST_DATABASE_URL_ENV}"))
}

async fn migrate(pool: &PgPool) -> Result<()> {
    superv_backend_postgres_migrations::run(pool)
        .await
        .context("run migrations for test postgres")
}
