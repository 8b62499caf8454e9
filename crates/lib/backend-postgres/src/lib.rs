//! Postgres backend for the superv settings tables.

mod job_definitions;
mod job_order;
mod run_requests;
#[cfg(test)]
mod test_helpers;

use std::collections::BTreeMap;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use superv_backends_core::{BackendError, BackendResult};
use superv_observability_macros::obs;
use superv_workflow_core::{
    CatalogKind, JobDefinition, JobId, NextJob, RunId, TestCase, WorkflowType,
};
use tracing::info;

const POOL_MAX_CONNECTIONS: u32 = 8;
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(15);

/// Persist job chains, run requests and run status in Postgres.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    #[obs]
    pub async fn connect(dsn: &str) -> BackendResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect(dsn)
            .await?;
        superv_backend_postgres_migrations::run(&pool)
            .await
            .map_err(|err| BackendError::Message(err.to_string()))?;
        info!("connected to postgres backend");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace one job step. Used by deployment seeding and tests.
    #[obs]
    pub async fn upsert_job(
        &self,
        workflow_type: WorkflowType,
        job_id: JobId,
        job_name: &str,
        next: NextJob,
        definition: &JobDefinition,
    ) -> BackendResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_jobs
                (workflow_type, job_id, job_name, next_job_id, image, command_line,
                 command_matrix, parallel)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (workflow_type, job_id)
            DO UPDATE SET
                job_name = EXCLUDED.job_name,
                next_job_id = EXCLUDED.next_job_id,
                image = EXCLUDED.image,
                command_line = EXCLUDED.command_line,
                command_matrix = EXCLUDED.command_matrix,
                parallel = EXCLUDED.parallel
            "#,
        )
        .bind(workflow_type.as_str())
        .bind(job_id.0)
        .bind(job_name)
        .bind(next.to_db())
        .bind(&definition.image)
        .bind(Json(&definition.command_line))
        .bind(Json(&definition.command_matrix))
        .bind(definition.parallel.as_ref().map(Json))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_test_case(&self, test_case: &TestCase) -> BackendResult<()> {
        sqlx::query(
            r#"
            INSERT INTO test_cases (label, duration_class)
            VALUES ($1, $2)
            ON CONFLICT (label) DO UPDATE SET duration_class = EXCLUDED.duration_class
            "#,
        )
        .bind(&test_case.label)
        .bind(test_case.duration_class.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_catalog_entry(&self, kind: CatalogKind, name: &str) -> BackendResult<()> {
        sqlx::query(
            "INSERT INTO catalog_entries (kind, name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Register a run and its initial properties.
    pub async fn insert_run(
        &self,
        run_id: RunId,
        request_group: Option<&str>,
        properties: &BTreeMap<String, String>,
    ) -> BackendResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO runs (run_id, request_group) VALUES ($1, $2)")
            .bind(run_id.0)
            .bind(request_group)
            .execute(&mut *tx)
            .await?;
        for (key, value) in properties {
            sqlx::query("INSERT INTO run_properties (run_id, key, value) VALUES ($1, $2, $3)")
                .bind(run_id.0)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn parse_workflow_type(value: &str) -> BackendResult<WorkflowType> {
    WorkflowType::parse(value)
        .ok_or_else(|| BackendError::Message(format!("unknown workflow type in store: {value}")))
}
