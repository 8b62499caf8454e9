use sqlx::PgPool;

use super::PostgresBackend;
use superv_test_support::postgres_setup;
use superv_workflow_core::{JobDefinition, JobId, NextJob, WorkflowType};

pub(super) async fn setup_backend() -> Option<PostgresBackend> {
    let pool = postgres_setup().await?;
    reset_database(&pool).await;
    Some(PostgresBackend::new(pool))
}

pub(super) async fn reset_database(pool: &PgPool) {
    sqlx::query(
        r#"
        TRUNCATE workflow_jobs,
                 test_cases,
                 catalog_entries,
                 run_requests,
                 run_properties,
                 runs
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(pool)
    .await
    .expect("truncate postgres tables");
}

/// staging(1) -> database(2) -> provider(3) -> COMPLETE
pub(super) async fn seed_core_chain(backend: &PostgresBackend) {
    let definition = JobDefinition {
        image: "containers.renci.org/eds/irods-supervisor:latest".to_string(),
        command_line: vec!["python".to_string(), "run.py".to_string()],
        command_matrix: Vec::new(),
        parallel: None,
    };
    // Tail first so every next_job_id already exists when its row lands.
    for (id, name, next) in [
        (3, "provider", NextJob::Complete),
        (2, "database", NextJob::Job(JobId(3))),
        (1, "staging", NextJob::Job(JobId(2))),
    ] {
        backend
            .upsert_job(WorkflowType::Core, JobId(id), name, next, &definition)
            .await
            .expect("seed job");
    }
}
