use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use superv_job_order_backend::{BackendError, BackendResult, JobOrderBackend, LinkWriter};
use superv_workflow_core::{JobId, JobLinkRow, NextJob, WorkflowType};

use super::PostgresBackend;

fn link_from_row(row: &PgRow) -> BackendResult<JobLinkRow> {
    Ok(JobLinkRow {
        job_id: JobId(row.try_get("job_id")?),
        job_name: row.try_get("job_name")?,
        next: NextJob::from_db(row.try_get("next_job_id")?),
    })
}

#[async_trait::async_trait]
impl JobOrderBackend for PostgresBackend {
    async fn get_job_chain(&self, workflow_type: WorkflowType) -> BackendResult<Vec<JobLinkRow>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, job_name, next_job_id
            FROM workflow_jobs
            WHERE workflow_type = $1
            ORDER BY job_id
            "#,
        )
        .bind(workflow_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(link_from_row).collect()
    }

    async fn begin_link_writes(
        &self,
        workflow_type: WorkflowType,
    ) -> BackendResult<Box<dyn LinkWriter>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresLinkWriter { tx, workflow_type }))
    }
}

/// Link rewrites inside one database transaction; rolled back on drop.
struct PostgresLinkWriter {
    tx: Transaction<'static, Postgres>,
    workflow_type: WorkflowType,
}

#[async_trait::async_trait]
impl LinkWriter for PostgresLinkWriter {
    async fn load_chain(&mut self) -> BackendResult<Vec<JobLinkRow>> {
        // Row locks keep concurrent rewrites of the same workflow serialized.
        let rows = sqlx::query(
            r#"
            SELECT job_id, job_name, next_job_id
            FROM workflow_jobs
            WHERE workflow_type = $1
            ORDER BY job_id
            FOR UPDATE
            "#,
        )
        .bind(self.workflow_type.as_str())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(link_from_row).collect()
    }

    async fn set_next_job(&mut self, job_id: JobId, next: NextJob) -> BackendResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_jobs
            SET next_job_id = $3
            WHERE workflow_type = $1 AND job_id = $2
            "#,
        )
        .bind(self.workflow_type.as_str())
        .bind(job_id.0)
        .bind(next.to_db())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::Message(format!(
                "job {job_id} not found in workflow {}",
                self.workflow_type
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        let Self { tx, .. } = *self;
        tx.commit().await?;
        Ok(())
    }
}
