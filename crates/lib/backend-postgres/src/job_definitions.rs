use serde_json::Value;
use sqlx::Row;
use sqlx::types::Json;
use superv_job_order_backend::{BackendResult, JobDefinitionBackend};
use superv_workflow_core::{JobDefinition, JobDefinitionRow, WorkflowType};

use super::{PostgresBackend, parse_workflow_type};

#[async_trait::async_trait]
impl JobDefinitionBackend for PostgresBackend {
    async fn get_job_definitions(&self) -> BackendResult<Vec<JobDefinitionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT workflow_type, job_name, image, command_line, command_matrix, parallel
            FROM workflow_jobs
            ORDER BY workflow_type, job_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            let workflow_type: String = row.try_get("workflow_type")?;
            let Json(command_line): Json<Vec<String>> = row.try_get("command_line")?;
            let Json(command_matrix): Json<Vec<Vec<String>>> = row.try_get("command_matrix")?;
            let parallel: Option<Json<Value>> = row.try_get("parallel")?;
            definitions.push(JobDefinitionRow {
                workflow_type: parse_workflow_type(&workflow_type)?,
                job_name: row.try_get("job_name")?,
                definition: JobDefinition {
                    image: row.try_get("image")?,
                    command_line,
                    command_matrix,
                    parallel: parallel.map(|Json(value)| value),
                },
            });
        }
        Ok(definitions)
    }

    async fn update_job_image(
        &self,
        workflow_type: WorkflowType,
        job_name: &str,
        image: &str,
    ) -> BackendResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_jobs
            SET image = $3
            WHERE workflow_type = $1 AND job_name = $2
            "#,
        )
        .bind(workflow_type.as_str())
        .bind(job_name)
        .bind(image)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
