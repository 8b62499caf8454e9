use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use superv_run_request_backend::{
    BackendError, BackendResult, QueuedRequests, RunRequestBackend,
};
use superv_workflow_core::{
    CatalogKind, DurationClass, NewRunRequest, RUN_STATUS_PROPERTY, RunId, RunRequestPayload, RunRequestRecord,
    RunStatus, RunSummary, TestCase,
};

use super::PostgresBackend;

fn request_from_row(row: &PgRow) -> BackendResult<RunRequestRecord> {
    let status: String = row.try_get("status")?;
    let status = RunStatus::parse(&status)
        .ok_or_else(|| BackendError::Message(format!("unknown run status in store: {status}")))?;
    let Json(request_data): Json<Value> = row.try_get("request_data")?;
    let request_data: RunRequestPayload =
        serde_json::from_value(request_data).map_err(BackendError::Serialization)?;
    Ok(RunRequestRecord {
        id: row.try_get("id")?,
        status,
        request_data,
        request_group: row.try_get("request_group")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait::async_trait]
impl RunRequestBackend for PostgresBackend {
    async fn list_test_cases(&self) -> BackendResult<Vec<TestCase>> {
        let rows = sqlx::query("SELECT label, duration_class FROM test_cases ORDER BY label")
            .fetch_all(&self.pool)
            .await?;

        let mut test_cases = Vec::with_capacity(rows.len());
        for row in rows {
            let duration_class: String = row.try_get("duration_class")?;
            let duration_class = DurationClass::parse(&duration_class).ok_or_else(|| {
                BackendError::Message(format!("unknown duration class: {duration_class}"))
            })?;
            test_cases.push(TestCase {
                label: row.try_get("label")?,
                duration_class,
            });
        }
        Ok(test_cases)
    }

    async fn list_catalog(&self, kind: CatalogKind) -> BackendResult<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM catalog_entries WHERE kind = $1 ORDER BY name")
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn test_request_name_exists(&self, request_group: &str) -> BackendResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM run_requests WHERE request_group = $1)",
        )
        .bind(request_group)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_run_requests(
        &self,
        requests: &[NewRunRequest],
    ) -> BackendResult<QueuedRequests> {
        if requests.is_empty() {
            return Ok(QueuedRequests::Inserted(Vec::new()));
        }

        let mut groups: Vec<&str> = requests
            .iter()
            .map(|request| request.request_group.as_str())
            .collect();
        groups.sort_unstable();
        groups.dedup();

        let mut tx = self.pool.begin().await?;
        // Sorted lock order; the locks are released with the transaction.
        for group in &groups {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(group)
                .execute(&mut *tx)
                .await?;
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM run_requests WHERE request_group = $1)",
            )
            .bind(group)
            .fetch_one(&mut *tx)
            .await?;
            if taken {
                return Ok(QueuedRequests::GroupTaken(group.to_string()));
            }
        }

        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            let payload =
                serde_json::to_value(&request.request_data).map_err(BackendError::Serialization)?;
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO run_requests (status, request_data, request_group)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(request.status.as_str())
            .bind(Json(payload))
            .bind(&request.request_group)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(id);
        }
        tx.commit().await?;
        Ok(QueuedRequests::Inserted(ids))
    }

    async fn list_request_groups(&self) -> BackendResult<Vec<String>> {
        let groups: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT request_group
            FROM run_requests
            GROUP BY request_group
            ORDER BY MAX(id) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    async fn get_request_group(
        &self,
        request_group: &str,
    ) -> BackendResult<Vec<RunRequestRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, status, request_data, request_group, created_at
            FROM run_requests
            WHERE request_group = $1
            ORDER BY id
            "#,
        )
        .bind(request_group)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    async fn set_run_status(&self, run_id: RunId, status: RunStatus) -> BackendResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO run_properties (run_id, key, value)
            SELECT run_id, $2, $3 FROM runs WHERE run_id = $1
            ON CONFLICT (run_id, key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(run_id.0)
        .bind(RUN_STATUS_PROPERTY)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_run_properties(
        &self,
        run_id: RunId,
    ) -> BackendResult<Option<BTreeMap<String, String>>> {
        let rows = sqlx::query(
            r#"
            SELECT p.key, p.value
            FROM runs r
            LEFT JOIN run_properties p ON p.run_id = r.run_id
            WHERE r.run_id = $1
            "#,
        )
        .bind(run_id.0)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut properties = BTreeMap::new();
        for row in rows {
            let key: Option<String> = row.try_get("key")?;
            let value: Option<String> = row.try_get("value")?;
            if let (Some(key), Some(value)) = (key, value) {
                properties.insert(key, value);
            }
        }
        Ok(Some(properties))
    }

    async fn list_runs(&self, limit: i64) -> BackendResult<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT r.run_id, r.request_group, r.created_at, p.value AS status
            FROM runs r
            LEFT JOIN run_properties p ON p.run_id = r.run_id AND p.key = $2
            ORDER BY r.run_id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(RUN_STATUS_PROPERTY)
        .fetch_all(&self.pool)
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            runs.push(RunSummary {
                run_id: RunId(row.try_get("run_id")?),
                request_group: row.try_get("request_group")?,
                status: row.try_get("status")?,
                created_at,
            });
        }
        Ok(runs)
    }
}
