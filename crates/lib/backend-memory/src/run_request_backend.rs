use std::collections::BTreeMap;

use chrono::Utc;
use superv_run_request_backend::{BackendResult, QueuedRequests, RunRequestBackend};
use superv_workflow_core::{
    CatalogKind, NewRunRequest, RUN_STATUS_PROPERTY, RunId, RunRequestRecord, RunStatus,
    RunSummary, TestCase,
};

#[async_trait::async_trait]
impl RunRequestBackend for crate::MemoryBackend {
    async fn list_test_cases(&self) -> BackendResult<Vec<TestCase>> {
        Ok(self.test_cases.lock().expect("test cases poisoned").clone())
    }

    async fn list_catalog(&self, kind: CatalogKind) -> BackendResult<Vec<String>> {
        let guard = self.catalogs.lock().expect("catalogs poisoned");
        Ok(guard
            .get(&kind)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn test_request_name_exists(&self, request_group: &str) -> BackendResult<bool> {
        let guard = self.run_requests.lock().expect("run requests poisoned");
        Ok(guard
            .iter()
            .any(|request| request.request_group == request_group))
    }

    async fn insert_run_requests(
        &self,
        requests: &[NewRunRequest],
    ) -> BackendResult<QueuedRequests> {
        let mut guard = self.run_requests.lock().expect("run requests poisoned");
        if let Some(taken) = requests.iter().find(|request| {
            guard
                .iter()
                .any(|existing| existing.request_group == request.request_group)
        }) {
            return Ok(QueuedRequests::GroupTaken(taken.request_group.clone()));
        }

        let now = Utc::now();
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            let id = guard.len() as i64 + 1;
            guard.push(RunRequestRecord {
                id,
                status: request.status,
                request_data: request.request_data.clone(),
                request_group: request.request_group.clone(),
                created_at: now,
            });
            ids.push(id);
        }
        Ok(QueuedRequests::Inserted(ids))
    }

    async fn list_request_groups(&self) -> BackendResult<Vec<String>> {
        let guard = self.run_requests.lock().expect("run requests poisoned");
        let mut groups: Vec<String> = Vec::new();
        for request in guard.iter().rev() {
            if !groups.contains(&request.request_group) {
                groups.push(request.request_group.clone());
            }
        }
        Ok(groups)
    }

    async fn get_request_group(
        &self,
        request_group: &str,
    ) -> BackendResult<Vec<RunRequestRecord>> {
        let guard = self.run_requests.lock().expect("run requests poisoned");
        Ok(guard
            .iter()
            .filter(|request| request.request_group == request_group)
            .cloned()
            .collect())
    }

    async fn set_run_status(&self, run_id: RunId, status: RunStatus) -> BackendResult<bool> {
        let mut guard = self.runs.lock().expect("runs poisoned");
        match guard.get_mut(&run_id) {
            Some(run) => {
                run.properties
                    .insert(RUN_STATUS_PROPERTY.to_string(), status.as_str().to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_run_properties(
        &self,
        run_id: RunId,
    ) -> BackendResult<Option<BTreeMap<String, String>>> {
        let guard = self.runs.lock().expect("runs poisoned");
        Ok(guard.get(&run_id).map(|run| run.properties.clone()))
    }

    async fn list_runs(&self, limit: i64) -> BackendResult<Vec<RunSummary>> {
        let guard = self.runs.lock().expect("runs poisoned");
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(guard
            .iter()
            .rev()
            .take(limit)
            .map(|(run_id, run)| RunSummary {
                run_id: *run_id,
                request_group: run.request_group.clone(),
                status: run.properties.get(RUN_STATUS_PROPERTY).cloned(),
                created_at: run.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use superv_workflow_core::{DbType, RunLocation, RunRequestPayload, TestBatch, WorkflowType};

    use super::*;
    use crate::MemoryBackend;

    fn request(group: &str, label: &str) -> NewRunRequest {
        NewRunRequest {
            status: RunStatus::New,
            request_data: RunRequestPayload {
                workflow_type: WorkflowType::Core,
                db_image: "postgres:14.11".to_string(),
                db_type: DbType::Postgres,
                os_image: "ubuntu-20.04:latest".to_string(),
                package_dir: String::new(),
                tests: TestBatch::new(RunLocation::Consumer, vec![label.to_string()]),
            },
            request_group: group.to_string(),
        }
    }

    #[tokio::test]
    async fn inserted_requests_make_group_name_taken() {
        let backend = MemoryBackend::new();
        assert!(!backend.test_request_name_exists("nightly").await.unwrap());

        let ids = backend
            .insert_run_requests(&[request("nightly", "t1"), request("nightly", "t2")])
            .await
            .unwrap();
        assert_eq!(ids, QueuedRequests::Inserted(vec![1, 2]));
        assert!(backend.test_request_name_exists("nightly").await.unwrap());
        assert_eq!(backend.get_request_group("nightly").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn insert_into_taken_group_writes_nothing() {
        let backend = MemoryBackend::new();
        backend
            .insert_run_requests(&[request("nightly", "t1")])
            .await
            .unwrap();

        let outcome = backend
            .insert_run_requests(&[request("nightly", "t2"), request("nightly", "t3")])
            .await
            .unwrap();
        assert_eq!(outcome, QueuedRequests::GroupTaken("nightly".to_string()));
        assert_eq!(backend.run_requests().len(), 1);
    }

    #[tokio::test]
    async fn catalogs_list_sorted_names_per_kind() {
        let backend = MemoryBackend::new();
        backend.insert_catalog_entry(CatalogKind::OsImage, "ubuntu-22.04:latest");
        backend.insert_catalog_entry(CatalogKind::OsImage, "ubuntu-20.04:latest");
        backend.insert_catalog_entry(CatalogKind::DbmsImage, "postgres:14.11");

        assert_eq!(
            backend.list_catalog(CatalogKind::OsImage).await.unwrap(),
            vec!["ubuntu-20.04:latest".to_string(), "ubuntu-22.04:latest".to_string()]
        );
        assert!(
            backend
                .list_catalog(CatalogKind::EnvironmentType)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn request_groups_list_most_recent_first() {
        let backend = MemoryBackend::new();
        backend
            .insert_run_requests(&[request("first", "t1")])
            .await
            .unwrap();
        backend
            .insert_run_requests(&[request("second", "t2")])
            .await
            .unwrap();
        assert_eq!(
            backend.list_request_groups().await.unwrap(),
            vec!["second".to_string(), "first".to_string()]
        );
    }

    #[tokio::test]
    async fn run_status_is_stored_as_run_property() {
        let backend = MemoryBackend::new();
        backend.insert_run(RunId(3057), Some("nightly"), BTreeMap::new());

        assert!(
            backend
                .set_run_status(RunId(3057), RunStatus::DoNotRerun)
                .await
                .unwrap()
        );
        assert!(!backend.set_run_status(RunId(1), RunStatus::New).await.unwrap());

        let props = backend.get_run_properties(RunId(3057)).await.unwrap().unwrap();
        assert_eq!(props[RUN_STATUS_PROPERTY], "do-not-rerun");
        let runs = backend.list_runs(100).await.unwrap();
        assert_eq!(runs[0].status.as_deref(), Some("do-not-rerun"));
        assert!(backend.get_run_properties(RunId(1)).await.unwrap().is_none());
    }
}
