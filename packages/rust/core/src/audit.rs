//! Audit history service over [`contentflow_storage::Storage`].
//!
//! Writes propagate storage errors. Reads are lenient: a storage failure is
//! logged and reported as "nothing found".

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, instrument, warn};

use contentflow_shared::{AuditQuery, AuditRecord, ContentFlowError, ContentNode, Result};
use contentflow_storage::Storage;

use crate::finalize::PipelineResponse;

/// Error code for a record saved without an object id.
pub const ERR_SAVE_AUDIT_MISSING_REQ_PARAMS: &str = "ERR_SAVE_AUDIT_MISSING_REQ_PARAMS";

pub struct AuditHistoryService {
    storage: Storage,
}

impl AuditHistoryService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Persist `record`. A blank object id is rejected.
    #[instrument(skip_all, fields(object_id = %record.object_id))]
    pub async fn save(&self, record: &AuditRecord) -> Result<()> {
        if record.object_id.trim().is_empty() {
            return Err(ContentFlowError::invalid_parameter_with_code(
                ERR_SAVE_AUDIT_MISSING_REQ_PARAMS,
                "audit record requires an object id",
            ));
        }
        self.storage.insert_audit_record(record).await
    }

    /// Records matching `query`; empty on storage failure.
    pub async fn history(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        match self.storage.query_audit_records(query).await {
            Ok(records) => {
                debug!(count = records.len(), "audit history read");
                records
            }
            Err(e) => {
                warn!(error = %e, "audit history read failed, returning no records");
                Vec::new()
            }
        }
    }

    /// The record for `object_id` at `timestamp`; `None` on storage failure.
    pub async fn record(&self, object_id: &str, timestamp: &DateTime<Utc>) -> Option<AuditRecord> {
        match self.storage.get_audit_record(object_id, timestamp).await {
            Ok(record) => record,
            Err(e) => {
                warn!(object_id, error = %e, "audit record read failed");
                None
            }
        }
    }

    /// Delete records older than `timestamp`.
    pub async fn purge_before(&self, timestamp: &DateTime<Utc>) -> Result<u64> {
        self.storage.delete_audit_records_before(timestamp).await
    }
}

/// Audit record describing one pipeline run.
pub fn run_audit_record(
    operation: &str,
    content_id: &str,
    node: &ContentNode,
    response: &PipelineResponse,
    graph_id: Option<&str>,
) -> AuditRecord {
    let mut record = AuditRecord::new(content_id);
    record.object_type = node.object_type.clone();
    record.graph_id = graph_id.map(String::from);
    record.operation = Some(operation.to_lowercase());
    record.request_id = Some(record.id.clone());
    record.summary = Some(
        json!({
            "status": response.status,
            "skipped": response.skipped,
            "nodeIdentifier": node.identifier,
            "pluginCount": response.payload.get("pluginCount"),
            "downloadUrl": response.payload.get("downloadUrl"),
        })
        .to_string(),
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::finalize::SkipReason;

    async fn test_service() -> AuditHistoryService {
        let tmp = std::env::temp_dir().join(format!("cf_audit_{}.db", uuid::Uuid::now_v7()));
        AuditHistoryService::new(Storage::open(&tmp).await.expect("open test db"))
    }

    #[tokio::test]
    async fn save_rejects_blank_object_id() {
        let service = test_service().await;
        let err = service.save(&AuditRecord::new("  ")).await.unwrap_err();
        assert_eq!(err.code(), ERR_SAVE_AUDIT_MISSING_REQ_PARAMS);
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn save_then_read_back() {
        let service = test_service().await;
        let mut record = AuditRecord::new("do_1");
        record.graph_id = Some("domain".into());
        service.save(&record).await.unwrap();

        let mut query = AuditQuery::between(
            record.created_on - Duration::minutes(1),
            record.created_on + Duration::minutes(1),
        );
        query.graph_id = Some("domain".into());
        assert_eq!(service.history(&query).await, vec![record.clone()]);

        assert_eq!(
            service.record("do_1", &record.created_on).await,
            Some(record.clone())
        );

        let purged = service
            .purge_before(&(record.created_on + Duration::seconds(1)))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(service.history(&query).await.is_empty());
    }

    #[tokio::test]
    async fn reads_are_lenient_on_storage_failure() {
        let tmp = std::env::temp_dir().join(format!("cf_audit_{}.db", uuid::Uuid::now_v7()));
        // never migrated, so the table does not exist
        let service = AuditHistoryService::new(Storage::open_readonly(&tmp).await.unwrap());

        let now = Utc::now();
        let query = AuditQuery::between(now - Duration::hours(1), now);
        assert!(service.history(&query).await.is_empty());
        assert!(service.record("do_1", &now).await.is_none());
    }

    #[test]
    fn run_record_summarizes_response() {
        let node = ContentNode {
            object_type: Some("Content".into()),
            ..ContentNode::new("do_9")
        };
        let response = PipelineResponse::skipped(SkipReason::ArtifactUnavailable);

        let record = run_audit_record("PUBLISH", "do_9", &node, &response, Some("domain"));
        assert_eq!(record.object_id, "do_9");
        assert_eq!(record.operation.as_deref(), Some("publish"));
        assert_eq!(record.object_type.as_deref(), Some("Content"));
        let summary: serde_json::Value =
            serde_json::from_str(record.summary.as_deref().unwrap()).unwrap();
        assert_eq!(summary["skipped"], "artifact_unavailable");
    }
}
