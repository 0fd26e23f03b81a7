//! libSQL storage layer for the audit history (local, offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding one row per
//! audited pipeline run. [`Storage::open`] is read-write and applies pending
//! migrations; [`Storage::open_readonly`] rejects every write.

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use contentflow_shared::{AuditQuery, AuditRecord, ContentFlowError, Result};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContentFlowError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ContentFlowError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ContentFlowError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Audit history
    // -----------------------------------------------------------------------

    /// Insert an audit record.
    pub async fn insert_audit_record(&self, record: &AuditRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO audit_history
                   (id, object_id, object_type, request_id, graph_id, operation, user_id, summary, created_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.as_str(),
                    record.object_id.as_str(),
                    record.object_type.as_deref(),
                    record.request_id.as_deref(),
                    record.graph_id.as_deref(),
                    record.operation.as_deref(),
                    record.user_id.as_deref(),
                    record.summary.as_deref(),
                    format_timestamp(&record.created_on),
                ],
            )
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;
        tracing::debug!(id = %record.id, object_id = %record.object_id, "inserted audit record");
        Ok(())
    }

    /// Records inside the inclusive time range of `query`, oldest first.
    /// `None` filters match everything.
    pub async fn query_audit_records(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, object_id, object_type, request_id, graph_id, operation, user_id, summary, created_on
                 FROM audit_history
                 WHERE created_on >= ?1 AND created_on <= ?2
                   AND (?3 IS NULL OR graph_id = ?3)
                   AND (?4 IS NULL OR object_type = ?4)
                   AND (?5 IS NULL OR object_id = ?5)
                 ORDER BY created_on, id",
                params![
                    format_timestamp(&query.start),
                    format_timestamp(&query.end),
                    query.graph_id.as_deref(),
                    query.object_type.as_deref(),
                    query.object_id.as_deref(),
                ],
            )
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?
        {
            results.push(row_to_audit_record(&row)?);
        }
        Ok(results)
    }

    /// The record for `object_id` created exactly at `timestamp`.
    pub async fn get_audit_record(
        &self,
        object_id: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Option<AuditRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, object_id, object_type, request_id, graph_id, operation, user_id, summary, created_on
                 FROM audit_history WHERE object_id = ?1 AND created_on = ?2
                 ORDER BY id LIMIT 1",
                params![object_id, format_timestamp(timestamp)],
            )
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_audit_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ContentFlowError::Storage(e.to_string())),
        }
    }

    /// Delete every record created before `timestamp`. Returns the number deleted.
    pub async fn delete_audit_records_before(&self, timestamp: &DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        let deleted = self
            .conn
            .execute(
                "DELETE FROM audit_history WHERE created_on < ?1",
                params![format_timestamp(timestamp)],
            )
            .await
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?;
        tracing::info!(deleted, "purged audit records");
        Ok(deleted)
    }
}

/// Fixed-width RFC 3339 form used in the `created_on` column.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert a database row to an [`AuditRecord`].
fn row_to_audit_record(row: &libsql::Row) -> Result<AuditRecord> {
    Ok(AuditRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?,
        object_id: row
            .get::<String>(1)
            .map_err(|e| ContentFlowError::Storage(e.to_string()))?,
        object_type: row.get::<String>(2).ok(),
        request_id: row.get::<String>(3).ok(),
        graph_id: row.get::<String>(4).ok(),
        operation: row.get::<String>(5).ok(),
        user_id: row.get::<String>(6).ok(),
        summary: row.get::<String>(7).ok(),
        created_on: {
            let s: String = row
                .get(8)
                .map_err(|e| ContentFlowError::Storage(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ContentFlowError::Storage(format!("invalid date: {e}")))?
        },
    })
}
