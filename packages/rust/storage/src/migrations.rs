//! SQL migration definitions for the audit history database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: audit_history",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per audited pipeline run or object change.
-- created_on is RFC 3339 UTC with millisecond precision, so text order is time order.
CREATE TABLE IF NOT EXISTS audit_history (
    id          TEXT PRIMARY KEY,
    object_id   TEXT NOT NULL,
    object_type TEXT,
    request_id  TEXT,
    graph_id    TEXT,
    operation   TEXT,
    user_id     TEXT,
    summary     TEXT,
    created_on  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_created_on ON audit_history(created_on);
CREATE INDEX IF NOT EXISTS idx_audit_object ON audit_history(object_id, created_on);
CREATE INDEX IF NOT EXISTS idx_audit_graph_type ON audit_history(graph_id, object_type);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
