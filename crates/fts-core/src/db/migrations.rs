//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: drafts and outbox tables
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Local drafts, keyed by server id or local placeholder id
        "CREATE TABLE IF NOT EXISTS drafts (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            meta TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_drafts_updated ON drafts(updated_at DESC)",
        // Outbox of pending sync jobs, replayed oldest-first
        "CREATE TABLE IF NOT EXISTS outbox (
            job_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            draft_id TEXT NOT NULL,
            server_qid TEXT,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_outbox_created ON outbox(created_at ASC)",
    ];

    for statement in statements {
        if let Err(error) = conn.execute(statement, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
    }

    if let Err(error) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [CURRENT_VERSION],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }

    conn.execute("COMMIT", ()).await?;
    Ok(())
}
