//! Local draft store implementation

use crate::error::Result;
use crate::models::{Draft, DraftId, DraftMeta, MetaPatch};
use crate::util::unix_timestamp_millis;
use libsql::Connection;
use serde_json::Value;

/// Trait for local draft storage operations (async)
#[allow(async_fn_in_trait)]
pub trait DraftStore {
    /// Upsert a draft, merging `patch` into any existing metadata.
    ///
    /// Merging (rather than replacing) preserves fields like `server_id`
    /// across repeated saves.
    async fn put(&self, id: &DraftId, data: &Value, patch: MetaPatch) -> Result<Draft>;

    /// Get a draft by id. Absence is `None`, never an error; callers treat
    /// a missing draft as "load from server instead".
    async fn get(&self, id: &DraftId) -> Result<Option<Draft>>;

    /// Remove a draft. No-op if absent.
    async fn delete(&self, id: &DraftId) -> Result<()>;

    /// List all drafts, most recently updated first (diagnostics only)
    async fn list_all(&self) -> Result<Vec<Draft>>;
}

/// libSQL implementation of `DraftStore`
pub struct LibSqlDraftStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDraftStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_draft(row: &libsql::Row) -> Result<Draft> {
        let id: String = row.get(0)?;
        let data: String = row.get(1)?;
        let meta: String = row.get(2)?;
        Ok(Draft {
            id: id.parse()?,
            data: serde_json::from_str(&data)?,
            meta: serde_json::from_str(&meta)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl DraftStore for LibSqlDraftStore<'_> {
    async fn put(&self, id: &DraftId, data: &Value, patch: MetaPatch) -> Result<Draft> {
        let mut meta = match self.get(id).await? {
            Some(existing) => existing.meta,
            None => DraftMeta::default(),
        };
        meta.apply(patch);

        let now = unix_timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO drafts (id, data, meta, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     data = excluded.data,
                     meta = excluded.meta,
                     updated_at = excluded.updated_at",
                libsql::params![
                    id.to_string(),
                    serde_json::to_string(data)?,
                    serde_json::to_string(&meta)?,
                    now,
                    now
                ],
            )
            .await?;

        self.get(id)
            .await?
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Draft>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, data, meta, created_at, updated_at FROM drafts WHERE id = ?",
                [id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_draft(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &DraftId) -> Result<()> {
        self.conn
            .execute("DELETE FROM drafts WHERE id = ?", [id.to_string()])
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Draft>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, data, meta, created_at, updated_at
                 FROM drafts
                 ORDER BY updated_at DESC",
                (),
            )
            .await?;

        let mut drafts = Vec::new();
        while let Some(row) = rows.next().await? {
            drafts.push(Self::parse_draft(&row)?);
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::DraftStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let db = setup().await;
        let store = LibSqlDraftStore::new(db.connection());
        let id = DraftId::new_local();

        let draft = store
            .put(
                &id,
                &json!({"case_number": "C-100"}),
                MetaPatch::default().with_case_number("C-100"),
            )
            .await
            .unwrap();

        assert_eq!(draft.id, id);
        assert_eq!(draft.case_number().as_deref(), Some("C-100"));

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched, draft);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = setup().await;
        let store = LibSqlDraftStore::new(db.connection());

        let missing = store.get(&DraftId::new_local()).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_merges_meta_and_preserves_server_id() {
        let db = setup().await;
        let store = LibSqlDraftStore::new(db.connection());
        let id = DraftId::new_local();

        store
            .put(
                &id,
                &json!({"a": 1}),
                MetaPatch::default().with_server_id("srv-1"),
            )
            .await
            .unwrap();

        // A later save without a server_id patch must not clear the link
        let draft = store
            .put(
                &id,
                &json!({"a": 2}),
                MetaPatch::default().with_status(DraftStatus::Queued),
            )
            .await
            .unwrap();

        assert_eq!(draft.meta.server_id.as_deref(), Some("srv-1"));
        assert_eq!(draft.meta.status, DraftStatus::Queued);
        assert_eq!(draft.data, json!({"a": 2}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_preserves_created_at() {
        let db = setup().await;
        let store = LibSqlDraftStore::new(db.connection());
        let id = DraftId::new_local();

        let first = store.put(&id, &json!({}), MetaPatch::default()).await.unwrap();
        let second = store.put(&id, &json!({}), MetaPatch::default()).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_noop_when_absent() {
        let db = setup().await;
        let store = LibSqlDraftStore::new(db.connection());
        let id = DraftId::new_local();

        store.delete(&id).await.unwrap();

        store.put(&id, &json!({}), MetaPatch::default()).await.unwrap();
        store.delete(&id).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_all_newest_first() {
        let db = setup().await;
        let store = LibSqlDraftStore::new(db.connection());

        for _ in 0..3 {
            store
                .put(&DraftId::new_local(), &json!({}), MetaPatch::default())
                .await
                .unwrap();
        }

        let drafts = store.list_all().await.unwrap();
        assert_eq!(drafts.len(), 3);
        assert!(drafts[0].updated_at >= drafts[1].updated_at);
        assert!(drafts[1].updated_at >= drafts[2].updated_at);
    }
}
