//! Outbox queue implementation

use crate::error::Result;
use crate::models::{Job, JobId, JobKind};
use libsql::Connection;

/// Trait for the durable queue of pending sync jobs (async)
#[allow(async_fn_in_trait)]
pub trait OutboxQueue {
    /// Append a job. Jobs are keyed by `job_id`, so re-enqueuing the same
    /// id is an overwrite, not a duplicate.
    async fn enqueue(&self, job: &Job) -> Result<()>;

    /// Snapshot of all pending jobs, oldest first. Does not remove them;
    /// removal is explicit via [`OutboxQueue::remove`].
    async fn dequeue_all(&self) -> Result<Vec<Job>>;

    /// Delete a job after successful replay (or when it is unrecoverable)
    async fn remove(&self, id: &JobId) -> Result<()>;

    /// Number of pending jobs
    async fn len(&self) -> Result<usize>;
}

/// libSQL implementation of `OutboxQueue`
pub struct LibSqlOutbox<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOutbox<'a> {
    /// Create a new queue with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_job(row: &libsql::Row) -> Result<Job> {
        let id: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let draft_id: String = row.get(2)?;
        let server_qid = match row.get_value(3)? {
            libsql::Value::Text(text) => Some(text),
            _ => None,
        };
        Ok(Job {
            id: id
                .parse()
                .map_err(|_| crate::Error::InvalidInput(format!("invalid job id: {id}")))?,
            kind: JobKind::parse(&kind),
            draft_id: draft_id.parse()?,
            server_qid,
            created_at: row.get(4)?,
        })
    }
}

impl OutboxQueue for LibSqlOutbox<'_> {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        let server_qid = job
            .server_qid
            .clone()
            .map_or(libsql::Value::Null, libsql::Value::Text);

        self.conn
            .execute(
                "INSERT OR REPLACE INTO outbox (job_id, kind, draft_id, server_qid, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    job.id.as_str(),
                    job.kind.as_str(),
                    job.draft_id.to_string(),
                    server_qid,
                    job.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn dequeue_all(&self) -> Result<Vec<Job>> {
        let mut rows = self
            .conn
            .query(
                "SELECT job_id, kind, draft_id, server_qid, created_at
                 FROM outbox
                 ORDER BY created_at ASC, job_id ASC",
                (),
            )
            .await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(Self::parse_job(&row)?);
        }
        Ok(jobs)
    }

    async fn remove(&self, id: &JobId) -> Result<()> {
        self.conn
            .execute("DELETE FROM outbox WHERE job_id = ?", [id.as_str()])
            .await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM outbox", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
