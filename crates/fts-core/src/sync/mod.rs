//! Outbox reconciliation: replays queued draft mutations against the
//! remote API when connectivity and a valid session return.
//!
//! One full pass is a "drain". Within a drain, jobs replay oldest-first
//! and the drain stops on the first failure: later jobs may depend on
//! earlier ones (a `finalize` after a `save` on the same draft), so
//! skipping ahead would submit stale or incomplete data. Retries are
//! cheap; the next connectivity event triggers another full drain.

pub mod gate;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::QuestionnaireApi;
use crate::db::{DraftStore, OutboxQueue};
use crate::error::Result;
use crate::models::{Draft, DraftStatus, Job, JobKind, MetaPatch};
use self::gate::{GateStatus, SessionGate};

/// Outcome of one drain pass.
///
/// `remaining` is recomputed from the queue after the pass, so it stays
/// correct even if jobs were enqueued concurrently. A non-zero value only
/// means replay is pending, never that data was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub remaining: usize,
}

/// Server identity resolved for one job
struct ResolvedIdentity {
    server_id: String,
    /// True when resolution had to create the server record, meaning the
    /// payload has already been pushed
    created: bool,
}

/// How one job's replay concluded
enum JobDisposition {
    /// Remote effects applied; remove the job and count it
    Synced,
    /// Unrecoverable job (orphaned or unrecognized); remove without counting
    Dropped,
}

/// The reconciliation loop over the draft store, outbox, and remote API.
///
/// Safe to invoke redundantly: a re-entrant drain is skipped via an
/// in-memory flag, and identity resolution guards against duplicate
/// server-side creation across drains.
pub struct SyncEngine<'a, D, Q, A> {
    drafts: &'a D,
    outbox: &'a Q,
    api: &'a A,
    gate: &'a SessionGate,
    draining: AtomicBool,
}

impl<'a, D, Q, A> SyncEngine<'a, D, Q, A>
where
    D: DraftStore,
    Q: OutboxQueue,
    A: QuestionnaireApi,
{
    #[must_use]
    pub const fn new(drafts: &'a D, outbox: &'a Q, api: &'a A, gate: &'a SessionGate) -> Self {
        Self {
            drafts,
            outbox,
            api,
            gate,
            draining: AtomicBool::new(false),
        }
    }

    /// Run one drain pass.
    ///
    /// Remote failures never propagate; the report is the sole signal.
    /// Only local storage errors surface as `Err`.
    pub async fn drain(&self) -> Result<SyncReport> {
        if self.draining.swap(true, Ordering::SeqCst) {
            tracing::debug!("Drain already in progress; skipping re-entrant call");
            return Ok(SyncReport {
                synced: 0,
                remaining: self.outbox.len().await?,
            });
        }

        let report = self.drain_inner().await;
        self.draining.store(false, Ordering::SeqCst);
        report
    }

    async fn drain_inner(&self) -> Result<SyncReport> {
        let clearance = self.gate.clearance(self.api).await;
        if clearance != GateStatus::Ready {
            tracing::debug!("Sync gate closed ({clearance:?}); queue left untouched");
            return Ok(SyncReport {
                synced: 0,
                remaining: self.outbox.len().await?,
            });
        }

        // Snapshot: jobs enqueued during this drain are only visible to
        // the next one.
        let mut jobs = self.outbox.dequeue_all().await?;
        jobs.sort_by_key(|job| job.created_at);

        let mut synced = 0;
        for job in jobs {
            match self.replay(&job).await {
                Ok(JobDisposition::Synced) => {
                    self.outbox.remove(&job.id).await?;
                    synced += 1;
                }
                Ok(JobDisposition::Dropped) => {
                    self.outbox.remove(&job.id).await?;
                }
                Err(error) => {
                    tracing::warn!("Sync stopped at job {}: {error}; jobs left queued", job.id);
                    break;
                }
            }
        }

        Ok(SyncReport {
            synced,
            remaining: self.outbox.len().await?,
        })
    }

    /// Replay one job's remote effects
    async fn replay(&self, job: &Job) -> Result<JobDisposition> {
        let Some(draft) = self.drafts.get(&job.draft_id).await? else {
            // The draft was deleted locally; the job can never complete
            tracing::debug!("Dropping orphaned job {} for draft {}", job.id, job.draft_id);
            return Ok(JobDisposition::Dropped);
        };

        match &job.kind {
            JobKind::Save => {
                let identity = self.resolve_server_id(job, &draft).await?;
                if !identity.created {
                    self.api.update(&identity.server_id, &draft.data).await?;
                }
                self.persist_link(&draft, &identity.server_id, DraftStatus::Draft)
                    .await?;
            }
            JobKind::Finalize => {
                let identity = self.resolve_server_id(job, &draft).await?;
                // Push the latest payload before locking the record
                self.api.update(&identity.server_id, &draft.data).await?;
                self.api.finalize(&identity.server_id).await?;
                self.persist_link(&draft, &identity.server_id, DraftStatus::Submitted)
                    .await?;
            }
            JobKind::Unknown(label) => {
                // Version skew in persisted data; drop rather than block
                // the queue indefinitely
                tracing::warn!("Dropping job {} with unrecognized kind {label:?}", job.id);
                return Ok(JobDisposition::Dropped);
            }
        }

        Ok(JobDisposition::Synced)
    }

    /// Resolve the server identity for a job, creating the server record
    /// at most once per logical draft.
    ///
    /// Candidates in priority order: the id captured at enqueue time, the
    /// linked `server_id` metadata, the draft id itself when it is not a
    /// placeholder. Only when all are absent is `create` invoked, and the
    /// returned id is persisted into the draft's metadata before any
    /// dependent call fires, so a retry after partial failure reuses it
    /// instead of creating a duplicate record.
    async fn resolve_server_id(&self, job: &Job, draft: &Draft) -> Result<ResolvedIdentity> {
        if let Some(server_id) = job.server_qid.clone().or_else(|| draft.server_identity()) {
            return Ok(ResolvedIdentity {
                server_id,
                created: false,
            });
        }

        let created = self.api.create(&draft.data).await?;
        tracing::debug!(
            "Created server record {} for local draft {}",
            created.id,
            draft.id
        );
        self.persist_link(draft, &created.id, DraftStatus::Queued).await?;

        Ok(ResolvedIdentity {
            server_id: created.id,
            created: true,
        })
    }

    /// Merge the server binding (and display metadata) into the local draft
    async fn persist_link(
        &self,
        draft: &Draft,
        server_id: &str,
        status: DraftStatus,
    ) -> Result<()> {
        let mut patch = MetaPatch::default()
            .with_server_id(server_id)
            .with_status(status);
        if let Some(case_number) = draft.case_number() {
            patch = patch.with_case_number(case_number);
        }
        self.drafts.put(&draft.id, &draft.data, patch).await?;
        Ok(())
    }
}
