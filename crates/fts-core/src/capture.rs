//! Draft capture: the user-facing save/submit decision.
//!
//! Saving is an explicit two-branch decision rather than exception-driven
//! control flow: try the remote API first while online, and fall back to
//! the local store plus an outbox job otherwise. The discriminated
//! [`SaveOutcome`] tells the caller which branch ran.

use serde_json::Value;

use crate::api::QuestionnaireApi;
use crate::db::{DraftStore, OutboxQueue};
use crate::error::{Error, Result};
use crate::models::{case_number_of, DraftId, DraftStatus, Job, JobId, MetaPatch};
use crate::sync::gate::{ConnectivityState, SessionGate};

/// Where a save/submit landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server accepted the operation directly
    Remote { server_id: String },
    /// The operation was captured locally for later replay
    Queued { draft_id: DraftId, job_id: JobId },
}

/// What a queued job should eventually do
enum Intent {
    Save,
    Submit,
}

/// Capture service over the draft store, outbox, and remote API
pub struct DraftCapture<'a, D, Q, A> {
    drafts: &'a D,
    outbox: &'a Q,
    api: &'a A,
    gate: &'a SessionGate,
}

impl<'a, D, Q, A> DraftCapture<'a, D, Q, A>
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
        }
    }

    /// Save a draft without finalizing it
    pub async fn save(&self, id: Option<DraftId>, data: &Value) -> Result<SaveOutcome> {
        self.capture(id, data, Intent::Save).await
    }

    /// Submit a draft: push the latest payload and lock it server-side
    pub async fn submit(&self, id: Option<DraftId>, data: &Value) -> Result<SaveOutcome> {
        self.capture(id, data, Intent::Submit).await
    }

    async fn capture(&self, id: Option<DraftId>, data: &Value, intent: Intent) -> Result<SaveOutcome> {
        let known = self.known_server_id(id.as_ref()).await?;

        if self.gate.connectivity() == ConnectivityState::Online {
            match self.try_remote(known.as_deref(), data, &intent).await {
                Ok(server_id) => return Ok(SaveOutcome::Remote { server_id }),
                Err(error) => {
                    // A device that has never authenticated online may not
                    // queue work with cached credentials
                    if !self.gate.offline_capture_allowed() {
                        return Err(error.into());
                    }
                    tracing::warn!("Remote capture failed, queueing locally: {error}");
                }
            }
        } else if !self.gate.offline_capture_allowed() {
            return Err(Error::OfflineNotPermitted);
        }

        self.queue_local(id, known, data, &intent).await
    }

    /// Best-known server id for the draft being captured: the id itself
    /// when it is a server id, else the local record's linked metadata
    async fn known_server_id(&self, id: Option<&DraftId>) -> Result<Option<String>> {
        let Some(id) = id else { return Ok(None) };
        if let Some(server_id) = id.as_server_id() {
            return Ok(Some(server_id.to_string()));
        }
        Ok(self
            .drafts
            .get(id)
            .await?
            .and_then(|draft| draft.meta.server_id))
    }

    async fn try_remote(
        &self,
        known: Option<&str>,
        data: &Value,
        intent: &Intent,
    ) -> crate::api::ApiResult<String> {
        let server_id = match known {
            Some(server_id) => {
                self.api.update(server_id, data).await?;
                server_id.to_string()
            }
            None => self.api.create(data).await?.id,
        };
        if matches!(intent, Intent::Submit) {
            self.api.finalize(&server_id).await?;
        }
        Ok(server_id)
    }

    async fn queue_local(
        &self,
        id: Option<DraftId>,
        known: Option<String>,
        data: &Value,
        intent: &Intent,
    ) -> Result<SaveOutcome> {
        let fresh = id.is_none();
        let draft_id = id.unwrap_or_else(DraftId::new_local);

        let status = match intent {
            Intent::Save if fresh => DraftStatus::LocalDraft,
            _ => DraftStatus::Queued,
        };
        let mut patch = MetaPatch::default().with_status(status);
        if let Some(case_number) = case_number_of(data) {
            patch = patch.with_case_number(case_number);
        }
        if let Some(server_id) = &known {
            patch = patch.with_server_id(server_id.clone());
        }
        let draft = self.drafts.put(&draft_id, data, patch).await?;

        let mut job = match intent {
            Intent::Save => Job::save(draft_id.clone()),
            Intent::Submit => Job::finalize(draft_id.clone()),
        };
        if let Some(server_id) = draft.server_identity() {
            job = job.with_server_hint(server_id);
        }
        self.outbox.enqueue(&job).await?;

        tracing::debug!("Queued {} job {} for draft {draft_id}", job.kind, job.id);

        Ok(SaveOutcome::Queued {
            draft_id,
            job_id: job.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{ApiCall, MockApi};
    use crate::db::{Database, LibSqlDraftStore, LibSqlOutbox};
    use crate::models::JobKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        db: Database,
        api: MockApi,
        gate: SessionGate,
    }

    impl Fixture {
        async fn new(initial: ConnectivityState) -> Self {
            let gate = SessionGate::new(initial);
            gate.mark_authenticated_online();
            Self {
                db: Database::open_in_memory().await.unwrap(),
                api: MockApi::new(),
                gate,
            }
        }

        fn drafts(&self) -> LibSqlDraftStore<'_> {
            LibSqlDraftStore::new(self.db.connection())
        }

        fn outbox(&self) -> LibSqlOutbox<'_> {
            LibSqlOutbox::new(self.db.connection())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_online_save_goes_remote() {
        let fixture = Fixture::new(ConnectivityState::Online).await;
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();
        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &fixture.gate);

        let outcome = capture
            .save(None, &json!({"case_number": "C-10"}))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Remote {
                server_id: "srv-1".to_string()
            }
        );
        assert_eq!(outbox.len().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_online_save_with_known_id_updates() {
        let fixture = Fixture::new(ConnectivityState::Online).await;
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();
        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &fixture.gate);

        let id: DraftId = "srv-77".parse().unwrap();
        let outcome = capture.save(Some(id), &json!({})).await.unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Remote {
                server_id: "srv-77".to_string()
            }
        );
        assert_eq!(
            fixture.api.calls(),
            vec![ApiCall::Update("srv-77".to_string())]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_online_submit_finalizes() {
        let fixture = Fixture::new(ConnectivityState::Online).await;
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();
        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &fixture.gate);

        let outcome = capture
            .submit(None, &json!({"case_number": "C-11"}))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Remote {
                server_id: "srv-1".to_string()
            }
        );
        assert!(fixture
            .api
            .calls()
            .contains(&ApiCall::Finalize("srv-1".to_string())));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_save_queues_locally() {
        let fixture = Fixture::new(ConnectivityState::Offline).await;
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();
        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &fixture.gate);

        let data = json!({"case_number": "C-100"});
        let outcome = capture.save(None, &data).await.unwrap();

        let SaveOutcome::Queued { draft_id, job_id } = outcome else {
            panic!("expected queued outcome");
        };
        assert!(draft_id.is_local());
        assert!(fixture.api.calls().is_empty());

        let draft = drafts.get(&draft_id).await.unwrap().unwrap();
        assert_eq!(draft.meta.status, DraftStatus::LocalDraft);
        assert_eq!(draft.meta.case_number.as_deref(), Some("C-100"));

        let jobs = outbox.dequeue_all().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job_id);
        assert_eq!(jobs[0].kind, JobKind::Save);
        assert_eq!(jobs[0].draft_id, draft_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_failure_falls_back_to_queue() {
        let fixture = Fixture::new(ConnectivityState::Online).await;
        fixture.api.set_fail_create(true);
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();
        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &fixture.gate);

        let outcome = capture.submit(None, &json!({})).await.unwrap();

        assert!(matches!(outcome, SaveOutcome::Queued { .. }));
        let jobs = outbox.dequeue_all().await.unwrap();
        assert_eq!(jobs[0].kind, JobKind::Finalize);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_untrusted_device_is_refused() {
        let fixture = Fixture::new(ConnectivityState::Offline).await;
        let gate = SessionGate::new(ConnectivityState::Offline); // never authenticated
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();
        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &gate);

        let error = capture.save(None, &json!({})).await.unwrap_err();
        assert!(matches!(error, Error::OfflineNotPermitted));
        assert_eq!(outbox.len().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queued_job_carries_server_hint() {
        let fixture = Fixture::new(ConnectivityState::Offline).await;
        let drafts = fixture.drafts();
        let outbox = fixture.outbox();

        // Draft already linked to a server record from an earlier sync
        let id = DraftId::new_local();
        drafts
            .put(
                &id,
                &json!({}),
                MetaPatch::default().with_server_id("srv-5"),
            )
            .await
            .unwrap();

        let capture = DraftCapture::new(&drafts, &outbox, &fixture.api, &fixture.gate);
        capture.save(Some(id), &json!({})).await.unwrap();

        let jobs = outbox.dequeue_all().await.unwrap();
        assert_eq!(jobs[0].server_qid.as_deref(), Some("srv-5"));
    }
}
