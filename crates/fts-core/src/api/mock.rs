//! Recording fake of the questionnaire API for tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Notify;

use super::{ApiError, ApiResult, CreatedQuestionnaire, QuestionnaireApi, SessionInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiCall {
    Create(Value),
    Update(String),
    Finalize(String),
    WhoAmI,
}

/// Records every call and can fail individual operations on demand.
#[derive(Default)]
pub(crate) struct MockApi {
    calls: Mutex<Vec<ApiCall>>,
    created: AtomicU32,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    fail_finalize: AtomicBool,
    reject_session: AtomicBool,
    fail_probe: AtomicBool,
    update_hold: Mutex<Option<Arc<Notify>>>,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_reject_session(&self, reject: bool) {
        self.reject_session.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_probe(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    /// Park the next `update` call until `hold` is notified, so a caller
    /// can be observed mid-flight
    pub(crate) fn hold_next_update(&self, hold: Arc<Notify>) {
        *self.update_hold.lock().unwrap() = Some(hold);
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made, excluding the session probe
    pub(crate) fn mutation_calls(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != ApiCall::WhoAmI)
            .collect()
    }

    pub(crate) fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::Create(_)))
            .count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl QuestionnaireApi for MockApi {
    async fn create(&self, data: &Value) -> ApiResult<CreatedQuestionnaire> {
        self.record(ApiCall::Create(data.clone()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ApiError::Api("create failed (503)".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CreatedQuestionnaire {
            id: format!("srv-{n}"),
            case_number: data
                .get("case_number")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            version: 1,
        })
    }

    async fn update(&self, id: &str, _data: &Value) -> ApiResult<()> {
        self.record(ApiCall::Update(id.to_string()));
        let hold = self.update_hold.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ApiError::Api("update failed (503)".to_string()));
        }
        Ok(())
    }

    async fn finalize(&self, id: &str) -> ApiResult<String> {
        self.record(ApiCall::Finalize(id.to_string()));
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(ApiError::Api("finalize failed (503)".to_string()));
        }
        Ok(id.to_string())
    }

    async fn who_am_i(&self) -> ApiResult<SessionInfo> {
        self.record(ApiCall::WhoAmI);
        if self.reject_session.load(Ordering::SeqCst) {
            return Err(ApiError::Auth("Not logged in (401)".to_string()));
        }
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(ApiError::Api("connection reset (502)".to_string()));
        }
        Ok(SessionInfo {
            email: Some("staff@fts.example".to_string()),
            role: Some("user".to_string()),
        })
    }
}
