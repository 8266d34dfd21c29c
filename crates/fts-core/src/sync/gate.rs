//! Connectivity/session gate deciding whether remote operations may run.
//!
//! Connectivity is an explicit value owned by the gate and fed by the host
//! app's online/offline transitions, never read from ambient globals, so
//! the gate's decisions are testable without simulating platform events.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::QuestionnaireApi;

/// Current network reachability as reported by the host app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Online,
    Offline,
}

/// The gate's verdict on whether a sync drain may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Online, device trusted, session confirmed valid
    Ready,
    /// Device is offline
    Offline,
    /// Device has never authenticated online, so queued work may not be
    /// replayed (nor captured) from it
    OfflineNotPermitted,
    /// The session probe was rejected by the server
    SessionRejected,
    /// The session probe failed for a non-auth reason (network, 5xx)
    Unreachable,
}

/// Tracks connectivity transitions and session validity.
///
/// The device-trust flag is set the first time the device authenticates
/// while online; until then offline capture and sync are refused.
pub struct SessionGate {
    online: AtomicBool,
    offline_allowed: AtomicBool,
}

impl SessionGate {
    #[must_use]
    pub fn new(initial: ConnectivityState) -> Self {
        Self {
            online: AtomicBool::new(initial == ConnectivityState::Online),
            offline_allowed: AtomicBool::new(false),
        }
    }

    /// Record a transition-to-online event
    pub fn set_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    /// Record a transition-to-offline event
    pub fn set_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn connectivity(&self) -> ConnectivityState {
        if self.online.load(Ordering::SeqCst) {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    /// Mark this device as having completed an online authentication,
    /// unlocking offline capture and queued-work replay
    pub fn mark_authenticated_online(&self) {
        self.offline_allowed.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn offline_capture_allowed(&self) -> bool {
        self.offline_allowed.load(Ordering::SeqCst)
    }

    /// Decide whether a drain may proceed right now.
    ///
    /// Confirms the session with a lightweight "who am I" probe before
    /// allowing a drain, so an expired session never burns through queued
    /// jobs one failure at a time.
    pub async fn clearance<A: QuestionnaireApi>(&self, api: &A) -> GateStatus {
        if self.connectivity() == ConnectivityState::Offline {
            return GateStatus::Offline;
        }
        if !self.offline_capture_allowed() {
            return GateStatus::OfflineNotPermitted;
        }
        match api.who_am_i().await {
            Ok(_) => GateStatus::Ready,
            Err(error) if error.is_auth() => {
                tracing::warn!("Session probe rejected: {error}");
                GateStatus::SessionRejected
            }
            Err(error) => {
                tracing::debug!("Session probe failed: {error}");
                GateStatus::Unreachable
            }
        }
    }
}
