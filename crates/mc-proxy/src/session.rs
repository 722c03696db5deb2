//! Per-connection shared state, guarded by one mutex, exactly as both
//! directions' forwarders expect to find it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mc_protocol::metadata::MetaEntry;
use mc_protocol::Phase;
use tokio::sync::Notify;

use crate::config::{PreferenceValue, Preferences};
use crate::error::{ProxyError, Result};
use crate::status::{StatusCode, StatusSink, TracingStatusSink};

#[derive(Debug, Default)]
struct Target {
    id: Option<i32>,
}

struct Inner {
    phase: Phase,
    compression_threshold: i32,
    player_entity_id: i32,
    login_username: String,
    preferences: Preferences,
    last_effect_metadata: HashMap<i32, MetaEntry>,
    target: Target,
}

/// Shared per-connection state. Every accessor takes the lock itself; no
/// caller holds it across an `.await`. Holds the status sink directly, the
/// way the original `Game` object held a reference to its GUI collaborator
/// and called it straight from inside packet handlers.
pub struct Session {
    inner: Mutex<Inner>,
    pub shutdown: Notify,
    status: Arc<dyn StatusSink>,
}

impl Session {
    #[must_use]
    pub fn new(preferences: Preferences) -> Arc<Session> {
        Session::with_status(preferences, Arc::new(TracingStatusSink))
    }

    #[must_use]
    pub fn with_status(preferences: Preferences, status: Arc<dyn StatusSink>) -> Arc<Session> {
        Arc::new(Session {
            inner: Mutex::new(Inner {
                phase: Phase::Handshake,
                compression_threshold: 0,
                player_entity_id: 0,
                login_username: String::new(),
                preferences,
                last_effect_metadata: HashMap::new(),
                target: Target::default(),
            }),
            shutdown: Notify::new(),
            status,
        })
    }

    pub fn set_status(&self, status: StatusCode) {
        self.status.set_status(status);
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.lock().unwrap().phase
    }

    pub fn set_phase(&self, phase: Phase) {
        self.inner.lock().unwrap().phase = phase;
    }

    #[must_use]
    pub fn compression_threshold(&self) -> i32 {
        self.inner.lock().unwrap().compression_threshold
    }

    #[must_use]
    pub fn compression_enabled(&self) -> bool {
        self.compression_threshold() > 0
    }

    pub fn set_compression_threshold(&self, threshold: i32) -> Result<()> {
        if threshold < 0 {
            return Err(ProxyError::Validation(
                "compression_threshold must be a non-negative int32".to_string(),
            ));
        }
        self.inner.lock().unwrap().compression_threshold = threshold;
        Ok(())
    }

    #[must_use]
    pub fn player_entity_id(&self) -> i32 {
        self.inner.lock().unwrap().player_entity_id
    }

    pub fn set_player_entity_id(&self, id: i32) -> Result<()> {
        if id < 0 {
            return Err(ProxyError::Validation(
                "player_entity_id must be non-negative".to_string(),
            ));
        }
        self.inner.lock().unwrap().player_entity_id = id;
        Ok(())
    }

    #[must_use]
    pub fn login_username(&self) -> String {
        self.inner.lock().unwrap().login_username.clone()
    }

    pub fn set_login_username(&self, name: impl Into<String>) {
        self.inner.lock().unwrap().login_username = name.into();
    }

    pub fn get_preference(&self, name: &str) -> Result<PreferenceValue> {
        self.inner.lock().unwrap().preferences.get(name).cloned()
    }

    pub fn get_preference_or(&self, name: &str, fallback: PreferenceValue) -> PreferenceValue {
        self.inner.lock().unwrap().preferences.get_or(name, fallback)
    }

    pub fn set_preference(&self, name: &str, value: PreferenceValue) -> Result<()> {
        self.inner.lock().unwrap().preferences.set(name, value)
    }

    pub fn cache_effect_metadata(&self, entity_id: i32, entry: MetaEntry) {
        self.inner
            .lock()
            .unwrap()
            .last_effect_metadata
            .insert(entity_id, entry);
    }

    #[must_use]
    pub fn cached_effect_metadata(&self, entity_id: i32) -> Option<MetaEntry> {
        self.inner
            .lock()
            .unwrap()
            .last_effect_metadata
            .get(&entity_id)
            .cloned()
    }

    #[must_use]
    pub fn target_id(&self) -> Option<i32> {
        self.inner.lock().unwrap().target.id
    }

    pub fn set_target_id(&self, id: i32) {
        self.inner.lock().unwrap().target.id = Some(id);
    }

    /// `notify_one`, not `notify_waiters`: exactly one consumer (the
    /// supervisor) ever awaits `shutdown`, and `notify_one` stores a permit
    /// if it fires before that await begins, so a failing receive/send task
    /// can never race the supervisor into waiting forever.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preferences;

    #[test]
    fn rejects_negative_compression_threshold() {
        let session = Session::new(Preferences::with_defaults());
        assert!(session.set_compression_threshold(-1).is_err());
        assert!(session.set_compression_threshold(256).is_ok());
        assert_eq!(session.compression_threshold(), 256);
        assert!(session.compression_enabled());
    }

    #[test]
    fn phase_resets_after_motd_rewrite_is_representable() {
        let session = Session::new(Preferences::with_defaults());
        session.set_phase(Phase::Status);
        session.set_phase(Phase::Handshake);
        assert_eq!(session.phase(), Phase::Handshake);
    }
}
