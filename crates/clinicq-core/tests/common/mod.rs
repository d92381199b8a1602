//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use clinicq_core::api::{ApiClient, Navigator, Notifier};
use clinicq_core::auth::{CredentialPair, MemoryStore, Session};
use clinicq_core::config::ApiConfig;

/// Captures notifications and navigations instead of presenting them
#[derive(Clone, Default)]
pub struct Recorder {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
    routes: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn error(&self, title: &str, description: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), description.to_string()));
    }
}

impl Navigator for Recorder {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

pub struct Harness {
    pub api: ApiClient,
    pub session: Session,
    pub recorder: Recorder,
}

/// Client against `base_url` with an in-memory session, optionally logged in
pub fn harness(base_url: &str, pair: Option<CredentialPair>) -> Harness {
    let session = Session::new(Arc::new(MemoryStore::new()));
    if let Some(pair) = pair {
        session.establish(&pair).unwrap();
    }

    let recorder = Recorder::default();
    let api = ApiClient::new(&ApiConfig::new(base_url), session.clone())
        .unwrap()
        .with_notifier(recorder.clone())
        .with_navigator(recorder.clone());

    Harness {
        api,
        session,
        recorder,
    }
}

pub fn expired_pair() -> CredentialPair {
    CredentialPair::new("a-1", "r-1")
}
