#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RoleLookup, RoleLookupResponse};
use crate::AuthError;
use crate::secret::BearerToken;

type LookupResult = Result<RoleLookupResponse, AuthError>;

struct Scripted {
    response: LookupResult,
    gate: Option<oneshot::Receiver<()>>,
}

/// In-memory [`RoleLookup`].
///
/// Answers from a per-token table. Responses queued with [`push`] or
/// [`push_held`] take precedence and are consumed one per call, in order,
/// whatever the token; held responses wait until their sender fires or is
/// dropped.
///
/// [`push`]: MockRoleLookup::push
/// [`push_held`]: MockRoleLookup::push_held
#[derive(Clone, Default)]
pub struct MockRoleLookup {
    by_token: Arc<Mutex<HashMap<String, LookupResult>>>,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<AtomicUsize>,
}

impl MockRoleLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&self, token: &BearerToken, response: LookupResult) {
        self.by_token
            .lock()
            .unwrap()
            .insert(token.expose_secret().to_owned(), response);
    }

    /// Answers `token` with `200 {id, roles}`.
    pub fn set_roles(&self, token: &BearerToken, id: &str, roles: &[&str]) {
        self.set_response(
            token,
            Ok(RoleLookupResponse::new(id, "", roles.iter().copied())),
        );
    }

    pub fn push(&self, response: LookupResult) {
        self.script.lock().unwrap().push_back(Scripted {
            response,
            gate: None,
        });
    }

    /// Queues a response released by the returned sender.
    pub fn push_held(&self, response: LookupResult) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.script.lock().unwrap().push_back(Scripted {
            response,
            gate: Some(gate),
        });
        release
    }

    /// Number of lookups started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleLookup for MockRoleLookup {
    async fn lookup(&self, token: &BearerToken) -> LookupResult {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.script.lock().unwrap().pop_front();
        if let Some(scripted) = scripted {
            if let Some(gate) = scripted.gate {
                let _ = gate.await;
            }
            return scripted.response;
        }

        self.by_token
            .lock()
            .unwrap()
            .get(token.expose_secret())
            .cloned()
            .unwrap_or_else(|| Err(AuthError::RoleLookupFailed("status 401".to_owned())))
    }
}
