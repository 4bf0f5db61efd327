use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;

use super::AuthorizationContext;

/// Receives every newly published [`AuthorizationContext`].
///
/// Listeners run one after another in registration order. A listener is
/// never called again until its previous call has returned, and contexts
/// arrive in increasing `version` order; a context superseded before its
/// turn is skipped.
///
/// A listener may call [`refresh`](super::AuthorizationResolver::refresh).
/// The context that refresh publishes is delivered once the current
/// delivery round has finished.
///
/// ```rust,ignore
/// use roster::{AuthorizationContext, ContextListener};
/// use async_trait::async_trait;
///
/// struct MenuRefresher;
///
/// #[async_trait]
/// impl ContextListener for MenuRefresher {
///     async fn on_context(&self, context: &AuthorizationContext) {
///         // rebuild the sidebar from context.roles
///     }
/// }
/// ```
#[async_trait]
pub trait ContextListener: Send + Sync + 'static {
    async fn on_context(&self, context: &AuthorizationContext);
}

type Entry = (u64, Arc<dyn ContextListener>);

pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
    delivery: Mutex<Delivery>,
}

#[derive(Default)]
struct Delivery {
    // version of the last context handed to listeners
    delivered: u64,
    queued: Option<AuthorizationContext>,
    running: bool,
}

/// Clears `running` if a delivery round is dropped midway.
struct RoundGuard<'a> {
    delivery: &'a Mutex<Delivery>,
    armed: bool,
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.delivery
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .running = false;
        }
    }
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
            delivery: Mutex::new(Delivery::default()),
        }
    }

    pub(crate) fn add(self: &Arc<Self>, listener: Arc<dyn ContextListener>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));

        Subscription {
            registry: Arc::downgrade(self),
            id,
            active: true,
        }
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Hands `context` to every listener unless a newer one was delivered
    /// or queued already.
    ///
    /// Only one delivery round runs at a time. A call made while a round is
    /// running, including one from inside a listener, queues its context and
    /// returns; the running round delivers the newest queued context next.
    pub(crate) async fn deliver(&self, context: &AuthorizationContext) {
        {
            let mut delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
            let newest = delivery
                .queued
                .as_ref()
                .map_or(delivery.delivered, |queued| queued.version);
            if context.version <= newest {
                return;
            }
            delivery.queued = Some(context.clone());
            if delivery.running {
                return;
            }
            delivery.running = true;
        }

        let mut guard = RoundGuard {
            delivery: &self.delivery,
            armed: true,
        };

        loop {
            let next = {
                let mut delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
                match delivery.queued.take() {
                    Some(next) => {
                        delivery.delivered = next.version;
                        next
                    }
                    None => {
                        delivery.running = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            for listener in self.snapshot() {
                listener.on_context(&next).await;
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ContextListener>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Handle returned by
/// [`AuthorizationResolver::subscribe`](super::AuthorizationResolver::subscribe).
///
/// Dropping the handle unsubscribes. [`unsubscribe`](Self::unsubscribe) may
/// be called any number of times.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active && self.registry.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
