//! Authorization resolution.
//!
//! The [`AuthorizationResolver`] reads the current session, fetches its role
//! set from the backend and publishes the result as an
//! [`AuthorizationContext`] on a `tokio::sync::watch` channel. Guards and the
//! navigation menu read receivers of that channel; listeners registered with
//! [`AuthorizationResolver::subscribe`] are called with every newly published
//! context.
//!
//! # Failure handling
//!
//! Resolution never fails. Every error collapses to a context that grants
//! nothing:
//!
//! | Situation | Published context |
//! |-----------|-------------------|
//! | no session, expired session, provider error | signed out |
//! | lookup transport error, non-200, bad body | identity, no roles |
//! | lookup answers for a different identity | identity, no roles |
//!
//! # Ordering
//!
//! Every call to [`resolve`](AuthorizationResolver::resolve) takes a ticket
//! and publishes a loading context carrying it. The finished context is
//! published only if no newer call is still running and none has published
//! since; otherwise the result is dropped and the caller gets whatever is
//! currently published.
//!
//! A call whose future is dropped gives its ticket up. When the last
//! running call is gone without publishing, the last published resolution
//! is restored under the loading context's version, so the context never
//! stays loading for work nobody is doing.

mod context;
mod listener;
pub mod listeners;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::AuthError;
use crate::identity::{IdentityProvider, SessionEvent};
use crate::lookup::RoleLookup;
use crate::roles::{DashboardAction, DashboardResource, RolePolicy, RoleSet};

pub use context::AuthorizationContext;
pub use listener::{ContextListener, Subscription};

use listener::ListenerRegistry;

const LOG_TARGET: &str = "roster::resolver";

/// Produces and distributes the [`AuthorizationContext`].
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use roster::{AuthorizationResolver, HttpRoleLookup, InMemoryIdentityProvider};
///
/// let provider = Arc::new(InMemoryIdentityProvider::default());
/// let lookup = HttpRoleLookup::new(&config.backend)?;
/// let resolver = Arc::new(AuthorizationResolver::new(provider, lookup));
///
/// resolver.resolve().await;
/// let _session_task = resolver.spawn_session_listener();
/// ```
pub struct AuthorizationResolver<P, L> {
    provider: Arc<P>,
    lookup: L,
    policy: RolePolicy,
    state: watch::Sender<AuthorizationContext>,
    tickets: Mutex<Tickets>,
    listeners: Arc<ListenerRegistry>,
}

#[derive(Default)]
struct Tickets {
    // tickets whose resolution is still running
    running: BTreeSet<u64>,
    // ticket of the last published resolution and what it published
    published: Option<(u64, AuthorizationContext)>,
}

impl Tickets {
    fn supersedes(&self, ticket: u64) -> bool {
        self.running.last().is_some_and(|&newest| newest > ticket)
            || self.published.as_ref().is_some_and(|(last, _)| *last > ticket)
    }

    /// Puts the last published resolution back once nothing is running.
    fn restore(&self, current: &mut AuthorizationContext) -> bool {
        if !current.is_loading || !self.running.is_empty() {
            return false;
        }
        match &self.published {
            Some((_, published)) => {
                *current = AuthorizationContext {
                    version: current.version,
                    ..published.clone()
                };
                true
            }
            None => false,
        }
    }
}

fn lock(tickets: &Mutex<Tickets>) -> MutexGuard<'_, Tickets> {
    tickets.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A started resolution. Dropping it unfinished gives the ticket up.
struct Ticket<'a> {
    version: u64,
    state: &'a watch::Sender<AuthorizationContext>,
    tickets: &'a Mutex<Tickets>,
    open: bool,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }

        let version = self.version;
        let tickets = self.tickets;
        let restored = self.state.send_if_modified(|current| {
            let mut tickets = lock(tickets);
            tickets.running.remove(&version);
            tickets.restore(current)
        });

        log::debug!(
            target: LOG_TARGET,
            "msg=\"resolution abandoned\", version={version}, restored={restored}"
        );
    }
}

impl<P, L> AuthorizationResolver<P, L>
where
    P: IdentityProvider,
    L: RoleLookup,
{
    /// Creates a resolver with the dashboard [`RolePolicy`]. The initial
    /// context is loading until the first [`resolve`](Self::resolve).
    pub fn new(provider: Arc<P>, lookup: L) -> Self {
        let (state, _) = watch::channel(AuthorizationContext::default());
        Self {
            provider,
            lookup,
            policy: RolePolicy::dashboard(),
            state,
            tickets: Mutex::new(Tickets::default()),
            listeners: Arc::new(ListenerRegistry::new()),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RolePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Recomputes the context from the current session.
    ///
    /// Returns the context this call published, or the currently published
    /// context if a newer call started first.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "resolve", skip_all))]
    pub async fn resolve(&self) -> AuthorizationContext {
        let ticket = self.begin();
        let resolved = self.compute(ticket.version).await;
        self.finish(ticket, resolved).await
    }

    /// Explicit refresh, e.g. after an admin changed role assignments.
    pub async fn refresh(&self) -> AuthorizationContext {
        log::debug!(target: LOG_TARGET, "msg=\"refresh requested\"");
        self.resolve().await
    }

    /// The currently published context.
    pub fn current(&self) -> AuthorizationContext {
        self.state.borrow().clone()
    }

    /// A receiver of the published context.
    pub fn watch(&self) -> watch::Receiver<AuthorizationContext> {
        self.state.subscribe()
    }

    /// Registers a listener for newly published contexts.
    pub fn subscribe(&self, listener: impl ContextListener) -> Subscription {
        self.listeners.add(Arc::new(listener))
    }

    /// Registers a listener shared with other owners.
    pub fn subscribe_arc(&self, listener: Arc<dyn ContextListener>) -> Subscription {
        self.listeners.add(listener)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Policy decision for the current context.
    pub fn can(&self, resource: &DashboardResource, action: &DashboardAction) -> bool {
        self.state.borrow().can(&self.policy, resource, action)
    }

    /// # Errors
    ///
    /// `SessionUnavailable` while loading or signed out, `Forbidden` when no
    /// resolved role grants the action.
    pub fn authorize(
        &self,
        resource: &DashboardResource,
        action: &DashboardAction,
    ) -> Result<(), AuthError> {
        self.state
            .borrow()
            .authorize(&self.policy, resource, action)
    }

    fn begin(&self) -> Ticket<'_> {
        let mut version = 0;
        self.state.send_modify(|ctx| {
            version = ctx.version + 1;
            *ctx = AuthorizationContext::loading(version);
            lock(&self.tickets).running.insert(version);
        });

        Ticket {
            version,
            state: &self.state,
            tickets: &self.tickets,
            open: true,
        }
    }

    async fn compute(&self, ticket: u64) -> AuthorizationContext {
        let session = match self.provider.get_session().await {
            Ok(Some(session)) if !session.is_expired() => session,
            Ok(_) => return AuthorizationContext::signed_out(ticket),
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "msg=\"session read failed, treating as signed out\", error=\"{err}\""
                );
                return AuthorizationContext::signed_out(ticket);
            }
        };

        let roles = match self.lookup.lookup(&session.token).await {
            Ok(response) if response.id == session.identity.id => response.role_set(),
            Ok(response) => {
                log::warn!(
                    target: LOG_TARGET,
                    "msg=\"role lookup answered for another identity\", user_id={}, returned_id={}",
                    session.identity.id,
                    response.id
                );
                RoleSet::new()
            }
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "msg=\"role lookup failed\", user_id={}, error=\"{err}\"",
                    session.identity.id
                );
                RoleSet::new()
            }
        };

        AuthorizationContext::authenticated(session.identity, roles, ticket)
    }

    async fn finish(
        &self,
        mut ticket: Ticket<'_>,
        resolved: AuthorizationContext,
    ) -> AuthorizationContext {
        ticket.open = false;
        let version = ticket.version;

        let mut published = None;
        self.state.send_if_modified(|current| {
            let mut tickets = lock(&self.tickets);
            tickets.running.remove(&version);

            if !tickets.supersedes(version) && current.is_loading {
                // stamped with the loading version so versions never go back
                let context = AuthorizationContext {
                    version: current.version,
                    ..resolved
                };
                tickets.published = Some((version, context.clone()));
                *current = context.clone();
                published = Some(context);
                true
            } else if tickets.restore(current) {
                published = Some(current.clone());
                true
            } else {
                false
            }
        });

        let Some(published) = published else {
            log::debug!(
                target: LOG_TARGET,
                "msg=\"resolution superseded\", ticket={version}"
            );
            return self.current();
        };

        log::debug!(
            target: LOG_TARGET,
            "msg=\"context resolved\", ticket={}, version={}, user_id={}, roles={}",
            version,
            published.version,
            published.user_id().unwrap_or("-"),
            published.roles
        );

        self.listeners.deliver(&published).await;
        published
    }

    /// Resolves once per session transition announced by the provider.
    ///
    /// Sign-in, sign-out and a change of identity each cause exactly one
    /// [`resolve`](Self::resolve). Token refreshes and repeated events for
    /// the same subject cause none. The task ends when the provider's event
    /// channel closes; abort the handle to stop it earlier.
    pub fn spawn_session_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        let mut events = self.provider.session_events();
        let mut subject = self.current().user_id().map(str::to_owned);

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!(
                            target: LOG_TARGET,
                            "msg=\"session events lagged\", skipped={skipped}"
                        );
                        let ctx = resolver.resolve().await;
                        subject = ctx.user_id().map(str::to_owned);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if matches!(event, SessionEvent::TokenRefreshed(_)) {
                    continue;
                }

                let next = event.subject().map(str::to_owned);
                if next == subject {
                    continue;
                }

                log::info!(
                    target: LOG_TARGET,
                    "msg=\"session transition\", event={}, user_id={}",
                    event.name(),
                    next.as_deref().unwrap_or("-")
                );

                subject = next;
                resolver.resolve().await;
            }
        })
    }
}
