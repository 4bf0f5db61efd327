//! End-to-end tests for the client-side authorization flow: identity
//! provider events drive the resolver, whose contexts drive route guards
//! and the navigation menu.
//! Run with: `cargo test --features mocks --test e2e_resolver`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roster::crypto::Argon2Hasher;
use roster::{
    AuthError, AuthorizationContext, AuthorizationResolver, ContextListener, DashboardAction,
    DashboardResource, GuardState, Identity, IdentityProvider, InMemoryIdentityProvider,
    MockRoleLookup, NavigationTable, RecordingNavigator, Rendered, Role, RoleLookupResponse,
    RouteTable, SecretString, SessionConfig,
};
use tokio::sync::mpsc;

type Resolver = AuthorizationResolver<InMemoryIdentityProvider, MockRoleLookup>;

struct Forward(mpsc::UnboundedSender<AuthorizationContext>);

#[async_trait]
impl ContextListener for Forward {
    async fn on_context(&self, context: &AuthorizationContext) {
        let _ = self.0.send(context.clone());
    }
}

struct Harness {
    idp: InMemoryIdentityProvider,
    lookup: MockRoleLookup,
    resolver: Arc<Resolver>,
}

impl Harness {
    fn new() -> Self {
        let idp =
            InMemoryIdentityProvider::with_hasher(SessionConfig::default(), Argon2Hasher::fast());
        let lookup = MockRoleLookup::new();
        let resolver = Arc::new(AuthorizationResolver::new(
            Arc::new(idp.clone()),
            lookup.clone(),
        ));

        Self {
            idp,
            lookup,
            resolver,
        }
    }

    fn account(&self, email: &str) -> Identity {
        self.idp.create_account(email, &password()).unwrap()
    }

    async fn sign_in(&self, email: &str) {
        self.idp.sign_in(email, &password()).await.unwrap();
    }

    fn answer(&self, identity: &Identity, roles: &[&str]) {
        self.lookup.push(Ok(RoleLookupResponse::new(
            identity.id.clone(),
            identity.email.clone(),
            roles.iter().copied(),
        )));
    }
}

fn password() -> SecretString {
    SecretString::new("correct horse battery")
}

async fn next(rx: &mut mpsc::UnboundedReceiver<AuthorizationContext>) -> AuthorizationContext {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no context published")
        .expect("listener dropped")
}

fn labels(table: &NavigationTable, context: &AuthorizationContext) -> Vec<String> {
    table
        .visible_entries(context)
        .into_iter()
        .map(|entry| entry.label.clone())
        .collect()
}

#[tokio::test]
async fn test_sign_in_and_sign_out_drive_guard_and_menu() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = harness.resolver.subscribe(Forward(tx));
    let _task = harness.resolver.spawn_session_listener();

    let teacher = harness.account("teacher@school.edu");
    harness.answer(&teacher, &["teacher"]);
    harness.sign_in("teacher@school.edu").await;

    let signed_in = next(&mut rx).await;
    assert!(signed_in.is_authenticated());
    assert_eq!(signed_in.user_id(), Some(teacher.id.as_str()));
    assert!(signed_in.has_role(&Role::TEACHER));

    let navigator = Arc::new(RecordingNavigator::new());
    let mut guard = RouteTable::dashboard().guard("/students", Arc::clone(&navigator));
    assert_eq!(
        guard.render(&signed_in, || "student list"),
        Rendered::Content("student list")
    );

    let menu = NavigationTable::dashboard();
    assert_eq!(
        labels(&menu, &signed_in),
        vec!["Dashboard", "Students", "Add Student"]
    );

    assert!(harness
        .resolver
        .can(&DashboardResource::Student, &DashboardAction::Create));
    assert_eq!(
        harness
            .resolver
            .authorize(&DashboardResource::RoleAssignment, &DashboardAction::Update),
        Err(AuthError::Forbidden)
    );

    harness.idp.sign_out().await.unwrap();

    let signed_out = next(&mut rx).await;
    assert!(!signed_out.is_authenticated());
    assert!(signed_out.version > signed_in.version);

    assert_eq!(guard.render(&signed_out, || "student list"), Rendered::Redirected);
    assert_eq!(guard.observe(&signed_out), GuardState::Denied);
    assert_eq!(navigator.routes(), vec!["/login"]);
    assert_eq!(labels(&menu, &signed_out), vec!["Dashboard"]);
    assert_eq!(
        harness
            .resolver
            .authorize(&DashboardResource::Student, &DashboardAction::Read),
        Err(AuthError::SessionUnavailable)
    );
}

#[tokio::test]
async fn test_loading_between_denials_does_not_redirect_twice() {
    let harness = Harness::new();
    let admin = harness.account("principal@school.edu");
    harness.sign_in("principal@school.edu").await;

    harness.answer(&admin, &["admin"]);
    harness.resolver.resolve().await;

    let navigator = Arc::new(RecordingNavigator::new());
    let mut guard = RouteTable::dashboard().guard("/admin/users", Arc::clone(&navigator));
    let mut watch = harness.resolver.watch();
    assert_eq!(guard.follow(&mut watch).await, GuardState::Allowed);

    // demoted: loading first, then denied with a single redirect
    for _ in 0..2 {
        let release = harness
            .lookup
            .push_held(Ok(RoleLookupResponse::new(
                admin.id.clone(),
                admin.email.clone(),
                ["student"],
            )));
        let resolver = Arc::clone(&harness.resolver);
        let refresh = tokio::spawn(async move { resolver.refresh().await });

        let loading = watch.wait_for(|c| c.is_loading).await.unwrap().clone();
        assert_eq!(guard.render(&loading, || "users"), Rendered::Loading);

        release.send(()).unwrap();
        assert_eq!(guard.follow(&mut watch).await, GuardState::Denied);
        refresh.await.unwrap();

        assert_eq!(navigator.routes(), vec!["/login"]);
    }

    // allowed again, then denied again: a new redirect
    harness.answer(&admin, &["admin"]);
    harness.resolver.refresh().await;
    assert_eq!(guard.follow(&mut watch).await, GuardState::Allowed);

    harness.answer(&admin, &["teacher"]);
    harness.resolver.refresh().await;
    assert_eq!(guard.follow(&mut watch).await, GuardState::Denied);
    assert_eq!(navigator.routes(), vec!["/login", "/login"]);
}

#[tokio::test]
async fn test_superseded_resolution_is_never_published() {
    let harness = Harness::new();
    let user = harness.account("counselor@school.edu");
    harness.sign_in("counselor@school.edu").await;
    harness.answer(&user, &["student"]);
    harness.resolver.resolve().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = harness.resolver.subscribe(Forward(tx));

    let release = harness.lookup.push_held(Ok(RoleLookupResponse::new(
        user.id.clone(),
        user.email.clone(),
        ["admin"],
    )));
    let resolver = Arc::clone(&harness.resolver);
    let stale = tokio::spawn(async move { resolver.resolve().await });

    let mut watch = harness.resolver.watch();
    let first = watch.wait_for(|c| c.is_loading).await.unwrap().version;

    harness.answer(&user, &["counselor"]);
    let fresh = harness.resolver.resolve().await;
    assert_eq!(fresh.version, first + 1);
    assert!(fresh.has_role(&Role::COUNSELOR));

    release.send(()).unwrap();
    let returned = stale.await.unwrap();
    assert_eq!(returned, fresh);
    assert_eq!(harness.resolver.current(), fresh);

    assert_eq!(next(&mut rx).await, fresh);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_token_refresh_keeps_context() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = harness.resolver.subscribe(Forward(tx));
    let _task = harness.resolver.spawn_session_listener();

    let first = harness.account("first@school.edu");
    let second = harness.account("second@school.edu");

    harness.answer(&first, &["student"]);
    harness.sign_in("first@school.edu").await;
    let context = next(&mut rx).await;
    assert_eq!(context.user_id(), Some(first.id.as_str()));
    assert_eq!(harness.lookup.calls(), 1);

    harness.idp.refresh_session().unwrap();

    // a different user signing in on the same provider switches identity
    harness.answer(&second, &["teacher"]);
    harness.sign_in("second@school.edu").await;
    let context = next(&mut rx).await;
    assert_eq!(context.user_id(), Some(second.id.as_str()));
    assert!(context.has_role(&Role::TEACHER));
    assert!(!context.has_role(&Role::STUDENT));

    // the refresh in between caused no lookup of its own
    assert_eq!(harness.lookup.calls(), 2);
}

#[tokio::test]
async fn test_lookup_failure_fails_closed() {
    let harness = Harness::new();
    harness.account("pupil@school.edu");
    harness.sign_in("pupil@school.edu").await;

    harness
        .lookup
        .push(Err(AuthError::RoleLookupFailed("status 500".to_owned())));
    let context = harness.resolver.resolve().await;

    assert!(context.is_authenticated());
    assert!(context.roles.is_empty());

    let navigator = Arc::new(RecordingNavigator::new());
    let routes = RouteTable::dashboard();

    let mut dashboard = routes.guard("/dashboard", Arc::clone(&navigator));
    assert_eq!(dashboard.observe(&context), GuardState::Allowed);

    let mut profile = routes.guard("/profile", Arc::clone(&navigator));
    assert_eq!(profile.observe(&context), GuardState::Denied);
    assert_eq!(navigator.routes(), vec!["/login"]);

    assert_eq!(
        labels(&NavigationTable::dashboard(), &context),
        vec!["Dashboard"]
    );
}

#[tokio::test]
async fn test_undeclared_route_is_denied() {
    let harness = Harness::new();
    let admin = harness.account("principal@school.edu");
    harness.sign_in("principal@school.edu").await;
    harness.answer(&admin, &["admin"]);
    let context = harness.resolver.resolve().await;

    let navigator = Arc::new(RecordingNavigator::new());
    let mut guard = RouteTable::dashboard().guard("/reports/secret", Arc::clone(&navigator));

    assert_eq!(guard.render(&context, || "report"), Rendered::Redirected);
    assert_eq!(navigator.routes(), vec!["/login"]);
}
