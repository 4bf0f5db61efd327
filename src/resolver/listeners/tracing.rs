use async_trait::async_trait;

use crate::resolver::{AuthorizationContext, ContextListener};

/// Emits every published context as a tracing event.
///
/// Requires the `tracing` feature to be enabled.
pub struct TracingListener;

#[async_trait]
impl ContextListener for TracingListener {
    async fn on_context(&self, context: &AuthorizationContext) {
        tracing::info!(
            target: "roster::resolver",
            version = context.version,
            user_id = context.user_id(),
            roles = %context.roles,
            loading = context.is_loading,
            "context published"
        );
    }
}
