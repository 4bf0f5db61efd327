use async_trait::async_trait;

use crate::resolver::{AuthorizationContext, ContextListener};

/// Logs every published context with the `log` crate.
///
/// ```rust,ignore
/// use roster::resolver::listeners::LoggingListener;
///
/// let _subscription = resolver.subscribe(LoggingListener::new());
/// ```
pub struct LoggingListener {
    level: log::Level,
}

impl LoggingListener {
    /// Creates a new logging listener at INFO level.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextListener for LoggingListener {
    async fn on_context(&self, context: &AuthorizationContext) {
        log::log!(
            target: "roster::resolver",
            self.level,
            "msg=\"context published\", version={}, user_id={}, roles={}, loading={}",
            context.version,
            context.user_id().unwrap_or("-"),
            context.roles,
            context.is_loading
        );
    }
}
