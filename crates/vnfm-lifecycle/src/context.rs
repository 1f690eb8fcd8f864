//! Request context passed through every lifecycle operation.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identity of the caller on whose behalf an operation runs.
///
/// The context is cloned into background continuations so that drivers see
/// the same caller identity during the wait phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tenant the request belongs to.
    pub tenant_id: String,
    /// Authenticated user, if any.
    pub user_id: Option<String>,
    /// Whether the caller bypasses tenant scoping.
    pub is_admin: bool,
    /// Correlation ID for logs.
    pub request_id: String,
}

impl RequestContext {
    /// Creates a context for a tenant with a fresh request ID.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: None,
            is_admin: false,
            request_id: format!("req-{}", Ulid::new()),
        }
    }

    /// Creates an administrative context for internal callers such as the
    /// health monitor.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::new("admin")
        }
    }

    /// Sets the authenticated user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns a context for `tenant_id` that keeps this request's
    /// correlation ID and privileges.
    #[must_use]
    pub fn for_tenant(&self, tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_unprivileged() {
        let ctx = RequestContext::new("tenant-a").with_user("alice");
        assert_eq!(ctx.tenant_id, "tenant-a");
        assert_eq!(ctx.user_id.as_deref(), Some("alice"));
        assert!(!ctx.is_admin);
        assert!(ctx.request_id.starts_with("req-"));
    }

    #[test]
    fn for_tenant_keeps_request_id() {
        let admin = RequestContext::admin();
        let scoped = admin.for_tenant("tenant-b");
        assert!(scoped.is_admin);
        assert_eq!(scoped.request_id, admin.request_id);
        assert_eq!(scoped.tenant_id, "tenant-b");
    }
}
