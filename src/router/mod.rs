pub mod error;
pub mod resolver;

use std::sync::Arc;
use tracing::debug;

use crate::database::cache::ConnectionCache;
use crate::database::establisher::Establish;
use crate::database::handle::ConnectionHandle;
use crate::registry::InstituteRegistry;

pub use error::RouterError;
pub use resolver::{normalize_code, InstituteResolver};

/// Per-request tenant context: the resolved connection handle plus the
/// normalized institute code. Attached to the request, discarded with it.
#[derive(Debug, Clone)]
pub struct RequestInstituteContext {
    pub institute_code: String,
    pub handle: Arc<ConnectionHandle>,
}

/// The request entry point of the routing subsystem.
///
/// Composes the resolver (identifier -> record, with the lookup cache) and
/// the connection cache (record -> healthy handle, single-flight). Failures
/// propagate typed and untouched; nothing is retried here.
pub struct InstituteRouter {
    resolver: InstituteResolver,
    connections: ConnectionCache,
}

impl InstituteRouter {
    pub fn new(registry: Arc<dyn InstituteRegistry>, establisher: Arc<dyn Establish>) -> Self {
        Self {
            resolver: InstituteResolver::new(registry),
            connections: ConnectionCache::new(establisher),
        }
    }

    /// Resolve a raw tenant identifier into a request context.
    pub async fn route(&self, raw_identifier: &str) -> Result<RequestInstituteContext, RouterError> {
        let record = self.resolver.resolve(raw_identifier).await?;
        let handle = self.connections.handle_for(&record).await?;

        debug!(
            "Routed institute {} to database: {}",
            record.institute_code,
            handle.db_name()
        );

        Ok(RequestInstituteContext {
            institute_code: record.institute_code.clone(),
            handle,
        })
    }

    pub fn resolver(&self) -> &InstituteResolver {
        &self.resolver
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    /// Close every cached connection (shutdown path).
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEstablisher, FakeRegistry};

    fn router_with(
        registry: FakeRegistry,
        establisher: FakeEstablisher,
    ) -> (Arc<InstituteRouter>, Arc<FakeRegistry>, Arc<FakeEstablisher>) {
        let registry = Arc::new(registry);
        let establisher = Arc::new(establisher);
        let router = Arc::new(InstituteRouter::new(registry.clone(), establisher.clone()));
        (router, registry, establisher)
    }

    #[tokio::test]
    async fn routes_identifier_to_context() {
        let (router, registry, establisher) = router_with(
            FakeRegistry::with_institute("ABC", "abc_db", "postgres://localhost/{dbname}"),
            FakeEstablisher::new(),
        );

        let context = router.route(" abc ").await.unwrap();
        assert_eq!(context.institute_code, "ABC");
        assert_eq!(context.handle.db_name(), "abc_db");
        assert!(context.handle.is_healthy());
        assert_eq!(registry.calls(), 1);
        assert_eq!(establisher.calls(), 1);
    }

    #[tokio::test]
    async fn repeat_requests_reuse_record_and_handle() {
        let (router, registry, establisher) = router_with(
            FakeRegistry::with_institute("ABC", "abc_db", "postgres://localhost/{dbname}"),
            FakeEstablisher::new(),
        );

        let first = router.route("ABC").await.unwrap();
        let second = router.route("abc").await.unwrap();

        assert!(Arc::ptr_eq(&first.handle, &second.handle));
        assert_eq!(registry.calls(), 1);
        assert_eq!(establisher.calls(), 1);
    }

    #[tokio::test]
    async fn missing_identifier_fails_before_any_collaborator() {
        let (router, registry, establisher) = router_with(
            FakeRegistry::with_institute("ABC", "abc_db", "postgres://localhost/{dbname}"),
            FakeEstablisher::new(),
        );

        let err = router.route("").await.unwrap_err();
        assert_eq!(err, RouterError::MissingIdentifier);
        assert_eq!(registry.calls(), 0);
        assert_eq!(establisher.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_institute_never_reaches_the_establisher() {
        let (router, _registry, establisher) =
            router_with(FakeRegistry::empty(), FakeEstablisher::new());

        let err = router.route("ghost").await.unwrap_err();
        assert_eq!(err, RouterError::TenantNotFound("GHOST".to_string()));
        assert_eq!(establisher.calls(), 0);
    }

    #[tokio::test]
    async fn establishment_failure_leaves_connection_cache_empty() {
        let (router, _registry, establisher) = router_with(
            FakeRegistry::with_institute("ABC", "abc_db", "postgres://localhost/{dbname}"),
            FakeEstablisher::new().failing(),
        );

        let err = router.route("abc").await.unwrap_err();
        assert!(matches!(err, RouterError::ConnectionUnreachable { .. }));
        assert!(router.connections().is_empty().await);
        assert_eq!(establisher.calls(), 1);
    }
}
