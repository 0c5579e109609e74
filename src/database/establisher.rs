use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{self, DatabaseConfig};
use crate::database::handle::ConnectionHandle;
use crate::database::models::Institute;
use crate::router::error::RouterError;
use crate::schema::SchemaRegistry;

/// Placeholder token substituted with the tenant's `db_name`.
pub const DB_NAME_TOKEN: &str = "{dbname}";

/// Builds a validated connection handle from a tenant record.
///
/// A trait so the connection cache can be exercised without a live database.
#[async_trait]
pub trait Establish: Send + Sync {
    async fn establish(&self, institute: &Institute) -> Result<Arc<ConnectionHandle>, RouterError>;
}

/// Production establisher: substitutes the template, opens a pool, registers
/// the shared models, then probes the target. The whole sequence, connect
/// through probe, runs under one `connect_timeout_secs` deadline.
pub struct PgEstablisher {
    schemas: Arc<SchemaRegistry>,
    database: DatabaseConfig,
}

impl PgEstablisher {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self::with_database(schemas, config::config().database.clone())
    }

    /// Establisher with explicit database settings instead of the process
    /// config singleton.
    pub fn with_database(schemas: Arc<SchemaRegistry>, database: DatabaseConfig) -> Self {
        Self { schemas, database }
    }

    /// Substitute `db_name` into the tenant's connection template.
    ///
    /// A blank template, a template without the `{dbname}` token, or one that
    /// does not parse as a URL all mean the tenant record cannot yield a
    /// usable target.
    pub fn build_target(institute: &Institute) -> Result<String, RouterError> {
        let template = institute.connection_template.trim();
        if template.is_empty() || !template.contains(DB_NAME_TOKEN) {
            return Err(RouterError::MissingConnectionTemplate(
                institute.institute_code.clone(),
            ));
        }

        let target = template.replace(DB_NAME_TOKEN, &institute.db_name);
        url::Url::parse(&target).map_err(|_| {
            RouterError::MissingConnectionTemplate(institute.institute_code.clone())
        })?;
        Ok(target)
    }

    /// Liveness and non-emptiness probe. A target with zero user tables is a
    /// provisioning error, distinct from a network fault.
    async fn probe(handle: &ConnectionHandle) -> Result<(), RouterError> {
        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public'",
        )
        .fetch_one(handle.pool())
        .await
        .map_err(|e| RouterError::ConnectionUnreachable {
            db_name: handle.db_name().to_string(),
            reason: e.to_string(),
        })?;

        if tables == 0 {
            return Err(RouterError::DatabaseEmptyOrUninitialized(
                handle.db_name().to_string(),
            ));
        }
        Ok(())
    }

    /// Post-open validation under the remaining establishment deadline:
    /// register the shared models, then probe the target. The pool is open
    /// here, so any failure closes it before returning - no session outlives
    /// a failed establishment.
    async fn validate(
        &self,
        handle: &Arc<ConnectionHandle>,
        deadline: Instant,
    ) -> Result<(), RouterError> {
        self.schemas.register_on(handle);

        let probed = match tokio::time::timeout_at(deadline, Self::probe(handle)).await {
            Ok(result) => result,
            Err(_) => Err(RouterError::ConnectionUnreachable {
                db_name: handle.db_name().to_string(),
                reason: format!(
                    "validation timed out after {}s",
                    self.database.connect_timeout_secs
                ),
            }),
        };

        if let Err(e) = probed {
            warn!("Validation failed for database {}: {}", handle.db_name(), e);
            handle.mark_errored();
            handle.pool().close().await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl Establish for PgEstablisher {
    async fn establish(&self, institute: &Institute) -> Result<Arc<ConnectionHandle>, RouterError> {
        let target = Self::build_target(institute)?;

        // One deadline bounds the whole establishment; a server that accepts
        // the connect and then stalls must not hang the callers joined on
        // this flight
        let deadline =
            Instant::now() + Duration::from_secs(self.database.connect_timeout_secs);

        let connect = PgPoolOptions::new()
            .max_connections(self.database.max_connections)
            .acquire_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
            .connect(&target);

        let pool = match tokio::time::timeout_at(deadline, connect).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                return Err(RouterError::ConnectionUnreachable {
                    db_name: institute.db_name.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(RouterError::ConnectionUnreachable {
                    db_name: institute.db_name.clone(),
                    reason: format!(
                        "connect timed out after {}s",
                        self.database.connect_timeout_secs
                    ),
                })
            }
        };

        let handle = Arc::new(ConnectionHandle::new(institute.db_name.clone(), pool));
        self.validate(&handle, deadline).await?;

        handle.mark_connected();
        info!("Established connection for database: {}", institute.db_name);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_institute;

    fn tight_database() -> DatabaseConfig {
        DatabaseConfig {
            max_connections: 1,
            connect_timeout_secs: 1,
            acquire_timeout_secs: 1,
        }
    }

    #[test]
    fn substitutes_db_name_into_template() {
        let institute = test_institute("ABC", "abc_db", "postgres://localhost:5432/{dbname}");
        let target = PgEstablisher::build_target(&institute).unwrap();
        assert_eq!(target, "postgres://localhost:5432/abc_db");
    }

    #[test]
    fn rejects_blank_template() {
        let institute = test_institute("ABC", "abc_db", "   ");
        assert_eq!(
            PgEstablisher::build_target(&institute),
            Err(RouterError::MissingConnectionTemplate("ABC".to_string()))
        );
    }

    #[test]
    fn rejects_template_without_token() {
        let institute = test_institute("ABC", "abc_db", "postgres://localhost:5432/fixed");
        assert!(matches!(
            PgEstablisher::build_target(&institute),
            Err(RouterError::MissingConnectionTemplate(_))
        ));
    }

    #[test]
    fn rejects_template_that_is_not_a_url() {
        let institute = test_institute("ABC", "abc_db", "not a url {dbname}");
        assert!(matches!(
            PgEstablisher::build_target(&institute),
            Err(RouterError::MissingConnectionTemplate(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_target_reports_connection_unreachable() {
        let establisher = PgEstablisher::with_database(SchemaRegistry::shared(), tight_database());
        // TEST-NET-3 address: never routable, so the connect either errors
        // outright or hangs until the 1s deadline expires
        let institute = test_institute("ABC", "abc_db", "postgres://203.0.113.1:5432/{dbname}");

        let err = establisher.establish(&institute).await.unwrap_err();
        assert!(matches!(err, RouterError::ConnectionUnreachable { .. }));
    }

    #[tokio::test]
    async fn failed_validation_closes_the_pool() {
        let establisher = PgEstablisher::with_database(
            SchemaRegistry::shared(),
            DatabaseConfig {
                max_connections: 1,
                connect_timeout_secs: 5,
                acquire_timeout_secs: 2,
            },
        );

        // Lazy pool: open as far as the handle is concerned, but the probe's
        // first acquire hits a port nothing listens on
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(2))
            .connect_lazy("postgres://localhost:59999/abc_db")
            .unwrap();
        let handle = Arc::new(ConnectionHandle::new("abc_db", pool));

        let deadline = Instant::now() + Duration::from_secs(5);
        let err = establisher.validate(&handle, deadline).await.unwrap_err();

        assert!(matches!(err, RouterError::ConnectionUnreachable { .. }));
        assert!(handle.pool().is_closed());
        assert!(!handle.is_healthy());
    }
}
