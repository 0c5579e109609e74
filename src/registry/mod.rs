use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::error;

use crate::database::models::Institute;
use crate::router::error::RouterError;

/// Read-only client for the tenant record store.
///
/// The registry is owned by the external management API; this service only
/// ever looks records up by their normalized code.
#[async_trait]
pub trait InstituteRegistry: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<Institute>, RouterError>;
}

/// Registry backed by the shared Postgres registry database.
pub struct PgInstituteRegistry {
    pool: PgPool,
}

impl PgInstituteRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build from `REGISTRY_DATABASE_URL`. The pool is lazy, so startup does
    /// not require the registry to be reachable.
    pub fn from_env() -> Result<Self, RouterError> {
        let url = std::env::var("REGISTRY_DATABASE_URL")
            .map_err(|_| RouterError::StoreUnavailable("REGISTRY_DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .connect_lazy(&url)
            .map_err(|e| RouterError::StoreUnavailable(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Pings the registry database, for the health endpoint.
    pub async fn ping(&self) -> Result<(), RouterError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RouterError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl InstituteRegistry for PgInstituteRegistry {
    async fn find_by_code(&self, code: &str) -> Result<Option<Institute>, RouterError> {
        let query = r#"
            SELECT
                institute_code, db_name, connection_template,
                description, static_asset_base_url,
                created_at, updated_at
            FROM institutes
            WHERE institute_code = $1
        "#;

        sqlx::query_as::<_, Institute>(query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Registry lookup failed for institute {}: {}", code, e);
                RouterError::StoreUnavailable(e.to_string())
            })
    }
}
