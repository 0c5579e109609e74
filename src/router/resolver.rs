use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::database::models::Institute;
use crate::registry::InstituteRegistry;
use crate::router::error::RouterError;

/// Normalize a raw tenant identifier: trimmed, upper-cased, never empty.
pub fn normalize_code(raw: &str) -> Result<String, RouterError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(RouterError::MissingIdentifier);
    }
    Ok(code.to_uppercase())
}

/// Resolves raw tenant identifiers to institute records, caching hits.
///
/// Only successful lookups are cached; an unknown code is re-queried on every
/// resolution. Entries persist for the process lifetime unless explicitly
/// invalidated - the registry changes only through the management API, so
/// invalidation is an operator event rather than a TTL.
pub struct InstituteResolver {
    registry: Arc<dyn InstituteRegistry>,
    cache: RwLock<HashMap<String, Arc<Institute>>>,
}

impl InstituteResolver {
    pub fn new(registry: Arc<dyn InstituteRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a raw identifier to its institute record. Cache hits return
    /// immediately with no registry access and no staleness check.
    pub async fn resolve(&self, raw: &str) -> Result<Arc<Institute>, RouterError> {
        let code = normalize_code(raw)?;

        {
            let cache = self.cache.read().await;
            if let Some(record) = cache.get(&code) {
                return Ok(record.clone());
            }
        }

        let record = self
            .registry
            .find_by_code(&code)
            .await?
            .ok_or_else(|| RouterError::TenantNotFound(code.clone()))?;

        let record = Arc::new(record);
        self.cache.write().await.insert(code, record.clone());
        info!("Cached institute record for: {}", record.institute_code);
        Ok(record)
    }

    /// Drop one cached record, forcing the next resolution back to the
    /// registry. Call after the management API changes a tenant record.
    pub async fn invalidate(&self, raw: &str) -> bool {
        let Ok(code) = normalize_code(raw) else {
            return false;
        };
        self.cache.write().await.remove(&code).is_some()
    }

    /// Drop every cached record.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    #[cfg(test)]
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}
