use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::database::establisher::Establish;
use crate::database::handle::ConnectionHandle;
use crate::database::models::Institute;
use crate::router::error::RouterError;

type EstablishResult = Result<Arc<ConnectionHandle>, RouterError>;
type Flight = Shared<BoxFuture<'static, EstablishResult>>;

/// Process-wide cache of live connection handles, keyed by `db_name`.
///
/// Establishment is single-flight per key: the first caller for an unseen
/// `db_name` runs the establisher, late callers join the same in-flight
/// future and receive the same handle or the same typed failure. Nothing is
/// cached on failure, so the next resolution attempts a fresh establishment.
pub struct ConnectionCache {
    establisher: Arc<dyn Establish>,
    handles: Arc<RwLock<HashMap<String, Arc<ConnectionHandle>>>>,
    inflight: Mutex<HashMap<String, Flight>>,
}

impl ConnectionCache {
    pub fn new(establisher: Arc<dyn Establish>) -> Self {
        Self {
            establisher,
            handles: Arc::new(RwLock::new(HashMap::new())),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Return the healthy handle for this tenant's database, establishing one
    /// if needed. An unhealthy cached handle is evicted and rebuilt.
    pub async fn handle_for(&self, institute: &Institute) -> EstablishResult {
        // Fast path: a healthy cached handle involves no I/O
        {
            let handles = self.handles.read().await;
            if let Some(handle) = handles.get(&institute.db_name) {
                if handle.is_healthy() {
                    return Ok(handle.clone());
                }
            }
        }

        let flight = {
            let mut inflight = self.inflight.lock().await;

            if let Some(flight) = inflight.get(&institute.db_name) {
                flight.clone()
            } else {
                // Re-check under the in-flight lock: a previous flight may
                // have landed a healthy handle while we waited
                {
                    let mut handles = self.handles.write().await;
                    match handles.get(&institute.db_name) {
                        Some(handle) if handle.is_healthy() => return Ok(handle.clone()),
                        Some(stale) => {
                            warn!(
                                "Evicting unhealthy handle for database: {} ({:?})",
                                institute.db_name,
                                stale.health()
                            );
                            handles.remove(&institute.db_name);
                        }
                        None => {}
                    }
                }

                let establisher = self.establisher.clone();
                let handles = self.handles.clone();
                let record = institute.clone();
                let flight: Flight = async move {
                    let handle = establisher.establish(&record).await?;
                    handles
                        .write()
                        .await
                        .insert(record.db_name.clone(), handle.clone());
                    Ok(handle)
                }
                .boxed()
                .shared();

                inflight.insert(institute.db_name.clone(), flight.clone());
                flight
            }
        };

        let result = flight.clone().await;

        // Drop the completed flight, but only our own: a successor may have
        // started a new one for the same key already
        {
            let mut inflight = self.inflight.lock().await;
            if let Some(current) = inflight.get(&institute.db_name) {
                if current.ptr_eq(&flight) {
                    inflight.remove(&institute.db_name);
                }
            }
        }

        result
    }

    /// Evict a cached handle. Returns true if an entry was removed.
    pub async fn evict(&self, db_name: &str) -> bool {
        let removed = self.handles.write().await.remove(db_name);
        if removed.is_some() {
            info!("Evicted connection handle for database: {}", db_name);
        }
        removed.is_some()
    }

    /// Number of cached handles, healthy or not.
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    /// Close and remove all handles (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut handles = self.handles.write().await;
        for (db_name, handle) in handles.drain() {
            handle.mark_disconnected();
            handle.pool().close().await;
            info!("Closed connection handle for database: {}", db_name);
        }
    }
}
