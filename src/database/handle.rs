use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::RwLock;

/// Readiness state of a [`ConnectionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleHealth {
    Connected,
    Connecting,
    Disconnected,
    Errored,
}

impl HandleHealth {
    fn as_u8(self) -> u8 {
        match self {
            HandleHealth::Connected => 0,
            HandleHealth::Connecting => 1,
            HandleHealth::Disconnected => 2,
            HandleHealth::Errored => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => HandleHealth::Connected,
            1 => HandleHealth::Connecting,
            2 => HandleHealth::Disconnected,
            _ => HandleHealth::Errored,
        }
    }
}

/// One live logical connection to a tenant database, keyed by `db_name`.
///
/// Wraps the pool together with its readiness state and the set of shared
/// data-model names registered on this specific instance. Each tenant database
/// is a distinct namespace, so models are bound per handle, never globally.
/// At most one healthy handle exists per `db_name`; an unhealthy handle is
/// evicted and rebuilt, never reused.
pub struct ConnectionHandle {
    db_name: String,
    pool: PgPool,
    health: AtomicU8,
    models: RwLock<HashSet<&'static str>>,
}

impl ConnectionHandle {
    /// Wrap a freshly opened pool. The handle starts out `Connecting`; the
    /// establisher marks it `Connected` once validation passes.
    pub fn new(db_name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            db_name: db_name.into(),
            pool,
            health: AtomicU8::new(HandleHealth::Connecting.as_u8()),
            models: RwLock::new(HashSet::new()),
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Current readiness state. A closed pool reads as `Disconnected`
    /// regardless of the stored state.
    pub fn health(&self) -> HandleHealth {
        if self.pool.is_closed() {
            return HandleHealth::Disconnected;
        }
        HandleHealth::from_u8(self.health.load(Ordering::Acquire))
    }

    pub fn is_healthy(&self) -> bool {
        self.health() == HandleHealth::Connected
    }

    pub fn mark_connected(&self) {
        self.health
            .store(HandleHealth::Connected.as_u8(), Ordering::Release);
    }

    pub fn mark_disconnected(&self) {
        self.health
            .store(HandleHealth::Disconnected.as_u8(), Ordering::Release);
    }

    /// Flag the handle after a fatal session error. Downstream consumers call
    /// this so the next resolution for this `db_name` rebuilds instead of
    /// reusing the broken session.
    pub fn mark_errored(&self) {
        self.health
            .store(HandleHealth::Errored.as_u8(), Ordering::Release);
    }

    /// Bind a shared model to this handle. Returns true if the model was not
    /// already registered; re-registering is a no-op.
    pub fn register_model(&self, name: &'static str) -> bool {
        self.models.write().unwrap().insert(name)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.read().unwrap().contains(name)
    }

    /// Names of all models registered on this handle, sorted.
    pub fn registered_models(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.models.read().unwrap().iter().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("db_name", &self.db_name)
            .field("health", &self.health())
            .field("models", &self.registered_models())
            .finish()
    }
}
