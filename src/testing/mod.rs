//! In-memory fakes for exercising the routing subsystem without a live
//! Postgres server. Pools come from `connect_lazy`, which opens nothing.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::database::establisher::Establish;
use crate::database::handle::ConnectionHandle;
use crate::database::models::Institute;
use crate::registry::InstituteRegistry;
use crate::router::error::RouterError;

/// Build an institute record for tests.
pub fn test_institute(code: &str, db_name: &str, template: &str) -> Institute {
    let now = Utc::now();
    Institute {
        institute_code: code.to_string(),
        db_name: db_name.to_string(),
        connection_template: template.to_string(),
        description: None,
        static_asset_base_url: None,
        created_at: now,
        updated_at: now,
    }
}

/// A handle over a lazy pool: valid, inert, no network traffic.
pub fn lazy_handle(db_name: &str) -> Arc<ConnectionHandle> {
    let pool = PgPoolOptions::new()
        .connect_lazy(&format!("postgres://localhost:5432/{}", db_name))
        .expect("lazy pool");
    Arc::new(ConnectionHandle::new(db_name, pool))
}

/// Registry fake with a fixed record set and a lookup counter.
pub struct FakeRegistry {
    records: HashMap<String, Institute>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn empty() -> Self {
        Self {
            records: HashMap::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_institute(code: &str, db_name: &str, template: &str) -> Self {
        let mut registry = Self::empty();
        registry.records.insert(
            code.to_uppercase(),
            test_institute(&code.to_uppercase(), db_name, template),
        );
        registry
    }

    /// Every lookup fails as if the registry database were down.
    pub fn failing() -> Self {
        Self {
            records: HashMap::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstituteRegistry for FakeRegistry {
    async fn find_by_code(&self, code: &str) -> Result<Option<Institute>, RouterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RouterError::StoreUnavailable("registry down".to_string()));
        }
        Ok(self.records.get(code).cloned())
    }
}

/// Establisher fake: counts attempts, optionally sleeps to widen concurrency
/// windows, optionally fails every attempt.
pub struct FakeEstablisher {
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeEstablisher {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeEstablisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Establish for FakeEstablisher {
    async fn establish(&self, institute: &Institute) -> Result<Arc<ConnectionHandle>, RouterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(RouterError::ConnectionUnreachable {
                db_name: institute.db_name.clone(),
                reason: "connection refused".to_string(),
            });
        }
        let handle = lazy_handle(&institute.db_name);
        handle.mark_connected();
        Ok(handle)
    }
}
