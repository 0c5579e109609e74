use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::database::handle::ConnectionHandle;

/// Definition of one shared data model every institute database carries.
///
/// Tenant databases are provisioned externally with the shared table set;
/// registration binds these definitions to a specific connection so downstream
/// data access knows which models a handle serves. It never issues DDL.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelDef {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

/// The shared data model. Every tenant database has the same shape even
/// though each one is an independent namespace.
static SHARED_MODELS: &[ModelDef] = &[
    ModelDef {
        name: "students",
        table: "students",
        columns: &["id", "full_name", "email", "enrolled_at"],
    },
    ModelDef {
        name: "courses",
        table: "courses",
        columns: &["id", "title", "credits"],
    },
    ModelDef {
        name: "faculty",
        table: "faculty",
        columns: &["id", "full_name", "department"],
    },
];

static SHARED_REGISTRY: Lazy<Arc<SchemaRegistry>> =
    Lazy::new(|| Arc::new(SchemaRegistry::new(SHARED_MODELS)));

/// Registers the shared model set on connection handles, once per handle.
pub struct SchemaRegistry {
    models: &'static [ModelDef],
}

impl SchemaRegistry {
    pub fn new(models: &'static [ModelDef]) -> Self {
        Self { models }
    }

    /// Process-wide registry over the shared model set.
    pub fn shared() -> Arc<SchemaRegistry> {
        SHARED_REGISTRY.clone()
    }

    pub fn models(&self) -> &[ModelDef] {
        self.models
    }

    /// Bind every model to the given handle. Idempotent per handle: models
    /// already registered are skipped. Returns the number newly bound.
    pub fn register_on(&self, handle: &ConnectionHandle) -> usize {
        let mut bound = 0;
        for model in self.models {
            if handle.register_model(model.name) {
                bound += 1;
            }
        }
        if bound > 0 {
            debug!("Registered {} models on database: {}", bound, handle.db_name());
        }
        bound
    }
}
