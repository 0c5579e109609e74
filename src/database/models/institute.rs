use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One tenant record from the registry database.
///
/// Rows are created, updated and deleted only by the external management API;
/// the router reads them, never writes. `institute_code` and `db_name` are
/// each globally unique across all tenants.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Institute {
    /// Upper-cased client identifier, e.g. "ABC".
    pub institute_code: String,
    /// Logical database name backing this tenant, e.g. "abc_db".
    pub db_name: String,
    /// Connection string with a `{dbname}` placeholder for `db_name`.
    pub connection_template: String,
    pub description: Option<String>,
    pub static_asset_base_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
