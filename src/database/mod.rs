pub mod cache;
pub mod establisher;
pub mod handle;
pub mod models;

pub use cache::ConnectionCache;
pub use establisher::{Establish, PgEstablisher, DB_NAME_TOKEN};
pub use handle::{ConnectionHandle, HandleHealth};
pub use models::Institute;
