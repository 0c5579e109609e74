pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod schema;

#[cfg(test)]
pub mod testing;
