//! # Database module: PostgreSQL pool, gateway and schema migrations
//!
//! ## Design
//!
//! The binary builds one [`PgPool`](sqlx::PgPool) with [`connect`] from the loaded
//! [`DatabaseSettings`](crate::settings::DatabaseSettings), runs [`migrate::run`] once,
//! and hands a [`PgStore`] wrapping the pool to the router. Every request borrows a
//! pooled connection (or a transaction for updates) only for the duration of its
//! store call.
//!
//! ## Re-exports
//!
//! - [`connect`] — opens the pool; no retry, a failure here is fatal at startup.
//! - [`PgStore`] — the `RecordStore` implementation over the pool.
//! - [`MigrationError`] / [`MigrationReport`] — outcome of [`migrate::run`].

pub mod migrate;
mod pg_store;
mod pool;

pub use migrate::{MigrationError, MigrationReport};
pub use pg_store::PgStore;
pub use pool::connect;
