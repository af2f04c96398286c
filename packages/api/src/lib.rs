//! # API crate: HTTP surface and PostgreSQL backing for the scaffold
//!
//! This crate holds everything the `server` binary wires together at startup:
//! the JSON routes, the PostgreSQL implementation of [`store::RecordStore`], the
//! startup migration, and the runtime settings.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`db`] | PostgreSQL pool, the [`PgStore`](db::PgStore) gateway, and additive schema migration |
//! | [`error`] | [`ApiError`] and its status-code mapping; JSON and path extractors that reject with 400 |
//! | [`routes`] | The axum [`Router`](axum::Router) for `/api/health`, `/api/test` and `/api/users` |
//! | [`settings`] | Layered configuration (defaults, `config.toml`, environment, `DATABASE_URL`) |
//!
//! ## Startup order
//!
//! 1. [`Settings::new`] loads configuration.
//! 2. [`db::connect`] opens the pool; failure aborts startup.
//! 3. [`db::migrate::run`] brings the schema in line with [`store::schema`]; failure aborts startup.
//! 4. [`router`] builds the app over a [`db::PgStore`] and the binary starts serving.

pub mod db;
pub mod error;
pub mod routes;
pub mod settings;

pub use error::ApiError;
pub use routes::router;
pub use settings::Settings;
