//! SQLite layer for murmur's transactional store backend.
//!
//! [`open_store`] hands out a migrated `r2d2` pool. The flat-file stores
//! remain the default; this crate only comes into play when
//! `storage.backend = "sqlite"`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{open_store, DbError, DbLocation, DbPool, PoolSettings};
