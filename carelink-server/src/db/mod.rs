//! Database layer - connection pool, schema and repositories
//!
//! # Design Principles
//!
//! - One shared `PgPool`, repositories borrow it per request
//! - Rely on DB constraints, map violations to conflicts
//! - Transactions for multi-step operations (updates, seeding, migrations)

pub mod migrations;
pub mod pool;
pub mod repos;
pub mod seed;

pub use pool::{connect, create_lazy_pool, create_pool};
pub use repos::*;
pub use sqlx::PgPool;
