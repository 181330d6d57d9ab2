//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the water billing system, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: [`repositories`] owns the SQL
//! and row types, [`adapters`] implements the domain ports on top of them.
//!
//! # Transactions
//!
//! [`PostgresBillingStore::begin`](domain_billing::BillingStore::begin)
//! opens one database transaction per billing operation. Customer, bill and
//! payment rows are locked with `SELECT ... FOR UPDATE` in that order, so
//! concurrent credit operations on one customer queue behind each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/water_billing")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillingStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use repositories::CustomerRepository;
pub use adapters::{
    PgUnitOfWork, PostgresAuditSink, PostgresBillingStore, PostgresOtpStore,
    PostgresSettingsProvider,
};
