//! Repository implementations for billing tables
//!
//! Repositories own the SQL and map between database rows and domain types.
//! Functions that take a `PgExecutor` run against either the pool or an open
//! transaction, which is how the billing unit of work reuses them.
//!
//! Queries are checked at runtime (`query_as` with `FromRow`), so the crate
//! builds without a live database.

pub mod customer;
pub mod bill;
pub mod payment;
pub mod credit;
pub mod settings;
pub mod audit;
pub mod otp;

pub use customer::CustomerRepository;
pub use settings::SettingsRepository;
pub use audit::AuditRepository;
pub use otp::OtpRepository;
