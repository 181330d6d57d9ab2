//! Core Kernel - Foundational types shared by the billing workspace
//!
//! - Peso `Money` and percentage `Rate` with precise decimal arithmetic
//! - Calendar helpers: local timezone, billing periods, age
//! - Strongly-typed identifiers
//! - Port infrastructure plus the actor, audit and notification collaborators

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;
pub mod actor;
pub mod audit;
pub mod notification;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use money::{Money, MoneyError, Rate};
pub use temporal::{age_on, days_between, BillingPeriod, TemporalError, Timezone};
pub use identifiers::{
    AuditEventId, BillId, CreditTransactionId, CustomerId, PaymentId, RateTierId,
};
pub use error::CoreError;
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
pub use actor::{Actor, Role};
pub use audit::{AuditEntry, AuditSink, TracingAuditSink};
pub use notification::{truncate_message, NoopNotificationSender, NotificationSender};
