//! Authenticated actor context
//!
//! Authentication happens at the edge; domain services receive an already
//! verified `Actor` and only apply the authorization rules that belong to
//! billing itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::identifiers::CustomerId;

/// Staff and customer roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cashier,
    /// Meter-reading encoder; restricted to one bill per customer per month
    Encoder,
    Customer,
    /// Scheduled jobs and internal automation
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
            Role::Encoder => "encoder",
            Role::Customer => "customer",
            Role::System => "system",
        }
    }

    /// Employees and automation, as opposed to customers
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Customer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "cashier" => Ok(Role::Cashier),
            "encoder" => Ok(Role::Encoder),
            "customer" => Ok(Role::Customer),
            "system" => Ok(Role::System),
            other => Err(CoreError::validation(format!("unknown role '{}'", other))),
        }
    }
}

/// The identity on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    /// The actor used by scheduled jobs
    pub fn system() -> Self {
        Self::new("system", Role::System)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role || self.role == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }

    /// True for the customer account itself; customer tokens carry the
    /// customer id as subject
    pub fn is_customer(&self, customer_id: &CustomerId) -> bool {
        self.role == Role::Customer && self.id == customer_id.to_string()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("Cashier".parse::<Role>().unwrap(), Role::Cashier);
        assert_eq!(" encoder ".parse::<Role>().unwrap(), Role::Encoder);
        assert!("teller".parse::<Role>().is_err());
    }

    #[test]
    fn test_admin_has_every_role() {
        let admin = Actor::new("u-1", Role::Admin);
        assert!(admin.has_role(Role::Cashier));
        assert!(admin.has_any_role(&[Role::Encoder]));

        let encoder = Actor::new("u-2", Role::Encoder);
        assert!(!encoder.has_role(Role::Cashier));
    }

    #[test]
    fn test_is_customer_matches_own_account_only() {
        let customer_id = CustomerId::new();
        let own = Actor::new(customer_id.to_string(), Role::Customer);
        let other = Actor::new(CustomerId::new().to_string(), Role::Customer);
        let admin = Actor::new(customer_id.to_string(), Role::Admin);

        assert!(own.is_customer(&customer_id));
        assert!(!other.is_customer(&customer_id));
        assert!(!admin.is_customer(&customer_id));
    }
}
