//! Customer account state relevant to billing

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{age_on, CustomerId, Money};

/// Age at which the senior-citizen discount applies
pub const SENIOR_CITIZEN_AGE: u32 = 60;

/// A customer account
///
/// `credit_balance` is a cached projection of the customer's credit ledger;
/// only `CreditLedger` and `BillSettlement` write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub account_number: String,
    pub name: String,
    pub phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub credit_balance: Money,
    pub credit_limit: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Creates a customer with a zero credit balance
    pub fn new(account_number: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::new_v7(),
            account_number: account_number.into(),
            name: name.into(),
            phone: None,
            birthdate: None,
            credit_balance: Money::ZERO,
            credit_limit: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_birthdate(mut self, birthdate: NaiveDate) -> Self {
        self.birthdate = Some(birthdate);
        self
    }

    pub fn with_credit_limit(mut self, limit: Money) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    /// Credit that can still be added before the limit, `None` when unlimited
    pub fn credit_room(&self) -> Option<Money> {
        self.credit_limit
            .map(|limit| limit.saturating_sub(self.credit_balance))
    }

    /// Splits an overpayment into the part kept as credit and the part
    /// that has to be handed back
    pub fn split_excess(&self, excess: Money) -> (Money, Money) {
        match self.credit_room() {
            Some(room) if excess > room => (room, excess - room),
            _ => (excess, Money::ZERO),
        }
    }

    /// Age in whole years on `date`, if the birthdate is known
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        self.birthdate.map(|b| age_on(b, date))
    }

    /// True when the customer is at least 60 on `date`
    pub fn is_senior_on(&self, date: NaiveDate) -> bool {
        self.age_on(date).is_some_and(|age| age >= SENIOR_CITIZEN_AGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_senior_boundary() {
        let customer = Customer::new("ACC-1", "Lola Remedios")
            .with_birthdate(NaiveDate::from_ymd_opt(1964, 6, 1).unwrap());

        assert!(!customer.is_senior_on(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()));
        assert!(customer.is_senior_on(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
    }

    #[test]
    fn test_split_excess_respects_limit() {
        use rust_decimal_macros::dec;

        let mut customer = Customer::new("ACC-3", "Ana").with_credit_limit(Money::new(dec!(100)));
        customer.credit_balance = Money::new(dec!(70));

        assert_eq!(
            customer.split_excess(Money::new(dec!(50))),
            (Money::new(dec!(30)), Money::new(dec!(20)))
        );
        assert_eq!(
            Customer::new("ACC-4", "Ben").split_excess(Money::new(dec!(50))),
            (Money::new(dec!(50)), Money::ZERO)
        );
    }

    #[test]
    fn test_unknown_birthdate_is_not_senior() {
        let customer = Customer::new("ACC-2", "Juan");
        assert!(!customer.is_senior_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert_eq!(customer.age_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), None);
    }
}
