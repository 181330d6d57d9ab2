//! Test Data Builders
//!
//! Builders for bills, customers and payment requests. Tests set only the
//! fields they care about and take the fixture defaults for the rest.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BillId, CustomerId, Money};
use domain_billing::{
    Bill, BillDraft, BillStatus, CashierPayment, Customer, PaymentMethod, ProofSubmission,
};

use crate::fixtures::{DateFixtures, StringFixtures};

/// Builder for customers
pub struct CustomerBuilder {
    customer: Customer,
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerBuilder {
    pub fn new() -> Self {
        Self {
            customer: Customer::new(
                StringFixtures::account_number(),
                StringFixtures::customer_name(),
            ),
        }
    }

    pub fn with_account_number(mut self, account_number: impl Into<String>) -> Self {
        self.customer.account_number = account_number.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.customer.name = name.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer.phone = Some(phone.into());
        self
    }

    pub fn with_birthdate(mut self, birthdate: NaiveDate) -> Self {
        self.customer.birthdate = Some(birthdate);
        self
    }

    /// Age in years on the fixture billing date
    pub fn aged(self, age: i32) -> Self {
        self.with_birthdate(DateFixtures::birthdate_for_age(age))
    }

    pub fn with_credit_balance(mut self, balance: Decimal) -> Self {
        self.customer.credit_balance = Money::new(balance);
        self
    }

    pub fn with_credit_limit(mut self, limit: Decimal) -> Self {
        self.customer.credit_limit = Some(Money::new(limit));
        self
    }

    pub fn build(self) -> Customer {
        self.customer
    }
}

/// Builder for bills seeded straight into a store
///
/// Skips the calculator: the gross amount is whatever the test sets.
pub struct BillBuilder {
    customer_id: CustomerId,
    gross_amount: Money,
    credit_applied: Money,
    consumption: Decimal,
    billing_date: NaiveDate,
    due_date: NaiveDate,
    status: Option<BillStatus>,
    penalty: Money,
    penalty_paid: Money,
    archived: bool,
}

impl BillBuilder {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            gross_amount: Money::new(dec!(1000)),
            credit_applied: Money::ZERO,
            consumption: dec!(40),
            billing_date: DateFixtures::billing_date(),
            due_date: DateFixtures::due_date(),
            status: None,
            penalty: Money::ZERO,
            penalty_paid: Money::ZERO,
            archived: false,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.gross_amount = Money::new(amount);
        self
    }

    /// Credit consumed when the bill was issued
    pub fn with_credit_applied(mut self, amount: Decimal) -> Self {
        self.credit_applied = Money::new(amount);
        self
    }

    pub fn with_consumption(mut self, consumption: Decimal) -> Self {
        self.consumption = consumption;
        self
    }

    /// Moves the due date and keeps billing 14 days earlier
    pub fn due_on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self.billing_date = due_date - Duration::days(14);
        self
    }

    pub fn billed_on(mut self, billing_date: NaiveDate) -> Self {
        self.billing_date = billing_date;
        self
    }

    pub fn with_status(mut self, status: BillStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_penalty(mut self, penalty: Decimal) -> Self {
        self.penalty = Money::new(penalty);
        self
    }

    pub fn with_penalty_paid(mut self, paid: Decimal) -> Self {
        self.penalty_paid = Money::new(paid);
        self
    }

    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }

    pub fn build(self) -> Bill {
        let mut bill = Bill::issue(
            BillDraft {
                customer_id: self.customer_id,
                meter_number: StringFixtures::meter_number().to_string(),
                previous_reading: dec!(0),
                current_reading: self.consumption,
                consumption: self.consumption,
                gross_amount: self.gross_amount,
                billing_date: self.billing_date,
                due_date: self.due_date,
            },
            self.credit_applied,
        );
        if let Some(status) = self.status {
            bill.status = status;
        }
        bill.penalty = self.penalty;
        bill.penalty_paid = self.penalty_paid;
        bill.archived = self.archived;
        bill
    }
}

/// Builder for counter payments
pub struct CashierPaymentBuilder {
    payment: CashierPayment,
}

impl CashierPaymentBuilder {
    pub fn new(bill_id: BillId) -> Self {
        Self {
            payment: CashierPayment {
                bill_id,
                amount_tendered: Money::new(dec!(1000)),
                method: PaymentMethod::Cash,
                receipt_number: StringFixtures::receipt_number().to_string(),
                credit_excess: false,
                notes: None,
            },
        }
    }

    pub fn tendered(mut self, amount: Decimal) -> Self {
        self.payment.amount_tendered = Money::new(amount);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.payment.method = method;
        self
    }

    pub fn with_receipt(mut self, receipt_number: impl Into<String>) -> Self {
        self.payment.receipt_number = receipt_number.into();
        self
    }

    /// Keep any excess as credit instead of giving change
    pub fn keep_excess_as_credit(mut self) -> Self {
        self.payment.credit_excess = true;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.payment.notes = Some(notes.into());
        self
    }

    pub fn build(self) -> CashierPayment {
        self.payment
    }
}

/// Builder for proof-of-payment submissions
pub struct ProofSubmissionBuilder {
    proof: ProofSubmission,
}

impl ProofSubmissionBuilder {
    pub fn new(bill_id: BillId) -> Self {
        Self {
            proof: ProofSubmission {
                bill_id,
                amount: Money::new(dec!(1000)),
                method: PaymentMethod::EWallet,
                reference_number: "GC-20240310-0001".to_string(),
                proof_location: Some("proofs/2024/03/gcash-0001.jpg".to_string()),
                notes: None,
            },
        }
    }

    pub fn for_amount(mut self, amount: Decimal) -> Self {
        self.proof.amount = Money::new(amount);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.proof.method = method;
        self
    }

    pub fn with_reference(mut self, reference_number: impl Into<String>) -> Self {
        self.proof.reference_number = reference_number.into();
        self
    }

    pub fn build(self) -> ProofSubmission {
        self.proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_builder_defaults_to_unpaid() {
        let bill = BillBuilder::new(CustomerId::new()).build();
        assert_eq!(bill.status, BillStatus::Unpaid);
        assert_eq!(bill.net_amount_due, Money::new(dec!(1000)));
        assert_eq!(bill.due_date, DateFixtures::due_date());
    }

    #[test]
    fn test_bill_builder_partial_credit() {
        let bill = BillBuilder::new(CustomerId::new())
            .with_amount(dec!(547))
            .with_credit_applied(dec!(300))
            .build();
        assert_eq!(bill.status, BillStatus::PartiallyPaid);
        assert_eq!(bill.net_amount_due, Money::new(dec!(247)));
    }

    #[test]
    fn test_customer_builder() {
        let customer = CustomerBuilder::new()
            .aged(60)
            .with_credit_limit(dec!(5000))
            .build();
        assert!(customer.is_senior_on(DateFixtures::billing_date()));
        assert_eq!(customer.credit_limit, Some(Money::new(dec!(5000))));
    }
}
