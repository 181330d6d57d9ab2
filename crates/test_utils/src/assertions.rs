//! Custom Test Assertions
//!
//! Assertion helpers for billing types with messages that name the peso
//! amounts and statuses involved.

use rust_decimal::Decimal;

use core_kernel::Money;
use domain_billing::{Bill, BillStatus, BillingError, CreditTransaction};

/// Asserts that two Money values are within `tolerance` of each other
pub fn assert_money_approx_eq(actual: Money, expected: Money, tolerance: Decimal) {
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

/// Asserts an exact peso amount
pub fn assert_money_eq(actual: Money, expected: Decimal) {
    assert_eq!(
        actual,
        Money::new(expected),
        "Expected {}, got {}",
        Money::new(expected),
        actual
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that the bill's amounts are internally consistent
///
/// `gross = credit_applied + amount_paid + net_amount_due`, penalty paid never
/// exceeds penalty, and a Paid bill owes nothing.
pub fn assert_bill_balanced(bill: &Bill) {
    assert_eq!(
        bill.gross_amount,
        bill.credit_applied + bill.amount_paid + bill.net_amount_due,
        "Bill {} does not balance: gross={}, credit={}, paid={}, due={}",
        bill.id,
        bill.gross_amount,
        bill.credit_applied,
        bill.amount_paid,
        bill.net_amount_due
    );
    assert!(
        bill.penalty_paid <= bill.penalty,
        "Bill {} has penalty_paid {} above penalty {}",
        bill.id,
        bill.penalty_paid,
        bill.penalty
    );
    if bill.status == BillStatus::Paid {
        assert!(
            bill.total_outstanding().is_zero(),
            "Paid bill {} still owes {}",
            bill.id,
            bill.total_outstanding()
        );
    }
}

/// Asserts a bill's status
pub fn assert_bill_status(bill: &Bill, expected: BillStatus) {
    assert_eq!(
        bill.status, expected,
        "Bill {} is {}, expected {}",
        bill.id, bill.status, expected
    );
}

/// Asserts that ledger entries chain and end at `balance`
///
/// `transactions` is newest first, as the stores return them.
pub fn assert_ledger_chain(transactions: &[CreditTransaction], balance: Money) {
    for transaction in transactions {
        assert!(
            transaction.is_balanced(),
            "Transaction {} does not balance: {} + {} != {}",
            transaction.id,
            transaction.previous_balance,
            transaction.signed_amount(),
            transaction.new_balance
        );
    }
    for pair in transactions.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        assert_eq!(
            newer.previous_balance, older.new_balance,
            "Ledger gap between {} and {}",
            older.id, newer.id
        );
    }

    let sum: Money = transactions.iter().map(CreditTransaction::signed_amount).sum();
    assert_eq!(sum, balance, "Ledger sums to {}, balance is {}", sum, balance);
    if let Some(latest) = transactions.first() {
        assert_eq!(latest.new_balance, balance, "Latest entry does not match balance");
    }
}

/// Asserts that a result failed with the given stable error code
pub fn assert_billing_error<T: std::fmt::Debug>(result: Result<T, BillingError>, code: &str) {
    match result {
        Ok(value) => panic!("Expected error {}, got Ok({:?})", code, value),
        Err(err) => assert_eq!(err.code(), code, "Unexpected error: {}", err),
    }
}
