//! Request and response bodies

pub mod bill;
pub mod payment;
pub mod credit;
pub mod penalty;
pub mod settings;
pub mod otp;
