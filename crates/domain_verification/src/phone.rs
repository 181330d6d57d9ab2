//! Philippine mobile numbers in `63XXXXXXXXXX` form

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VerificationError;

/// A validated mobile number, always `63` followed by ten digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalizes and validates `raw`
    pub fn parse(raw: &str) -> Result<Self, VerificationError> {
        let normalized = normalize(raw);
        if is_valid(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(VerificationError::InvalidPhone(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local `09XXXXXXXXX` spelling
    pub fn local(&self) -> String {
        format!("0{}", &self.0[2..])
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = VerificationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// Rewrites common local spellings into the `63` prefix form
///
/// Spaces and hyphens are dropped. `+63…` becomes `63…`, `09…` becomes
/// `639…` and a bare `9…` gets `63` prepended. Anything else is returned
/// as-is for [`is_valid`] to reject.
pub fn normalize(raw: &str) -> String {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if let Some(rest) = digits.strip_prefix("+63") {
        format!("63{}", rest)
    } else if let Some(rest) = digits.strip_prefix('0').filter(|r| r.starts_with('9')) {
        format!("63{}", rest)
    } else if digits.starts_with("63") {
        digits
    } else if digits.starts_with('9') {
        format!("63{}", digits)
    } else {
        digits
    }
}

/// `63` followed by exactly ten ASCII digits
pub fn is_valid(normalized: &str) -> bool {
    normalized.len() == 12
        && normalized.starts_with("63")
        && normalized.bytes().all(|b| b.is_ascii_digit())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn every_local_number_normalizes_to_the_same_value(rest in "[0-9]{9}") {
            let canonical = format!("639{}", rest);
            for spelling in [
                format!("09{}", rest),
                format!("+639{}", rest),
                format!("9{}", rest),
                canonical.clone(),
            ] {
                let parsed = PhoneNumber::parse(&spelling).unwrap();
                prop_assert_eq!(parsed.as_str(), canonical.as_str());
            }
        }
    }
}
