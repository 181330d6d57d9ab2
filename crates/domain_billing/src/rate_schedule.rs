//! Consumption-to-charge rate schedules
//!
//! A schedule is either the built-in reference table (used when no tiers are
//! configured) or an ordered list of administrator-configured tiers. Each
//! tier prices consumption either per cubic meter or as a fixed amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, RateTierId};

use crate::error::{BillingError, BillingResult};

/// Smallest consumption listed in the reference table
pub const REFERENCE_MIN_CONSUMPTION: u32 = 10;
/// Largest consumption listed in the reference table
pub const REFERENCE_MAX_CONSUMPTION: u32 = 100;
/// Per-cubic-meter charge above the reference table
pub const REFERENCE_EXCESS_RATE: Decimal = dec!(34.45);
/// Charge at the top of the reference table, also the default excess base
pub const REFERENCE_CEILING_CHARGE: Decimal = dec!(3235);

/// Reference charges in pesos for 10..=100 cubic meters
const REFERENCE_TABLE: [u32; 91] = [
    267, 295, 323, 351, 379, 407, 435, 463, 491, 519, // 10-19
    547, 577, 607, 637, 667, 697, 727, 757, 787, 817, // 20-29
    847, 879, 911, 943, 975, 1007, 1039, 1071, 1103, 1135, // 30-39
    1167, 1202, 1237, 1271, 1305, 1340, 1374, 1408, 1443, 1477, // 40-49
    1512, 1547, 1581, 1616, 1650, 1685, 1719, 1753, 1788, 1822, // 50-59
    1857, 1891, 1925, 1960, 1994, 2029, 2063, 2098, 2132, 2166, // 60-69
    2201, 2235, 2270, 2304, 2339, 2373, 2408, 2442, 2477, 2511, // 70-79
    2546, 2580, 2615, 2649, 2684, 2718, 2753, 2787, 2822, 2856, // 80-89
    2891, 2925, 2960, 2994, 3029, 3063, 3098, 3132, 3166, 3201, // 90-99
    3235, // 100
];

/// How a tier prices consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum TierPricing {
    /// Consumption times this rate
    PerUnit(Money),
    /// A flat charge for the whole bracket
    Fixed(Money),
}

/// A configured consumption bracket, bounds inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub id: RateTierId,
    pub consumption_min: Decimal,
    /// `None` for an unbounded top tier
    pub consumption_max: Option<Decimal>,
    pub pricing: TierPricing,
}

impl RateTier {
    pub fn per_unit(min: Decimal, max: Option<Decimal>, rate: Decimal) -> Self {
        Self {
            id: RateTierId::new_v7(),
            consumption_min: min,
            consumption_max: max,
            pricing: TierPricing::PerUnit(Money::new(rate)),
        }
    }

    pub fn fixed(min: Decimal, max: Option<Decimal>, amount: Decimal) -> Self {
        Self {
            id: RateTierId::new_v7(),
            consumption_min: min,
            consumption_max: max,
            pricing: TierPricing::Fixed(Money::new(amount)),
        }
    }

    /// Builds a tier from storage columns where exactly one price is set
    pub fn from_parts(
        id: RateTierId,
        consumption_min: Decimal,
        consumption_max: Option<Decimal>,
        rate_per_unit: Option<Decimal>,
        fixed_amount: Option<Decimal>,
    ) -> BillingResult<Self> {
        let pricing = match (rate_per_unit, fixed_amount) {
            (Some(rate), None) => TierPricing::PerUnit(Money::new(rate)),
            (None, Some(amount)) => TierPricing::Fixed(Money::new(amount)),
            _ => {
                return Err(BillingError::InvalidRateSchedule(format!(
                    "tier starting at {} must set exactly one of rate_per_unit and fixed_amount",
                    consumption_min
                )))
            }
        };
        Ok(Self {
            id,
            consumption_min,
            consumption_max,
            pricing,
        })
    }

    pub fn rate_per_unit(&self) -> Option<Money> {
        match self.pricing {
            TierPricing::PerUnit(rate) => Some(rate),
            TierPricing::Fixed(_) => None,
        }
    }

    pub fn fixed_amount(&self) -> Option<Money> {
        match self.pricing {
            TierPricing::Fixed(amount) => Some(amount),
            TierPricing::PerUnit(_) => None,
        }
    }

    pub fn contains(&self, consumption: Decimal) -> bool {
        consumption >= self.consumption_min
            && self.consumption_max.map_or(true, |max| consumption <= max)
    }

    fn charge(&self, consumption: Decimal) -> Money {
        match self.pricing {
            TierPricing::PerUnit(rate) => rate * consumption,
            TierPricing::Fixed(amount) => amount,
        }
    }
}

/// Which rule produced a charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeBasis {
    ReferenceTable,
    ReferenceExcess,
    Tier,
    TierExcess,
    /// Degraded flat per-unit rate after a resolution failure
    FlatFallback,
}

/// A resolved base charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub amount: Money,
    pub basis: ChargeBasis,
}

/// Active rate schedule
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RateSchedule {
    tiers: Vec<RateTier>,
}

impl RateSchedule {
    /// The built-in reference table
    pub fn reference() -> Self {
        Self::default()
    }

    /// Validates and orders configured tiers
    ///
    /// An empty list yields the reference table.
    pub fn new(mut tiers: Vec<RateTier>) -> BillingResult<Self> {
        tiers.sort_by(|a, b| a.consumption_min.cmp(&b.consumption_min));

        for tier in &tiers {
            if tier.consumption_min.is_sign_negative() {
                return Err(BillingError::InvalidRateSchedule(format!(
                    "tier minimum {} is negative",
                    tier.consumption_min
                )));
            }
            if let Some(max) = tier.consumption_max {
                if max < tier.consumption_min {
                    return Err(BillingError::InvalidRateSchedule(format!(
                        "tier maximum {} is below its minimum {}",
                        max, tier.consumption_min
                    )));
                }
            }
            let price = match tier.pricing {
                TierPricing::PerUnit(m) | TierPricing::Fixed(m) => m,
            };
            if price.is_negative() {
                return Err(BillingError::InvalidRateSchedule(format!(
                    "tier starting at {} has a negative price",
                    tier.consumption_min
                )));
            }
        }

        for pair in tiers.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            match lower.consumption_max {
                Some(max) if max < upper.consumption_min => {}
                Some(_) => {
                    return Err(BillingError::InvalidRateSchedule(format!(
                        "tiers starting at {} and {} overlap",
                        lower.consumption_min, upper.consumption_min
                    )))
                }
                None => {
                    return Err(BillingError::InvalidRateSchedule(format!(
                        "unbounded tier starting at {} must be the last tier",
                        lower.consumption_min
                    )))
                }
            }
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[RateTier] {
        &self.tiers
    }

    pub fn is_reference(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Resolves the base charge for `consumption`
    pub fn resolve(&self, consumption: Decimal) -> BillingResult<Charge> {
        if consumption.is_sign_negative() && !consumption.is_zero() {
            return Err(BillingError::InvalidInput(format!(
                "consumption {} is negative",
                consumption
            )));
        }
        if self.is_reference() {
            Ok(reference_charge(consumption))
        } else {
            self.resolve_configured(consumption)
        }
    }

    fn resolve_configured(&self, consumption: Decimal) -> BillingResult<Charge> {
        if let Some(tier) = self.tiers.iter().find(|t| t.contains(consumption)) {
            return Ok(Charge {
                amount: tier.charge(consumption),
                basis: ChargeBasis::Tier,
            });
        }

        let ceiling = self
            .tiers
            .iter()
            .filter_map(|t| t.consumption_max)
            .max()
            .ok_or(BillingError::NoApplicableTier(consumption))?;
        if consumption <= ceiling {
            return Err(BillingError::NoApplicableTier(consumption));
        }

        let excess_rate = self
            .tiers
            .iter()
            .filter(|t| t.consumption_min >= ceiling)
            .find_map(RateTier::rate_per_unit)
            .ok_or(BillingError::NoApplicableTier(consumption))?;
        let base = self
            .tiers
            .iter()
            .filter(|t| t.consumption_min == ceiling)
            .find_map(RateTier::fixed_amount)
            .unwrap_or(Money::new(REFERENCE_CEILING_CHARGE));

        Ok(Charge {
            amount: base + excess_rate * (consumption - ceiling),
            basis: ChargeBasis::TierExcess,
        })
    }
}

/// Charge from the built-in reference table
///
/// Fractional consumption is floored before lookup. Consumption under the
/// first row has no entry and is charged nothing.
pub fn reference_charge(consumption: Decimal) -> Charge {
    if consumption > Decimal::from(REFERENCE_MAX_CONSUMPTION) {
        let excess = consumption - Decimal::from(REFERENCE_MAX_CONSUMPTION);
        return Charge {
            amount: Money::new(REFERENCE_CEILING_CHARGE + excess * REFERENCE_EXCESS_RATE),
            basis: ChargeBasis::ReferenceExcess,
        };
    }

    let row = consumption
        .floor()
        .to_u32()
        .unwrap_or(0)
        .min(REFERENCE_MAX_CONSUMPTION);
    let amount = row
        .checked_sub(REFERENCE_MIN_CONSUMPTION)
        .map(|index| Decimal::from(REFERENCE_TABLE[index as usize]))
        .unwrap_or(Decimal::ZERO);

    Charge {
        amount: Money::new(amount),
        basis: ChargeBasis::ReferenceTable,
    }
}
