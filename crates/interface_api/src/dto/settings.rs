//! Settings and rate tier DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::RateTierId;
use domain_billing::{BillingResult, BillingSettings, GrossAmount, RateTier};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingRequest {
    #[validate(length(min = 1, max = 64, message = "Value is required"))]
    pub value: String,
}

/// One tier; exactly one of `rate_per_unit` and `fixed_amount` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTierDto {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub consumption_min: Decimal,
    pub consumption_max: Option<Decimal>,
    pub rate_per_unit: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
}

impl RateTierDto {
    pub fn into_tier(self) -> BillingResult<RateTier> {
        RateTier::from_parts(
            self.id.map(RateTierId::from_uuid).unwrap_or_default(),
            self.consumption_min,
            self.consumption_max,
            self.rate_per_unit,
            self.fixed_amount,
        )
    }
}

impl From<&RateTier> for RateTierDto {
    fn from(tier: &RateTier) -> Self {
        Self {
            id: Some(tier.id.into()),
            consumption_min: tier.consumption_min,
            consumption_max: tier.consumption_max,
            rate_per_unit: tier.rate_per_unit().map(|m| m.amount()),
            fixed_amount: tier.fixed_amount().map(|m| m.amount()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceRateTiersRequest {
    #[validate(length(min = 1, max = 50, message = "Between 1 and 50 tiers are required"))]
    pub tiers: Vec<RateTierDto>,
}

#[derive(Debug, Serialize)]
pub struct RateScheduleResponse {
    /// True when no tiers are configured and the built-in table applies
    pub reference_table: bool,
    pub tiers: Vec<RateTierDto>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub senior_discount_percent: Decimal,
    pub late_payment_fee: Option<Decimal>,
    pub grace_period_days: u32,
    pub rate_schedule: RateScheduleResponse,
}

impl From<&BillingSettings> for SettingsResponse {
    fn from(settings: &BillingSettings) -> Self {
        Self {
            senior_discount_percent: settings.senior_discount.as_percentage(),
            late_payment_fee: settings.penalty.late_payment_fee.map(|m| m.amount()),
            grace_period_days: settings.penalty.grace_period_days,
            rate_schedule: RateScheduleResponse {
                reference_table: settings.rate_schedule.is_reference(),
                tiers: settings.rate_schedule.tiers().iter().map(RateTierDto::from).collect(),
            },
        }
    }
}

/// Prices a consumption against the active schedule
#[derive(Debug, Deserialize)]
pub struct RatePreviewRequest {
    pub consumption: Decimal,
    /// Applies the senior discount when the customer is old enough
    pub birthdate: Option<NaiveDate>,
    pub billing_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct RatePreviewResponse {
    pub consumption: Decimal,
    pub base_charge: Decimal,
    pub discount: Decimal,
    pub gross_amount: Decimal,
    pub senior_discount_applied: bool,
    pub basis: domain_billing::ChargeBasis,
}

impl From<&GrossAmount> for RatePreviewResponse {
    fn from(gross: &GrossAmount) -> Self {
        Self {
            consumption: gross.consumption,
            base_charge: gross.base_charge.amount(),
            discount: gross.discount.amount(),
            gross_amount: gross.gross_amount.amount(),
            senior_discount_applied: gross.senior_discount_applied,
            basis: gross.basis,
        }
    }
}
