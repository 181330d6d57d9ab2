//! Business settings resolution
//!
//! Every value falls back to a hardcoded default when the provider is
//! unreachable or the stored value does not parse. Fallbacks are logged at
//! warn and never fail the calling operation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::{Actor, AuditEntry, Money, Rate, Role};

use crate::error::{BillingError, BillingResult};
use crate::penalty::PenaltySettings;
use crate::ports::SettingsProvider;
use crate::rate_schedule::{RateSchedule, RateTier};
use crate::side_effects::{BillingAction, SideEffects};

pub const SENIOR_DISCOUNT_KEY: &str = "senior_citizen_discount";
pub const LATE_PAYMENT_FEE_KEY: &str = "late_payment_fee";
pub const GRACE_PERIOD_KEY: &str = "due_date_grace_period";

/// Senior-citizen discount when none is configured
pub const DEFAULT_SENIOR_DISCOUNT_PERCENT: Decimal = dec!(5);

/// Snapshot of every setting the billing services need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSettings {
    pub senior_discount: Rate,
    pub penalty: PenaltySettings,
    pub rate_schedule: RateSchedule,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            senior_discount: Rate::from_percentage(DEFAULT_SENIOR_DISCOUNT_PERCENT),
            penalty: PenaltySettings::default(),
            rate_schedule: RateSchedule::reference(),
        }
    }
}

/// The only way billing services read configuration
#[derive(Clone)]
pub struct SettingsResolver {
    provider: Arc<dyn SettingsProvider>,
    effects: SideEffects,
}

impl SettingsResolver {
    pub fn new(provider: Arc<dyn SettingsProvider>, effects: SideEffects) -> Self {
        Self { provider, effects }
    }

    /// Resolves all settings, substituting defaults where needed
    pub async fn resolve(&self) -> BillingSettings {
        let discount_percent = self
            .parsed(SENIOR_DISCOUNT_KEY, parse_percent)
            .await
            .unwrap_or(DEFAULT_SENIOR_DISCOUNT_PERCENT);
        let late_payment_fee = self
            .parsed(LATE_PAYMENT_FEE_KEY, parse_amount)
            .await
            .filter(Money::is_positive);
        let grace_period_days = self
            .parsed(GRACE_PERIOD_KEY, parse_days)
            .await
            .unwrap_or(0);

        BillingSettings {
            senior_discount: Rate::from_percentage(discount_percent),
            penalty: PenaltySettings {
                grace_period_days,
                late_payment_fee,
            },
            rate_schedule: self.rate_schedule().await,
        }
    }

    /// Configured tiers, or the reference table when none are usable
    pub async fn rate_schedule(&self) -> RateSchedule {
        match self.provider.rate_tiers().await {
            Ok(tiers) => RateSchedule::new(tiers).unwrap_or_else(|e| {
                warn!(error = %e, "configured rate tiers are invalid, using reference table");
                RateSchedule::reference()
            }),
            Err(e) => {
                warn!(error = %e, "rate tiers unavailable, using reference table");
                RateSchedule::reference()
            }
        }
    }

    async fn parsed<T>(&self, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
        match self.provider.get_setting(key).await {
            Ok(Some(raw)) => {
                let value = parse(raw.trim());
                if value.is_none() {
                    warn!(key, value = %raw, "unparseable setting, using default");
                }
                value
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "settings unavailable, using default");
                None
            }
        }
    }

    /// Validates and stores a setting value
    pub async fn update_setting(
        &self,
        actor: &Actor,
        key: &str,
        value: &str,
        source: Option<String>,
    ) -> BillingResult<()> {
        require_admin(actor)?;
        let valid = match key {
            SENIOR_DISCOUNT_KEY => parse_percent(value.trim()).is_some(),
            LATE_PAYMENT_FEE_KEY => parse_amount(value.trim()).is_some(),
            GRACE_PERIOD_KEY => parse_days(value.trim()).is_some(),
            other => {
                return Err(BillingError::InvalidInput(format!("unknown setting '{}'", other)));
            }
        };
        if !valid {
            return Err(BillingError::InvalidInput(format!(
                "invalid value '{}' for {}",
                value, key
            )));
        }

        self.provider.put_setting(key, value.trim()).await?;
        info!(key, value, "setting updated");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::SettingUpdated.as_str(), "setting", key)
                    .with_details(json!({ "value": value.trim() }))
                    .with_source(source),
            )
            .await;
        Ok(())
    }

    /// Validates `tiers` as a whole and replaces the configured schedule
    pub async fn replace_rate_tiers(
        &self,
        actor: &Actor,
        tiers: Vec<RateTier>,
        source: Option<String>,
    ) -> BillingResult<RateSchedule> {
        require_admin(actor)?;
        let schedule = RateSchedule::new(tiers)?;

        self.provider.replace_rate_tiers(schedule.tiers()).await?;
        info!(tiers = schedule.tiers().len(), "rate tiers replaced");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::RateTiersReplaced.as_str(), "rate_schedule", "active")
                    .with_details(json!({ "tiers": schedule.tiers() }))
                    .with_source(source),
            )
            .await;
        Ok(schedule)
    }
}

fn require_admin(actor: &Actor) -> BillingResult<()> {
    if actor.has_role(Role::Admin) {
        Ok(())
    } else {
        Err(BillingError::Forbidden(
            "only administrators can change billing settings".to_string(),
        ))
    }
}

fn parse_percent(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .ok()
        .filter(|p| *p >= Decimal::ZERO && *p <= dec!(100))
}

fn parse_amount(raw: &str) -> Option<Money> {
    Decimal::from_str(raw)
        .ok()
        .and_then(|d| Money::non_negative(d).ok())
}

fn parse_days(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::InMemorySettingsProvider;

    fn resolver(provider: InMemorySettingsProvider) -> SettingsResolver {
        SettingsResolver::new(Arc::new(provider), SideEffects::silent())
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let settings = resolver(InMemorySettingsProvider::new()).resolve().await;
        assert_eq!(settings, BillingSettings::default());
    }

    #[tokio::test]
    async fn test_configured_values() {
        let provider = InMemorySettingsProvider::new()
            .with_setting(SENIOR_DISCOUNT_KEY, "20")
            .await
            .with_setting(LATE_PAYMENT_FEE_KEY, "50")
            .await
            .with_setting(GRACE_PERIOD_KEY, "3")
            .await;
        let settings = resolver(provider).resolve().await;

        assert_eq!(settings.senior_discount, Rate::from_percentage(dec!(20)));
        assert_eq!(settings.penalty.late_payment_fee, Some(Money::new(dec!(50))));
        assert_eq!(settings.penalty.grace_period_days, 3);
    }

    #[tokio::test]
    async fn test_garbage_falls_back() {
        let provider = InMemorySettingsProvider::new()
            .with_setting(SENIOR_DISCOUNT_KEY, "lots")
            .await
            .with_setting(GRACE_PERIOD_KEY, "-2")
            .await;
        let settings = resolver(provider).resolve().await;

        assert_eq!(
            settings.senior_discount,
            Rate::from_percentage(DEFAULT_SENIOR_DISCOUNT_PERCENT)
        );
        assert_eq!(settings.penalty.grace_period_days, 0);
    }

    #[tokio::test]
    async fn test_unreachable_provider_falls_back() {
        let provider = InMemorySettingsProvider::new();
        provider.fail_all();
        let settings = resolver(provider).resolve().await;
        assert_eq!(settings, BillingSettings::default());
    }

    #[tokio::test]
    async fn test_non_admin_cannot_update() {
        let r = resolver(InMemorySettingsProvider::new());
        let cashier = Actor::new("cashier-1", Role::Cashier);
        let err = r
            .update_setting(&cashier, GRACE_PERIOD_KEY, "5", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }
}
