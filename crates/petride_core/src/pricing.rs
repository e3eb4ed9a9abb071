//! Fare estimation for a booking.
//!
//! Formula: `base + distance_km * per_km + extra_pets * extra_pet_fee`,
//! where the first pet rides on the base fare. Totals under the minimum get
//! an adjustment line so the breakdown always sums to the total.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::booking::BookingState;
use crate::routing::RouteResult;

pub const BASE_FARE: f64 = 10.00;
pub const PER_KM_RATE: f64 = 2.50;
pub const EXTRA_PET_FEE: f64 = 5.00;
pub const MIN_FARE: f64 = 12.00;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub extra_pet_fee: f64,
    pub min_fare: f64,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: BASE_FARE,
            per_km_rate: PER_KM_RATE,
            extra_pet_fee: EXTRA_PET_FEE,
            min_fare: MIN_FARE,
            currency: "BRL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBreakdownItem {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEstimate {
    pub total: f64,
    pub formatted_total: String,
    pub breakdown: Vec<PriceBreakdownItem>,
}

/// Estimate with the default tariff.
pub fn estimate(distance_km: f64, pet_count: usize) -> PriceEstimate {
    estimate_with(&PricingConfig::default(), distance_km, pet_count)
}

pub fn estimate_with(config: &PricingConfig, distance_km: f64, pet_count: usize) -> PriceEstimate {
    let distance_km = distance_km.max(0.0);
    let mut breakdown = vec![
        PriceBreakdownItem {
            label: "Base fare".to_string(),
            value: config.base_fare,
        },
        PriceBreakdownItem {
            label: format!(
                "Distance ({distance_km:.1} km × {})",
                format_currency(config.per_km_rate)
            ),
            value: distance_km * config.per_km_rate,
        },
    ];

    let extra_pets = pet_count.saturating_sub(1);
    if extra_pets > 0 {
        breakdown.push(PriceBreakdownItem {
            label: format!(
                "Extra pets ({extra_pets} × {})",
                format_currency(config.extra_pet_fee)
            ),
            value: extra_pets as f64 * config.extra_pet_fee,
        });
    }

    let mut total: f64 = breakdown.iter().map(|item| item.value).sum();
    if total < config.min_fare {
        breakdown.push(PriceBreakdownItem {
            label: "Minimum fare adjustment".to_string(),
            value: config.min_fare - total,
        });
        total = config.min_fare;
    }

    PriceEstimate {
        total,
        formatted_total: format_currency(total),
        breakdown,
    }
}

/// Quote for a booking over a resolved route.
pub fn quote(config: &PricingConfig, booking: &BookingState, route: &RouteResult) -> PriceEstimate {
    estimate_with(config, route.distance_km(), booking.selected_pets.len())
}

/// Formats an amount in Brazilian real notation, e.g. `R$ 1.234,56`.
pub fn format_currency(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let units = (cents / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("{sign}R$ {grouped},{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pet_five_km() {
        let estimate = estimate(5.0, 1);
        assert!((estimate.total - 22.50).abs() < 1e-9);
        assert_eq!(estimate.breakdown.len(), 2, "no extra-pet or minimum line");
        assert_eq!(estimate.formatted_total, "R$ 22,50");
    }

    #[test]
    fn extra_pets_are_charged_beyond_the_first() {
        let estimate = estimate(2.0, 3);
        assert!((estimate.total - 25.00).abs() < 1e-9);
        let extra = &estimate.breakdown[2];
        assert_eq!(extra.label, "Extra pets (2 × R$ 5,00)");
        assert!((extra.value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn short_trip_gets_minimum_adjustment() {
        let config = PricingConfig {
            base_fare: 5.0,
            ..PricingConfig::default()
        };
        let estimate = estimate_with(&config, 0.4, 1);
        assert!((estimate.total - MIN_FARE).abs() < 1e-9);
        let adjustment = estimate.breakdown.last().expect("adjustment line");
        assert_eq!(adjustment.label, "Minimum fare adjustment");
        assert!((adjustment.value - 6.0).abs() < 1e-9);
        let sum: f64 = estimate.breakdown.iter().map(|i| i.value).sum();
        assert!((sum - estimate.total).abs() < 1e-9);
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(0.0), "R$ 0,00");
        assert_eq!(format_currency(2.5), "R$ 2,50");
        assert_eq!(format_currency(1234.567), "R$ 1.234,57");
        assert_eq!(format_currency(1_000_000.0), "R$ 1.000.000,00");
        assert_eq!(format_currency(-5.0), "-R$ 5,00");
    }
}
