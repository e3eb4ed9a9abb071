//! Application parameters. Every field has a default, so a config file only
//! needs the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::payment::DEFAULT_PAYMENT_DELAY_MS;
use crate::pricing::PricingConfig;
use crate::ride::RideTimings;
use crate::routing::RouteProviderKind;

/// Simulated round trip of a route lookup.
pub const DEFAULT_ROUTE_LATENCY_MS: u64 = 400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppParams {
    /// Seed for transaction ids. If None, ids come from entropy.
    pub seed: Option<u64>,
    /// Wall-clock time at simulation time 0. If None, defaults to 0.
    pub epoch_ms: Option<i64>,
    pub ride_timings: RideTimings,
    pub pricing: PricingConfig,
    pub payment_delay_ms: u64,
    pub route_latency_ms: u64,
    pub route_provider: RouteProviderKind,
    /// Install a processor that declines every payment.
    pub decline_payments: bool,
}

impl Default for AppParams {
    fn default() -> Self {
        Self {
            seed: None,
            epoch_ms: None,
            ride_timings: RideTimings::default(),
            pricing: PricingConfig::default(),
            payment_delay_ms: DEFAULT_PAYMENT_DELAY_MS,
            route_latency_ms: DEFAULT_ROUTE_LATENCY_MS,
            route_provider: RouteProviderKind::default(),
            decline_payments: false,
        }
    }
}

impl AppParams {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: AppParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pricing;
        let rates = [
            ("base_fare", p.base_fare),
            ("per_km_rate", p.per_km_rate),
            ("extra_pet_fee", p.extra_pet_fee),
            ("min_fare", p.min_fare),
        ];
        if let Some((name, value)) = rates.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pricing.{name} must be a non-negative number, got {value}"
            )));
        }
        if p.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("pricing.currency is empty".to_string()));
        }
        if self.ride_timings.arrival_ms > 0 && self.ride_timings.tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "ride_timings.tick_ms must be positive when arrival_ms is".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the epoch in milliseconds (real-world time corresponding to simulation time 0).
    pub fn with_epoch_ms(mut self, epoch_ms: i64) -> Self {
        self.epoch_ms = Some(epoch_ms);
        self
    }

    pub fn with_ride_timings(mut self, ride_timings: RideTimings) -> Self {
        self.ride_timings = ride_timings;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_payment_delay_ms(mut self, delay_ms: u64) -> Self {
        self.payment_delay_ms = delay_ms;
        self
    }

    pub fn with_route_latency_ms(mut self, latency_ms: u64) -> Self {
        self.route_latency_ms = latency_ms;
        self
    }

    pub fn with_route_provider(mut self, kind: RouteProviderKind) -> Self {
        self.route_provider = kind;
        self
    }

    pub fn with_declined_payments(mut self, decline: bool) -> Self {
        self.decline_payments = decline;
        self
    }
}
