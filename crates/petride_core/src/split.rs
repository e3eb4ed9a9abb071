//! Revenue split between the driver and the platform.

use serde::Serialize;

pub const DRIVER_SHARE: f64 = 0.70;
pub const PLATFORM_SHARE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenueSplit {
    pub gross: f64,
    /// Driver's share.
    pub net: f64,
    /// Platform fee.
    pub fee: f64,
    pub driver_percentage: f64,
    pub platform_percentage: f64,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn calculate_split(gross: f64) -> RevenueSplit {
    RevenueSplit {
        gross,
        net: round_cents(gross * DRIVER_SHARE),
        fee: round_cents(gross * PLATFORM_SHARE),
        driver_percentage: DRIVER_SHARE * 100.0,
        platform_percentage: PLATFORM_SHARE * 100.0,
    }
}
