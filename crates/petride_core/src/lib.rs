pub mod app;
pub mod booking;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod empathy;
pub mod error;
pub mod feedback;
pub mod fixtures;
pub mod geo;
pub mod onboarding;
pub mod payment;
pub mod pricing;
pub mod ride;
pub mod routing;
pub mod runner;
pub mod split;
pub mod systems;
pub mod telemetry;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;
