//! Telemetry: records finished rides and failure counts for inspection.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::feedback::RideFeedback;
use crate::ride::RideMilestones;

/// One ride that reached `COMPLETED`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRideRecord {
    pub generation: u64,
    pub driver_id: String,
    pub requested_at: u64,
    pub driver_found_at: u64,
    pub arrived_at: u64,
    pub on_ride_at: u64,
    pub completed_at: u64,
}

impl CompletedRideRecord {
    pub fn from_milestones(generation: u64, driver_id: String, m: RideMilestones) -> Option<Self> {
        Some(Self {
            generation,
            driver_id,
            requested_at: m.requested_at?,
            driver_found_at: m.driver_found_at?,
            arrived_at: m.arrived_at?,
            on_ride_at: m.on_ride_at?,
            completed_at: m.completed_at?,
        })
    }

    /// Time from request to driver assignment.
    pub fn time_to_match(&self) -> u64 {
        self.driver_found_at.saturating_sub(self.requested_at)
    }

    /// Time from assignment to the driver reaching the pickup.
    pub fn time_to_pickup(&self) -> u64 {
        self.arrived_at.saturating_sub(self.driver_found_at)
    }

    /// Time with the pets on board.
    pub fn trip_duration(&self) -> u64 {
        self.completed_at.saturating_sub(self.on_ride_at)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRecord {
    pub generation: u64,
    pub driver_id: Option<String>,
    pub feedback: RideFeedback,
}

#[derive(Debug, Default, Resource, Serialize)]
pub struct RideTelemetry {
    pub completed_rides: Vec<CompletedRideRecord>,
    pub feedback: Vec<FeedbackRecord>,
    pub rides_cancelled: u64,
    pub payments_succeeded: u64,
    pub payment_failures: u64,
    pub route_failures: u64,
    pub stale_events_dropped: u64,
}
