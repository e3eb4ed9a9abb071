//! Ride lifecycle: a timer-driven progression from dispatch to drop-off.
//!
//! `start` schedules all four forward transitions on the [SimulationClock] up
//! front, tagged with the ride's generation. Cancelling purges those events
//! and bumps the generation, so a transition that somehow survives the purge
//! is still rejected by [RideLifecycle::is_current].

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{EventKind, EventSubject, SimulationClock, ONE_SEC_MS};
use crate::geo::Coordinate;

pub const DEFAULT_BASE_ETA_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    #[default]
    Idle,
    Searching,
    DriverFound,
    Arrived,
    OnRide,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub model: String,
    pub plate: String,
    pub color: String,
    pub year: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub total_rides: u32,
    pub pets_transported: u32,
    pub member_since: String,
}

/// Driver assigned to a rider's request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub id: String,
    pub name: String,
    pub rating: f32,
    pub photo: String,
    pub phone: String,
    pub vehicle: Vehicle,
    /// Where the driver starts when the match is made.
    pub position: Coordinate,
    pub stats: DriverStats,
}

/// Simulation durations. Stand-ins for real dispatch latency and GPS ETAs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct RideTimings {
    pub search_ms: u64,
    pub arrival_ms: u64,
    pub gap_ms: u64,
    pub ride_ms: u64,
    pub tick_ms: u64,
    pub base_eta_minutes: u32,
}

impl Default for RideTimings {
    fn default() -> Self {
        Self {
            search_ms: 5 * ONE_SEC_MS,
            arrival_ms: 10 * ONE_SEC_MS,
            gap_ms: 2 * ONE_SEC_MS,
            ride_ms: 10 * ONE_SEC_MS,
            tick_ms: ONE_SEC_MS,
            base_eta_minutes: DEFAULT_BASE_ETA_MINUTES,
        }
    }
}

impl RideTimings {
    /// Time from `start` to `COMPLETED`.
    pub fn total_ms(&self) -> u64 {
        self.search_ms
            .saturating_add(self.arrival_ms)
            .saturating_add(self.gap_ms)
            .saturating_add(self.ride_ms)
    }
}

/// Simulation timestamps of each milestone of the current ride.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RideMilestones {
    pub requested_at: Option<u64>,
    pub driver_found_at: Option<u64>,
    pub arrived_at: Option<u64>,
    pub on_ride_at: Option<u64>,
    pub completed_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub timestamp: u64,
    pub generation: u64,
    pub status: RideStatus,
}

/// Cubic ease-out: fast start, slow approach.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Driver position at `progress` of the approach, eased.
pub fn interpolate_position(start: Coordinate, end: Coordinate, progress: f64) -> Coordinate {
    start.lerp(end, ease_out_cubic(progress))
}

/// Remaining minutes, never below one while the driver is still approaching.
pub fn eta_minutes(base_eta_minutes: u32, progress: f64) -> u32 {
    let remaining = (f64::from(base_eta_minutes) * (1.0 - progress.clamp(0.0, 1.0))).round();
    (remaining as u32).max(1)
}

#[derive(Debug, Resource)]
pub struct RideLifecycle {
    status: RideStatus,
    driver: Option<DriverInfo>,
    driver_position: Option<Coordinate>,
    estimated_arrival_minutes: u32,
    generation: u64,
    origin: Option<Coordinate>,
    candidate: Option<DriverInfo>,
    timings: RideTimings,
    milestones: RideMilestones,
    history: Vec<StatusChange>,
}

impl Default for RideLifecycle {
    fn default() -> Self {
        Self {
            status: RideStatus::Idle,
            driver: None,
            driver_position: None,
            estimated_arrival_minutes: DEFAULT_BASE_ETA_MINUTES,
            generation: 0,
            origin: None,
            candidate: None,
            timings: RideTimings::default(),
            milestones: RideMilestones::default(),
            history: Vec::new(),
        }
    }
}

impl RideLifecycle {
    pub fn status(&self) -> RideStatus {
        self.status
    }

    pub fn driver(&self) -> Option<&DriverInfo> {
        self.driver.as_ref()
    }

    pub fn driver_position(&self) -> Option<Coordinate> {
        self.driver_position
    }

    pub fn estimated_arrival_minutes(&self) -> u32 {
        self.estimated_arrival_minutes
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn origin(&self) -> Option<Coordinate> {
        self.origin
    }

    pub fn milestones(&self) -> RideMilestones {
        self.milestones
    }

    /// Every status change since creation, across rides.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// True when an event tagged `generation` may move the ride out of `expected`.
    pub fn is_current(&self, generation: u64, expected: RideStatus) -> bool {
        generation == self.generation && self.status == expected
    }

    /// Begins a search for `driver` to pick the rider up at `origin`.
    /// Starting a ride that is already running restarts it.
    pub fn start(
        &mut self,
        clock: &mut SimulationClock,
        timings: &RideTimings,
        origin: Coordinate,
        driver: DriverInfo,
    ) -> u64 {
        self.purge_pending(clock);
        self.generation += 1;
        self.timings = *timings;
        self.origin = Some(origin);
        self.candidate = Some(driver);
        self.driver = None;
        self.driver_position = None;
        self.estimated_arrival_minutes = timings.base_eta_minutes;
        self.milestones = RideMilestones {
            requested_at: Some(clock.now()),
            ..RideMilestones::default()
        };
        self.set_status(clock.now(), RideStatus::Searching);

        let subject = Some(EventSubject::Ride(self.generation));
        let found_at = timings.search_ms;
        let arrived_at = found_at.saturating_add(timings.arrival_ms);
        let started_at = arrived_at.saturating_add(timings.gap_ms);
        let completed_at = started_at.saturating_add(timings.ride_ms);
        clock.schedule_in(found_at, EventKind::DriverFound, subject);
        clock.schedule_in(arrived_at, EventKind::DriverArrived, subject);
        clock.schedule_in(started_at, EventKind::RideStarted, subject);
        clock.schedule_in(completed_at, EventKind::RideCompleted, subject);

        info!(generation = self.generation, "ride search started");
        self.generation
    }

    /// Aborts the ride. Idempotent: returns false from `IDLE`.
    pub fn cancel(&mut self, clock: &mut SimulationClock) -> bool {
        if self.status == RideStatus::Idle {
            return false;
        }
        info!(generation = self.generation, from = ?self.status, "ride cancelled");
        self.reset_to_idle(clock);
        true
    }

    /// Acknowledges the ride (normally after feedback) and returns to `IDLE`.
    /// Returns the status the ride was in.
    pub fn complete_ride(&mut self, clock: &mut SimulationClock) -> RideStatus {
        let previous = self.status;
        if previous != RideStatus::Idle {
            self.reset_to_idle(clock);
        }
        previous
    }

    pub(crate) fn on_driver_found(&mut self, clock: &mut SimulationClock, generation: u64) -> bool {
        if !self.is_current(generation, RideStatus::Searching) {
            return false;
        }
        let Some(driver) = self.candidate.take() else {
            return false;
        };
        let now = clock.now();
        self.driver_position = Some(driver.position);
        self.driver = Some(driver);
        self.milestones.driver_found_at = Some(now);
        self.set_status(now, RideStatus::DriverFound);
        if self.timings.tick_ms > 0 && self.timings.arrival_ms > 0 {
            clock.schedule_in(
                self.timings.tick_ms,
                EventKind::PositionTick,
                Some(EventSubject::Ride(generation)),
            );
        }
        true
    }

    pub(crate) fn on_position_tick(&mut self, clock: &mut SimulationClock, generation: u64) -> bool {
        if !self.is_current(generation, RideStatus::DriverFound) {
            return false;
        }
        let start = self.driver.as_ref().map(|d| d.position);
        let (Some(found_at), Some(origin), Some(start)) =
            (self.milestones.driver_found_at, self.origin, start)
        else {
            return false;
        };
        let elapsed = clock.now().saturating_sub(found_at);
        let progress = if self.timings.arrival_ms == 0 {
            1.0
        } else {
            (elapsed as f64 / self.timings.arrival_ms as f64).min(1.0)
        };
        self.driver_position = Some(interpolate_position(start, origin, progress));
        self.estimated_arrival_minutes = eta_minutes(self.timings.base_eta_minutes, progress);
        if progress < 1.0 {
            clock.schedule_in(
                self.timings.tick_ms,
                EventKind::PositionTick,
                Some(EventSubject::Ride(generation)),
            );
        }
        true
    }

    pub(crate) fn on_driver_arrived(&mut self, clock: &mut SimulationClock, generation: u64) -> bool {
        if !self.is_current(generation, RideStatus::DriverFound) {
            return false;
        }
        clock.cancel_where(|e| {
            e.kind == EventKind::PositionTick && e.subject == Some(EventSubject::Ride(generation))
        });
        let now = clock.now();
        self.driver_position = self.origin;
        self.estimated_arrival_minutes = 0;
        self.milestones.arrived_at = Some(now);
        self.set_status(now, RideStatus::Arrived);
        true
    }

    pub(crate) fn on_ride_started(&mut self, now: u64, generation: u64) -> bool {
        if !self.is_current(generation, RideStatus::Arrived) {
            return false;
        }
        self.milestones.on_ride_at = Some(now);
        self.set_status(now, RideStatus::OnRide);
        true
    }

    pub(crate) fn on_ride_completed(&mut self, now: u64, generation: u64) -> bool {
        if !self.is_current(generation, RideStatus::OnRide) {
            return false;
        }
        self.milestones.completed_at = Some(now);
        self.set_status(now, RideStatus::Completed);
        info!(generation, "ride completed");
        true
    }

    fn reset_to_idle(&mut self, clock: &mut SimulationClock) {
        self.purge_pending(clock);
        self.generation += 1;
        self.driver = None;
        self.driver_position = None;
        self.candidate = None;
        self.estimated_arrival_minutes = self.timings.base_eta_minutes;
        self.set_status(clock.now(), RideStatus::Idle);
    }

    fn purge_pending(&self, clock: &mut SimulationClock) {
        let removed = clock.cancel_where(|e| matches!(e.subject, Some(EventSubject::Ride(_))));
        if removed > 0 {
            debug!(removed, generation = self.generation, "purged pending ride events");
        }
    }

    fn set_status(&mut self, timestamp: u64, status: RideStatus) {
        debug!(generation = self.generation, from = ?self.status, to = ?status, "ride status changed");
        self.status = status;
        self.history.push(StatusChange {
            timestamp,
            generation: self.generation,
            status,
        });
    }
}
