use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ride::RideLifecycle;
use crate::systems::drop_stale;
use crate::telemetry::RideTelemetry;

/// SEARCHING → DRIVER_FOUND: assigns the driver and starts position ticks.
pub fn driver_found_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut ride: ResMut<RideLifecycle>,
    telemetry: Option<ResMut<RideTelemetry>>,
) {
    if event.0.kind != EventKind::DriverFound {
        return;
    }
    let Some(EventSubject::Ride(generation)) = event.0.subject else {
        return;
    };
    if !ride.on_driver_found(&mut clock, generation) {
        drop_stale(telemetry, &event.0);
    }
}
