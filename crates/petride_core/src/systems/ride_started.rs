use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ride::RideLifecycle;
use crate::systems::drop_stale;
use crate::telemetry::RideTelemetry;

/// ARRIVED → ON_RIDE.
pub fn ride_started_system(
    event: Res<CurrentEvent>,
    clock: Res<SimulationClock>,
    mut ride: ResMut<RideLifecycle>,
    telemetry: Option<ResMut<RideTelemetry>>,
) {
    if event.0.kind != EventKind::RideStarted {
        return;
    }
    let Some(EventSubject::Ride(generation)) = event.0.subject else {
        return;
    };
    if !ride.on_ride_started(clock.now(), generation) {
        drop_stale(telemetry, &event.0);
    }
}
