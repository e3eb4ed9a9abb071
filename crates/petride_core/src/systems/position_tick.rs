use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ride::RideLifecycle;
use crate::systems::drop_stale;
use crate::telemetry::RideTelemetry;

/// Moves the assigned driver toward the pickup and lowers the ETA.
pub fn position_tick_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut ride: ResMut<RideLifecycle>,
    telemetry: Option<ResMut<RideTelemetry>>,
) {
    if event.0.kind != EventKind::PositionTick {
        return;
    }
    let Some(EventSubject::Ride(generation)) = event.0.subject else {
        return;
    };
    if !ride.on_position_tick(&mut clock, generation) {
        drop_stale(telemetry, &event.0);
    }
}
