pub mod driver_arrived;
pub mod driver_found;
pub mod offer_expired;
pub mod payment_resolved;
pub mod position_tick;
pub mod ride_completed;
pub mod ride_started;
pub mod route_resolved;

use bevy_ecs::prelude::ResMut;
use tracing::debug;

use crate::clock::Event;
use crate::telemetry::RideTelemetry;

/// An event whose token no longer matches its owner: superseded or cancelled.
pub(crate) fn drop_stale(telemetry: Option<ResMut<RideTelemetry>>, event: &Event) {
    debug!(kind = ?event.kind, subject = ?event.subject, "dropping stale event");
    if let Some(mut telemetry) = telemetry {
        telemetry.stale_events_dropped += 1;
    }
}
