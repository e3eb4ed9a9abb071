use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject};
use crate::dispatch::DriverDispatch;
use crate::systems::drop_stale;
use crate::telemetry::RideTelemetry;

/// The driver let the countdown run out: the offer is declined for them.
pub fn offer_expired_system(
    event: Res<CurrentEvent>,
    mut dispatch: ResMut<DriverDispatch>,
    telemetry: Option<ResMut<RideTelemetry>>,
) {
    if event.0.kind != EventKind::OfferExpired {
        return;
    }
    let Some(EventSubject::Offer(token)) = event.0.subject else {
        return;
    };
    if dispatch.expire(token).is_none() {
        drop_stale(telemetry, &event.0);
    }
}
