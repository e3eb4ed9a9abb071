use bevy_ecs::prelude::{Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventKind, EventSubject};
use crate::routing::{RouteProviderResource, RouteQuery};
use crate::systems::drop_stale;
use crate::telemetry::RideTelemetry;

pub const ROUTE_UNAVAILABLE: &str = "route unavailable";
pub const ROUTE_LOOKUP_FAILED: &str = "route lookup failed";

/// Resolves the current route lookup. Results for superseded lookups are dropped.
pub fn route_resolved_system(
    event: Res<CurrentEvent>,
    mut query: ResMut<RouteQuery>,
    provider: Res<RouteProviderResource>,
    mut telemetry: Option<ResMut<RideTelemetry>>,
) {
    if event.0.kind != EventKind::RouteResolved {
        return;
    }
    let Some(EventSubject::Route(token)) = event.0.subject else {
        return;
    };
    let Some((origin, destination)) = query.pending(token) else {
        drop_stale(telemetry, &event.0);
        return;
    };

    let failure = match provider.0.route(origin, destination) {
        Ok(Some(route)) => {
            debug!(
                token,
                distance_m = route.distance_meters,
                duration_s = route.duration_seconds,
                "route resolved"
            );
            query.settle(Ok(route));
            return;
        }
        Ok(None) => {
            warn!(token, "no route between origin and destination");
            ROUTE_UNAVAILABLE
        }
        Err(err) => {
            warn!(token, error = %err, "route lookup failed");
            ROUTE_LOOKUP_FAILED
        }
    };
    query.settle(Err(failure.to_string()));
    if let Some(telemetry) = telemetry.as_mut() {
        telemetry.route_failures += 1;
    }
}
