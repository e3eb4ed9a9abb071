use bevy_ecs::prelude::{Res, ResMut};

use crate::app::RideCompletionHook;
use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ride::RideLifecycle;
use crate::systems::drop_stale;
use crate::telemetry::{CompletedRideRecord, RideTelemetry};

/// ON_RIDE → COMPLETED: fires the completion hook and records the ride.
pub fn ride_completed_system(
    event: Res<CurrentEvent>,
    clock: Res<SimulationClock>,
    mut ride: ResMut<RideLifecycle>,
    mut telemetry: Option<ResMut<RideTelemetry>>,
    hook: Option<ResMut<RideCompletionHook>>,
) {
    if event.0.kind != EventKind::RideCompleted {
        return;
    }
    let Some(EventSubject::Ride(generation)) = event.0.subject else {
        return;
    };
    if !ride.on_ride_completed(clock.now(), generation) {
        drop_stale(telemetry, &event.0);
        return;
    }

    let driver_id = ride.driver().map(|d| d.id.clone()).unwrap_or_default();
    let Some(record) = CompletedRideRecord::from_milestones(generation, driver_id, ride.milestones())
    else {
        return;
    };
    if let Some(mut hook) = hook {
        (hook.0)(&record);
    }
    if let Some(telemetry) = telemetry.as_mut() {
        telemetry.completed_rides.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bevy_ecs::prelude::{Mut, Schedule, World};

    use crate::ride::{RideStatus, RideTimings};
    use crate::runner::{ride_schedule, run_until_empty};
    use crate::systems::test_support::run_one;
    use crate::test_helpers::{test_driver, test_origin};

    fn started_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(RideLifecycle::default());
        world.insert_resource(RideTelemetry::default());
        world.resource_scope(|world, mut ride: Mut<RideLifecycle>| {
            let mut clock = world.resource_mut::<SimulationClock>();
            ride.start(&mut clock, &RideTimings::default(), test_origin().coordinate(), test_driver());
        });
        world
    }

    #[test]
    fn full_run_fires_hook_once_and_records_milestones() {
        let mut world = started_world();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        world.insert_resource(RideCompletionHook::new(move |record| {
            assert_eq!(record.driver_id, "drv-test");
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let mut schedule: Schedule = ride_schedule();
        run_until_empty(&mut world, &mut schedule, 100);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(world.resource::<RideLifecycle>().status(), RideStatus::Completed);
        let telemetry = world.resource::<RideTelemetry>();
        assert_eq!(telemetry.completed_rides.len(), 1);
        let record = &telemetry.completed_rides[0];
        assert_eq!(record.time_to_match(), 5_000);
        assert_eq!(record.time_to_pickup(), 10_000);
        assert_eq!(record.trip_duration(), 10_000);
        assert_eq!(record.completed_at, RideTimings::default().total_ms());
    }

    #[test]
    fn completion_for_cancelled_ride_is_ignored() {
        let mut world = started_world();
        let generation = world.resource::<RideLifecycle>().generation();
        world.resource_scope(|world, mut ride: Mut<RideLifecycle>| {
            let mut clock = world.resource_mut::<SimulationClock>();
            ride.cancel(&mut clock);
        });
        world.resource_mut::<SimulationClock>().schedule_at(
            30_000,
            EventKind::RideCompleted,
            Some(EventSubject::Ride(generation)),
        );

        assert!(run_one(&mut world, ride_completed_system));

        assert_eq!(world.resource::<RideLifecycle>().status(), RideStatus::Idle);
        assert!(world.resource::<RideTelemetry>().completed_rides.is_empty());
    }
}
