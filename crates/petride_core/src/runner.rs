//! Event runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next event from [SimulationClock], inserts it as [CurrentEvent],
//! then runs the schedule.

use bevy_ecs::prelude::Res;
use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::systems::{
    driver_arrived::driver_arrived_system, driver_found::driver_found_system,
    offer_expired::offer_expired_system, payment_resolved::payment_resolved_system,
    position_tick::position_tick_system, ride_completed::ride_completed_system,
    ride_started::ride_started_system, route_resolved::route_resolved_system,
};

fn is_event(event: &Option<Res<CurrentEvent>>, kind: EventKind) -> bool {
    event.as_ref().map(|e| e.0.kind == kind).unwrap_or(false)
}

fn is_driver_found(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::DriverFound)
}

fn is_position_tick(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::PositionTick)
}

fn is_driver_arrived(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::DriverArrived)
}

fn is_ride_started(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::RideStarted)
}

fn is_ride_completed(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::RideCompleted)
}

fn is_payment_resolved(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::PaymentResolved)
}

fn is_route_resolved(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::RouteResolved)
}

fn is_offer_expired(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::OfferExpired)
}

/// Every event-reacting system, each gated on its event kind.
pub fn ride_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        route_resolved_system.run_if(is_route_resolved),
        payment_resolved_system.run_if(is_payment_resolved),
        driver_found_system.run_if(is_driver_found),
        position_tick_system.run_if(is_position_tick),
        driver_arrived_system.run_if(is_driver_arrived),
        ride_started_system.run_if(is_ride_started),
        ride_completed_system.run_if(is_ride_completed),
        offer_expired_system.run_if(is_offer_expired),
    ));
    schedule
}

/// Runs one step: pops the next event, inserts it as [CurrentEvent], then runs the schedule.
/// Returns `false` if the clock was empty.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Runs steps until the event queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Advances simulated time to `until_ms`, processing every event due at or
/// before it. The clock ends at `until_ms` even if nothing was due.
pub fn run_until(world: &mut World, schedule: &mut Schedule, until_ms: u64) -> usize {
    let mut steps = 0;
    while world
        .resource::<SimulationClock>()
        .next_event_time()
        .is_some_and(|ts| ts <= until_ms)
    {
        if !run_next_event(world, schedule) {
            break;
        }
        steps += 1;
    }
    world.resource_mut::<SimulationClock>().advance_to(until_ms);
    steps
}

/// [run_until] relative to the current time.
pub fn run_for(world: &mut World, schedule: &mut Schedule, delta_ms: u64) -> usize {
    let until = world.resource::<SimulationClock>().now() + delta_ms;
    run_until(world, schedule, until)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::EventSubject;

    #[test]
    fn run_until_stops_at_the_boundary() {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        let mut clock = world.resource_mut::<SimulationClock>();
        clock.schedule_at(100, EventKind::OfferExpired, Some(EventSubject::Offer(1)));
        clock.schedule_at(200, EventKind::OfferExpired, Some(EventSubject::Offer(2)));
        clock.schedule_at(201, EventKind::OfferExpired, Some(EventSubject::Offer(3)));

        // No systems: only the clock is exercised.
        let mut schedule = Schedule::default();
        assert_eq!(run_until(&mut world, &mut schedule, 200), 2);
        let clock = world.resource::<SimulationClock>();
        assert_eq!(clock.now(), 200);
        assert_eq!(clock.pending(), 1);

        assert_eq!(run_for(&mut world, &mut schedule, 50), 1);
        assert_eq!(world.resource::<SimulationClock>().now(), 250);
    }

    #[test]
    fn run_until_empty_respects_step_limit() {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        for ts in 0..5 {
            world
                .resource_mut::<SimulationClock>()
                .schedule_at(ts, EventKind::PositionTick, None);
        }
        let mut schedule = Schedule::default();
        assert_eq!(run_until_empty(&mut world, &mut schedule, 3), 3);
        assert_eq!(run_until_empty(&mut world, &mut schedule, 10), 2);
        assert!(!run_next_event(&mut world, &mut schedule));
    }
}
