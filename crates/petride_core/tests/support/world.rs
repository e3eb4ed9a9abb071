#![allow(dead_code)]

use bevy_ecs::prelude::{Mut, World};
use petride_core::clock::SimulationClock;
use petride_core::ride::{RideLifecycle, RideTimings};
use petride_core::test_helpers::{create_test_world, test_driver, test_origin};

/// App world with a ride already searching for [test_driver].
pub fn world_with_started_ride() -> World {
    let mut world = create_test_world();
    start_ride(&mut world);
    world
}

pub fn start_ride(world: &mut World) -> u64 {
    let timings = *world.resource::<RideTimings>();
    world.resource_scope(|world, mut ride: Mut<RideLifecycle>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        ride.start(&mut clock, &timings, test_origin().coordinate(), test_driver())
    })
}

pub fn now(world: &World) -> u64 {
    world.resource::<SimulationClock>().now()
}
