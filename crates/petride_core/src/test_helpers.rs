//! Test helpers for common test setup and utilities.

use bevy_ecs::prelude::World;

use crate::app::{build_app, request_route};
use crate::booking::{BookingState, BookingStep, Location};
use crate::config::AppParams;
use crate::geo::Coordinate;
use crate::ride::{DriverInfo, DriverStats, Vehicle};
use crate::routing::RouteQuery;
use crate::runner::{ride_schedule, run_until};

/// 2026-01-01T00:00:00Z, so timestamps in tests are readable.
pub const TEST_EPOCH_MS: i64 = 1_767_225_600_000;
pub const TEST_SEED: u64 = 42;

pub fn test_origin() -> Location {
    Location {
        id: "loc-origin".into(),
        address: "Av. Paulista, 1578".into(),
        lat: -23.5614,
        lng: -46.6559,
    }
}

pub fn test_destination() -> Location {
    Location {
        id: "loc-destination".into(),
        address: "Parque Ibirapuera".into(),
        lat: -23.5874,
        lng: -46.6576,
    }
}

/// Driver starting about 2.5 km from [test_origin].
pub fn test_driver() -> DriverInfo {
    DriverInfo {
        id: "drv-test".into(),
        name: "Test Driver".into(),
        rating: 4.8,
        photo: String::new(),
        phone: String::new(),
        vehicle: Vehicle {
            model: "Spin".into(),
            plate: "TST1A23".into(),
            color: "White".into(),
            year: 2021,
        },
        position: Coordinate::new(-23.5505, -46.6333),
        stats: DriverStats {
            total_rides: 10,
            pets_transported: 12,
            member_since: "2024".into(),
        },
    }
}

pub fn test_params() -> AppParams {
    AppParams::default()
        .with_seed(TEST_SEED)
        .with_epoch_ms(TEST_EPOCH_MS)
}

/// A fully built app world with seeded, reproducible collaborators.
///
/// # Panics
///
/// Panics if the embedded fixtures fail to parse.
pub fn create_test_world() -> World {
    create_test_world_with(test_params())
}

/// # Panics
///
/// Panics if `params` is invalid.
pub fn create_test_world_with(params: AppParams) -> World {
    let mut world = World::new();
    build_app(&mut world, params).expect("test params should be valid");
    world
}

/// Fills the booking with [test_origin], [test_destination] and one pet, and
/// moves it to the summary step.
pub fn book_to_summary(world: &mut World) {
    let mut booking = world.resource_mut::<BookingState>();
    booking.set_origin(Some(test_origin()));
    booking.set_destination(Some(test_destination()));
    booking.add_pet("pet-001");
    while booking.step != BookingStep::Summary {
        booking.next_step();
    }
}

/// Requests the booking's route and advances time until it resolves.
///
/// # Panics
///
/// Panics if the booking has no origin or destination.
pub fn resolve_route(world: &mut World) {
    request_route(world).expect("booking should have both endpoints");
    let mut schedule = ride_schedule();
    while world.resource::<RouteQuery>().is_loading() {
        let next = world
            .resource::<crate::clock::SimulationClock>()
            .next_event_time()
            .expect("route resolution should be scheduled");
        run_until(world, &mut schedule, next);
    }
}
