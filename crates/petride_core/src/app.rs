//! World assembly and the user-facing actions that span several resources.
//!
//! State machines live in their own modules and know nothing of each other;
//! the functions here are the only place the booking, the route lookup, the
//! payment session and the ride lifecycle meet outside the event systems.

use bevy_ecs::prelude::{Mut, Resource, World};
use tracing::{debug, info};

use crate::booking::{BookingState, BookingStep, Location};
use crate::clock::SimulationClock;
use crate::config::AppParams;
use crate::dispatch::{ActiveRideState, DriverDispatch, IncomingRide};
use crate::error::{CheckoutError, ConfigError, DispatchError, OnboardingError};
use crate::feedback::RideFeedback;
use crate::fixtures::Directory;
use crate::onboarding::{DriverAccount, OnboardingCommand};
use crate::payment::{
    DecliningPaymentProcessor, PaymentMethod, PaymentProcessor, PaymentProcessorResource,
    PaymentRequest, PaymentSession, SimulatedPaymentProcessor,
};
use crate::pricing::{quote as price_quote, PriceEstimate, PricingConfig};
use crate::ride::{RideLifecycle, RideStatus, RideTimings};
use crate::routing::{build_route_provider, RouteProviderResource, RouteQuery};
use crate::split::RevenueSplit;
use crate::telemetry::{CompletedRideRecord, FeedbackRecord, RideTelemetry};

/// Called once for every ride that reaches `COMPLETED`.
#[derive(Resource)]
pub struct RideCompletionHook(pub Box<dyn FnMut(&CompletedRideRecord) + Send + Sync>);

impl RideCompletionHook {
    pub fn new(hook: impl FnMut(&CompletedRideRecord) + Send + Sync + 'static) -> Self {
        Self(Box::new(hook))
    }
}

/// Inserts every resource the schedule needs.
pub fn build_app(world: &mut World, params: AppParams) -> Result<(), ConfigError> {
    params.validate()?;
    let directory = Directory::embedded()?;
    let route_provider = build_route_provider(&params.route_provider)
        .map_err(|err| ConfigError::Invalid(format!("route provider: {err}")))?;
    let processor: Box<dyn PaymentProcessor> = if params.decline_payments {
        Box::new(DecliningPaymentProcessor)
    } else {
        Box::new(SimulatedPaymentProcessor::new(params.seed))
    };

    world.insert_resource(SimulationClock::with_epoch(params.epoch_ms.unwrap_or(0)));
    world.insert_resource(params.ride_timings);
    world.insert_resource(params.pricing);
    world.insert_resource(BookingState::default());
    world.insert_resource(RideLifecycle::default());
    world.insert_resource(RouteQuery::new(params.route_latency_ms));
    world.insert_resource(RouteProviderResource(route_provider));
    world.insert_resource(PaymentSession::new(params.payment_delay_ms));
    world.insert_resource(PaymentProcessorResource(processor));
    world.insert_resource(DriverAccount::from_snapshot(directory.driver_snapshot.clone()));
    world.insert_resource(DriverDispatch::default());
    world.insert_resource(RideTelemetry::default());
    world.insert_resource(directory);

    info!(
        provider = ?params.route_provider,
        decline_payments = params.decline_payments,
        "app resources installed"
    );
    Ok(())
}

/// Looks up the route between the booking's origin and destination,
/// superseding any lookup in flight.
pub fn request_route(world: &mut World) -> Option<u64> {
    let booking = world.resource::<BookingState>();
    let origin = booking.origin.as_ref().map(Location::coordinate);
    let destination = booking.destination.as_ref().map(Location::coordinate);
    world.resource_scope(|world, mut query: Mut<RouteQuery>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        query.request(&mut clock, origin, destination)
    })
}

/// Fare for the current booking, once the route is known.
pub fn quote(world: &World) -> Option<PriceEstimate> {
    let route = world.resource::<RouteQuery>().route()?;
    Some(price_quote(
        world.resource::<PricingConfig>(),
        world.resource::<BookingState>(),
        route,
    ))
}

/// Submits payment for the booking. The ride starts when the payment clears.
pub fn checkout(world: &mut World, method: PaymentMethod) -> Result<PaymentRequest, CheckoutError> {
    let booking = world.resource::<BookingState>();
    if booking.step != BookingStep::Summary {
        return Err(CheckoutError::NotAtSummary);
    }
    if !booking.is_complete() {
        return Err(CheckoutError::IncompleteBooking);
    }
    if world.resource::<PaymentSession>().is_pending() {
        return Err(CheckoutError::PaymentPending);
    }
    let ride = world.resource::<RideLifecycle>();
    if ride.status() != RideStatus::Idle {
        return Err(CheckoutError::RideInProgress);
    }
    let ride_id = format!("ride_{}", ride.generation() + 1);
    let estimate = quote(world).ok_or(CheckoutError::RouteNotReady)?;

    let request = PaymentRequest {
        method,
        amount: estimate.total,
        ride_id,
    };
    world.resource_scope(|world, mut session: Mut<PaymentSession>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        session.request(&mut clock, request.clone());
    });
    Ok(request)
}

/// Rider aborts the ride. Returns false if there was nothing to cancel.
pub fn cancel_ride(world: &mut World) -> bool {
    let cancelled = world.resource_scope(|world, mut ride: Mut<RideLifecycle>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        ride.cancel(&mut clock)
    });
    if cancelled {
        world.resource_mut::<RideTelemetry>().rides_cancelled += 1;
    }
    cancelled
}

/// Closes the ride screen: records feedback for a completed ride, returns the
/// lifecycle to `IDLE` and clears the booking. Returns the status the ride was in.
pub fn acknowledge_ride(world: &mut World, feedback: Option<RideFeedback>) -> RideStatus {
    let (previous, generation, driver_id) =
        world.resource_scope(|world, mut ride: Mut<RideLifecycle>| {
            let generation = ride.generation();
            let driver_id = ride.driver().map(|d| d.id.clone());
            let mut clock = world.resource_mut::<SimulationClock>();
            (ride.complete_ride(&mut clock), generation, driver_id)
        });

    match feedback {
        Some(feedback) if previous == RideStatus::Completed => {
            debug!(generation, rating = feedback.rating(), "ride feedback recorded");
            world.resource_mut::<RideTelemetry>().feedback.push(FeedbackRecord {
                generation,
                driver_id,
                feedback,
            });
        }
        Some(_) => debug!(?previous, "feedback ignored for unfinished ride"),
        None => {}
    }
    reset_checkout(world);
    previous
}

/// Tears the rider session down; nothing scheduled for it fires afterwards.
pub fn unmount(world: &mut World) {
    cancel_ride(world);
    reset_checkout(world);
}

fn reset_checkout(world: &mut World) {
    world.resource_mut::<BookingState>().reset();
    world.resource_scope(|world, mut session: Mut<PaymentSession>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        session.abandon(&mut clock);
    });
    world.resource_scope(|world, mut query: Mut<RouteQuery>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        query.clear(&mut clock);
    });
}

/// Applies an onboarding command stamped with the simulation's wall-clock time.
pub fn apply_onboarding(world: &mut World, command: OnboardingCommand) -> Result<bool, OnboardingError> {
    let at = world.resource::<SimulationClock>().now_utc();
    world.resource_mut::<DriverAccount>().apply(command, at)
}

pub fn offer_ride(world: &mut World, ride: IncomingRide) -> Result<u64, DispatchError> {
    world.resource_scope(|world, mut dispatch: Mut<DriverDispatch>| {
        world.resource_scope(|world, mut clock: Mut<SimulationClock>| {
            dispatch.offer(&mut clock, world.resource::<DriverAccount>(), ride)
        })
    })
}

pub fn accept_offer(world: &mut World, ride_id: &str) -> Result<ActiveRideState, DispatchError> {
    world.resource_scope(|world, mut dispatch: Mut<DriverDispatch>| {
        world.resource_scope(|world, mut account: Mut<DriverAccount>| {
            let mut clock = world.resource_mut::<SimulationClock>();
            dispatch
                .accept(&mut clock, &mut account, ride_id)
                .map(|active| active.state)
        })
    })
}

pub fn decline_offer(world: &mut World, ride_id: &str) -> Result<IncomingRide, DispatchError> {
    world.resource_scope(|world, mut dispatch: Mut<DriverDispatch>| {
        let mut clock = world.resource_mut::<SimulationClock>();
        dispatch.decline(&mut clock, ride_id)
    })
}

/// Closes the driver's completed ride and credits the wallet.
pub fn finish_dispatched_ride(world: &mut World) -> Result<RevenueSplit, DispatchError> {
    let at = world.resource::<SimulationClock>().now_utc();
    world.resource_scope(|world, mut dispatch: Mut<DriverDispatch>| {
        let mut account = world.resource_mut::<DriverAccount>();
        dispatch.finish_ride(&mut account, at)
    })
}

pub fn ride_timings(world: &World) -> RideTimings {
    *world.resource::<RideTimings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        let mut world = World::new();
        build_app(&mut world, AppParams::default().with_seed(1)).expect("app builds");
        world
    }

    #[test]
    fn build_app_installs_fixtures_and_defaults() {
        let world = world();
        assert_eq!(world.resource::<RideLifecycle>().status(), RideStatus::Idle);
        assert_eq!(world.resource::<Directory>().pets.len(), 4);
        assert_eq!(ride_timings(&world), RideTimings::default());
        assert!(world.resource::<SimulationClock>().is_empty());
    }

    #[test]
    fn checkout_requires_summary_step() {
        let mut world = world();
        assert_eq!(
            checkout(&mut world, PaymentMethod::Pix),
            Err(CheckoutError::NotAtSummary)
        );
        world.resource_mut::<BookingState>().go_to_step(BookingStep::Summary);
        assert_eq!(
            checkout(&mut world, PaymentMethod::Pix),
            Err(CheckoutError::IncompleteBooking)
        );
        assert!(world.resource::<SimulationClock>().is_empty());
    }

    #[test]
    fn route_request_needs_both_endpoints() {
        let mut world = world();
        assert_eq!(request_route(&mut world), None);
        let home = world.resource::<Directory>().location("loc-home").cloned();
        world.resource_mut::<BookingState>().set_origin(home);
        assert_eq!(request_route(&mut world), None);
        assert!(world.resource::<SimulationClock>().is_empty());
    }

    #[test]
    fn cancel_from_idle_is_not_counted() {
        let mut world = world();
        assert!(!cancel_ride(&mut world));
        assert_eq!(world.resource::<RideTelemetry>().rides_cancelled, 0);
    }
}
