use bevy_ecs::prelude::{Res, ResMut};
use tracing::{info, warn};

use crate::booking::{BookingState, BookingStep, Location};
use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::fixtures::Directory;
use crate::payment::{PaymentProcessorResource, PaymentSession};
use crate::ride::{RideLifecycle, RideStatus, RideTimings};
use crate::systems::drop_stale;
use crate::telemetry::RideTelemetry;

/// Settles the pending payment. An approved payment is the one point where a
/// booking turns into a ride: the lifecycle starts only if the booking is
/// still at SUMMARY and no ride is running.
#[allow(clippy::too_many_arguments)]
pub fn payment_resolved_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut session: ResMut<PaymentSession>,
    mut processor: ResMut<PaymentProcessorResource>,
    booking: Res<BookingState>,
    mut ride: ResMut<RideLifecycle>,
    timings: Res<RideTimings>,
    directory: Res<Directory>,
    mut telemetry: Option<ResMut<RideTelemetry>>,
) {
    if event.0.kind != EventKind::PaymentResolved {
        return;
    }
    let Some(EventSubject::Payment(token)) = event.0.subject else {
        return;
    };
    let Some(request) = session.take_pending(token) else {
        drop_stale(telemetry, &event.0);
        return;
    };

    let result = match processor.0.process(&request, clock.now_utc()) {
        Ok(result) if result.success => result,
        Ok(result) => {
            warn!(ride = %request.ride_id, message = %result.message, "payment declined");
            session.settle(Err(result.message));
            if let Some(telemetry) = telemetry.as_mut() {
                telemetry.payment_failures += 1;
            }
            return;
        }
        Err(err) => {
            warn!(ride = %request.ride_id, error = %err, "payment failed");
            session.settle(Err(err.to_string()));
            if let Some(telemetry) = telemetry.as_mut() {
                telemetry.payment_failures += 1;
            }
            return;
        }
    };

    info!(
        ride = %request.ride_id,
        transaction = %result.transaction_id,
        amount = request.amount,
        "payment approved"
    );
    session.settle(Ok(result));
    if let Some(telemetry) = telemetry.as_mut() {
        telemetry.payments_succeeded += 1;
    }

    if booking.step != BookingStep::Summary || ride.status() != RideStatus::Idle {
        warn!(step = ?booking.step, ride = ?ride.status(), "payment approved but ride not started");
        return;
    }
    let Some(origin) = booking.origin.as_ref().map(Location::coordinate) else {
        warn!("payment approved for a booking without origin");
        return;
    };
    ride.start(&mut clock, &timings, origin, directory.dispatch_driver.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    use crate::app::checkout;
    use crate::payment::{DecliningPaymentProcessor, PaymentMethod, PaymentState};
    use crate::systems::test_support::run_one;
    use crate::test_helpers::{book_to_summary, create_test_world, resolve_route};

    fn checked_out_world() -> World {
        let mut world = create_test_world();
        book_to_summary(&mut world);
        resolve_route(&mut world);
        checkout(&mut world, PaymentMethod::Pix).expect("checkout");
        world
    }

    #[test]
    fn approval_starts_the_ride() {
        let mut world = checked_out_world();

        assert!(run_one(&mut world, payment_resolved_system));

        assert!(matches!(
            world.resource::<PaymentSession>().state(),
            PaymentState::Succeeded(result) if result.transaction_id.starts_with("txn_")
        ));
        assert_eq!(world.resource::<RideLifecycle>().status(), RideStatus::Searching);
        assert_eq!(world.resource::<RideTelemetry>().payments_succeeded, 1);
    }

    #[test]
    fn decline_keeps_booking_at_summary() {
        let mut world = checked_out_world();
        world.insert_resource(PaymentProcessorResource(Box::new(DecliningPaymentProcessor)));

        assert!(run_one(&mut world, payment_resolved_system));

        assert_eq!(world.resource::<PaymentSession>().error(), Some("Payment declined"));
        assert_eq!(world.resource::<BookingState>().step, BookingStep::Summary);
        assert_eq!(world.resource::<RideLifecycle>().status(), RideStatus::Idle);
        assert_eq!(world.resource::<RideTelemetry>().payment_failures, 1);
    }

    #[test]
    fn no_handoff_once_booking_left_summary() {
        let mut world = checked_out_world();
        world.resource_mut::<BookingState>().prev_step();

        assert!(run_one(&mut world, payment_resolved_system));

        assert!(matches!(
            world.resource::<PaymentSession>().state(),
            PaymentState::Succeeded(_)
        ));
        assert_eq!(world.resource::<RideLifecycle>().status(), RideStatus::Idle);
    }
}
