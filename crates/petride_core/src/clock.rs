//! Virtual millisecond clock with a min-heap of pending events.
//!
//! Nothing in the crate reads wall-clock time; every timer is an [Event] on
//! this clock, so tests advance time explicitly through the runner.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};

pub const ONE_SEC_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    DriverFound,
    PositionTick,
    DriverArrived,
    RideStarted,
    RideCompleted,
    PaymentResolved,
    RouteResolved,
    OfferExpired,
}

/// Cancellation token attached to an event. Handlers compare the token with
/// the one currently held by the owning resource and drop stale events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSubject {
    Ride(u64),
    Payment(u64),
    Route(u64),
    Offer(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
    seq: u64,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by timestamp, FIFO on ties.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event being processed by the current schedule run.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    next_seq: u64,
    epoch_ms: i64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    /// Clock whose simulation time 0 corresponds to `epoch_ms` (Unix ms).
    pub fn with_epoch(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            ..Self::default()
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind, subject: Option<EventSubject>) {
        debug_assert!(
            timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp: timestamp.max(self.now),
            kind,
            subject,
            seq,
        });
    }

    pub fn schedule_in(&mut self, delta_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(self.now.saturating_add(delta_ms), kind, subject);
    }

    pub fn schedule_in_secs(&mut self, delta_secs: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_in(delta_secs.saturating_mul(ONE_SEC_MS), kind, subject);
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|e| e.timestamp)
    }

    /// Moves `now` forward without processing events. Never moves backwards.
    pub fn advance_to(&mut self, timestamp: u64) {
        debug_assert!(
            self.next_event_time().map_or(true, |next| next >= timestamp),
            "advancing past a pending event"
        );
        self.now = self.now.max(timestamp);
    }

    /// Drops every pending event matching `predicate`. Returns how many were removed.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Event) -> bool,
    {
        let before = self.events.len();
        self.events.retain(|event| !predicate(event));
        before - self.events.len()
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn sim_to_real_ms(&self, sim_ms: u64) -> i64 {
        self.epoch_ms.saturating_add(sim_ms as i64)
    }

    /// Wall-clock instant corresponding to the current simulation time.
    pub fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.sim_to_real_ms(self.now)).unwrap_or_default()
    }
}
