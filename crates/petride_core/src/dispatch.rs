//! Driver-side dispatch: incoming ride offers with an acceptance countdown,
//! the active ride manager and the driver's wallet.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{EventKind, EventSubject, SimulationClock};
use crate::error::DispatchError;
use crate::onboarding::{DriverAccount, DriverStatus};
use crate::split::{calculate_split, RevenueSplit};

/// Seconds a driver has to accept an offer before it is declined for them.
pub const OFFER_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: &'static str,
    pub label: &'static str,
}

pub const BOARDING_CHECKLIST: [ChecklistItem; 3] = [
    ChecklistItem {
        id: "pets",
        label: "Confirm pets on board",
    },
    ChecklistItem {
        id: "belt",
        label: "Pet seat belt fastened",
    },
    ChecklistItem {
        id: "crate",
        label: "Transport crate closed (if used)",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidePet {
    pub name: String,
    pub size: String,
    pub species: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideAddress {
    pub address: String,
    pub short: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub photo: String,
    pub rating: f32,
}

/// A ride request as presented to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRide {
    pub id: String,
    pub distance: String,
    pub duration: String,
    pub gross_value: f64,
    pub pets: Vec<RidePet>,
    pub origin: RideAddress,
    pub destination: RideAddress,
    pub passenger: Passenger,
}

impl IncomingRide {
    /// The driver's share, shown on the offer card.
    pub fn net_value(&self) -> f64 {
        calculate_split(self.gross_value).net
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveRideState {
    ToPickup,
    AtPickup,
    InTransit,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRide {
    pub ride: IncomingRide,
    pub state: ActiveRideState,
    checked: [bool; BOARDING_CHECKLIST.len()],
    split: Option<RevenueSplit>,
}

impl ActiveRide {
    fn new(ride: IncomingRide) -> Self {
        Self {
            ride,
            state: ActiveRideState::ToPickup,
            checked: [false; BOARDING_CHECKLIST.len()],
            split: None,
        }
    }

    pub fn is_checked(&self, item_id: &str) -> bool {
        BOARDING_CHECKLIST
            .iter()
            .position(|item| item.id == item_id)
            .is_some_and(|i| self.checked[i])
    }

    pub fn all_checked(&self) -> bool {
        self.checked.iter().all(|c| *c)
    }

    /// Set once the trip reaches `COMPLETED`.
    pub fn split(&self) -> Option<RevenueSplit> {
        self.split
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletEntry {
    pub ride_id: String,
    pub split: RevenueSplit,
    pub credited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DriverWallet {
    pub balance: f64,
    pub total_earnings: f64,
    pub rides_completed: u32,
    pub entries: Vec<WalletEntry>,
}

impl DriverWallet {
    fn credit(&mut self, ride_id: &str, split: RevenueSplit, at: DateTime<Utc>) {
        self.balance += split.net;
        self.total_earnings += split.net;
        self.rides_completed += 1;
        self.entries.push(WalletEntry {
            ride_id: ride_id.to_string(),
            split,
            credited_at: at,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingOffer {
    token: u64,
    ride: IncomingRide,
}

#[derive(Debug, Default, Resource)]
pub struct DriverDispatch {
    offer: Option<PendingOffer>,
    next_token: u64,
    active: Option<ActiveRide>,
    wallet: DriverWallet,
}

impl DriverDispatch {
    pub fn with_wallet(wallet: DriverWallet) -> Self {
        Self {
            wallet,
            ..Self::default()
        }
    }

    pub fn pending_offer(&self) -> Option<&IncomingRide> {
        self.offer.as_ref().map(|o| &o.ride)
    }

    pub fn active_ride(&self) -> Option<&ActiveRide> {
        self.active.as_ref()
    }

    pub fn wallet(&self) -> &DriverWallet {
        &self.wallet
    }

    /// Presents `ride` to the driver and starts the acceptance countdown.
    pub fn offer(
        &mut self,
        clock: &mut SimulationClock,
        account: &DriverAccount,
        ride: IncomingRide,
    ) -> Result<u64, DispatchError> {
        if account.driver_status != DriverStatus::Online {
            return Err(DispatchError::NotOnline);
        }
        if self.active.is_some() {
            return Err(DispatchError::ActiveRideInProgress);
        }
        if self.offer.is_some() {
            return Err(DispatchError::OfferPending);
        }
        self.next_token += 1;
        let token = self.next_token;
        clock.schedule_in_secs(
            OFFER_TIMEOUT_SECS,
            EventKind::OfferExpired,
            Some(EventSubject::Offer(token)),
        );
        info!(ride = %ride.id, token, "ride offered to driver");
        self.offer = Some(PendingOffer { token, ride });
        Ok(token)
    }

    pub fn accept(
        &mut self,
        clock: &mut SimulationClock,
        account: &mut DriverAccount,
        ride_id: &str,
    ) -> Result<&ActiveRide, DispatchError> {
        let offer = self.take_offer(clock, ride_id)?;
        if !account.begin_ride() {
            // Driver left `online` while the offer was pending; the offer is void.
            warn!(ride = %offer.ride.id, status = ?account.driver_status, "offer dropped: driver not online");
            return Err(DispatchError::NotOnline);
        }
        info!(ride = %offer.ride.id, "ride accepted");
        Ok(&*self.active.insert(ActiveRide::new(offer.ride)))
    }

    pub fn decline(
        &mut self,
        clock: &mut SimulationClock,
        ride_id: &str,
    ) -> Result<IncomingRide, DispatchError> {
        let offer = self.take_offer(clock, ride_id)?;
        info!(ride = %offer.ride.id, "ride declined");
        Ok(offer.ride)
    }

    /// Countdown ran out. Ignores tokens of offers already answered.
    pub(crate) fn expire(&mut self, token: u64) -> Option<IncomingRide> {
        if self.offer.as_ref().map(|o| o.token) != Some(token) {
            return None;
        }
        let offer = self.offer.take()?;
        info!(ride = %offer.ride.id, "ride offer expired");
        Some(offer.ride)
    }

    pub fn arrive_at_pickup(&mut self) -> Result<(), DispatchError> {
        self.transition(ActiveRideState::ToPickup, ActiveRideState::AtPickup, "arrive at pickup")
    }

    /// Flips a boarding checklist item; returns whether it is now checked.
    pub fn toggle_checklist_item(&mut self, item_id: &str) -> Result<bool, DispatchError> {
        let active = self.active.as_mut().ok_or(DispatchError::NoActiveRide)?;
        if active.state != ActiveRideState::AtPickup {
            return Err(DispatchError::InvalidTransition {
                from: active.state,
                action: "update the boarding checklist",
            });
        }
        let index = BOARDING_CHECKLIST
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| DispatchError::UnknownChecklistItem(item_id.to_string()))?;
        active.checked[index] = !active.checked[index];
        Ok(active.checked[index])
    }

    pub fn start_trip(&mut self) -> Result<(), DispatchError> {
        let all_checked = self.active.as_ref().is_some_and(ActiveRide::all_checked);
        if self.active.as_ref().map(|a| a.state) == Some(ActiveRideState::AtPickup) && !all_checked {
            return Err(DispatchError::ChecklistIncomplete);
        }
        self.transition(ActiveRideState::AtPickup, ActiveRideState::InTransit, "start the trip")
    }

    /// Marks the trip done and computes the driver's share.
    pub fn complete_trip(&mut self) -> Result<RevenueSplit, DispatchError> {
        self.transition(ActiveRideState::InTransit, ActiveRideState::Completed, "complete the trip")?;
        let active = self.active.as_mut().ok_or(DispatchError::NoActiveRide)?;
        let split = calculate_split(active.ride.gross_value);
        active.split = Some(split);
        Ok(split)
    }

    /// Closes a completed ride: credits the wallet and puts the driver back online.
    pub fn finish_ride(
        &mut self,
        account: &mut DriverAccount,
        at: DateTime<Utc>,
    ) -> Result<RevenueSplit, DispatchError> {
        let active = self.active.as_ref().ok_or(DispatchError::NoActiveRide)?;
        let Some(split) = active.split.filter(|_| active.state == ActiveRideState::Completed) else {
            return Err(DispatchError::InvalidTransition {
                from: active.state,
                action: "finish the ride",
            });
        };
        let ride_id = active.ride.id.clone();
        self.active = None;
        self.wallet.credit(&ride_id, split, at);
        if !account.end_ride() {
            warn!(ride = %ride_id, status = ?account.driver_status, "ride finished while driver was not on a ride");
        }
        info!(ride = %ride_id, net = split.net, balance = self.wallet.balance, "ride finished");
        Ok(split)
    }

    fn take_offer(
        &mut self,
        clock: &mut SimulationClock,
        ride_id: &str,
    ) -> Result<PendingOffer, DispatchError> {
        if self.offer.as_ref().map(|o| o.ride.id.as_str()) != Some(ride_id) {
            return Err(DispatchError::NoOffer(ride_id.to_string()));
        }
        let offer = self
            .offer
            .take()
            .ok_or_else(|| DispatchError::NoOffer(ride_id.to_string()))?;
        let token = offer.token;
        clock.cancel_where(|e| e.subject == Some(EventSubject::Offer(token)));
        Ok(offer)
    }

    fn transition(
        &mut self,
        from: ActiveRideState,
        to: ActiveRideState,
        action: &'static str,
    ) -> Result<(), DispatchError> {
        let active = self.active.as_mut().ok_or(DispatchError::NoActiveRide)?;
        if active.state != from {
            return Err(DispatchError::InvalidTransition {
                from: active.state,
                action,
            });
        }
        active.state = to;
        debug!(ride = %active.ride.id, state = ?to, "active ride state changed");
        Ok(())
    }
}
