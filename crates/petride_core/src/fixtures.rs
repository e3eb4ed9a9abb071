//! Static directories the app reads synchronously: the rider, their pets,
//! saved places, the driver who gets dispatched to them and the onboarding
//! driver's initial snapshot.

use bevy_ecs::prelude::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::booking::Location;
use crate::dispatch::IncomingRide;
use crate::error::FixtureError;
use crate::geo::Coordinate;
use crate::onboarding::DriverSnapshot;
use crate::ride::DriverInfo;

const DIRECTORY_JSON: &str = include_str!("../fixtures/directory.json");
const DRIVER_JSON: &str = include_str!("../fixtures/driver.json");
const DRIVER_ONBOARDING_JSON: &str = include_str!("../fixtures/driver_onboarding.json");
const INCOMING_RIDE_JSON: &str = include_str!("../fixtures/incoming_ride.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub name: String,
    pub size: PetSize,
    pub species: String,
    pub breed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideParams {
    pub price_per_km: f64,
    pub min_price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    pub state: String,
}

impl DefaultLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RiderDirectory {
    user: User,
    pets: Vec<Pet>,
    ride_params: RideParams,
    default_location: DefaultLocation,
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Clone, Resource)]
pub struct Directory {
    pub user: User,
    pub pets: Vec<Pet>,
    pub ride_params: RideParams,
    pub default_location: DefaultLocation,
    pub locations: Vec<Location>,
    /// Driver assigned to every rider request.
    pub dispatch_driver: DriverInfo,
    pub driver_snapshot: DriverSnapshot,
    pub sample_offer: IncomingRide,
}

impl Directory {
    /// Parses the fixtures compiled into the crate.
    pub fn embedded() -> Result<Self, FixtureError> {
        let rider: RiderDirectory = parse("directory", DIRECTORY_JSON)?;
        Ok(Self {
            user: rider.user,
            pets: rider.pets,
            ride_params: rider.ride_params,
            default_location: rider.default_location,
            locations: rider.locations,
            dispatch_driver: parse("driver", DRIVER_JSON)?,
            driver_snapshot: parse("driver_onboarding", DRIVER_ONBOARDING_JSON)?,
            sample_offer: parse("incoming_ride", INCOMING_RIDE_JSON)?,
        })
    }

    pub fn pet(&self, id: &str) -> Option<&Pet> {
        self.pets.iter().find(|p| p.id == id)
    }

    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Pets selected in the booking, in selection order. Unknown ids are skipped.
    pub fn pets_by_ids<'a>(&'a self, ids: &'a [String]) -> impl Iterator<Item = &'a Pet> + 'a {
        ids.iter().filter_map(|id| self.pet(id))
    }
}

fn parse<T: DeserializeOwned>(name: &'static str, json: &str) -> Result<T, FixtureError> {
    serde_json::from_str(json).map_err(|source| FixtureError::Malformed { name, source })
}
