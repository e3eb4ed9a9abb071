//! Error types for every fallible operation in the crate.
//!
//! Validation rejections that the UI reports as a plain boolean (pet
//! capacity, going online before onboarding completes) are not errors and do
//! not appear here.

use thiserror::Error;

use crate::dispatch::ActiveRideState;
use crate::onboarding::OnboardingStepKey;

#[derive(Debug, Error, PartialEq)]
pub enum OnboardingError {
    #[error("step {requested:?} cannot be completed now; current step is {expected:?}")]
    OutOfOrder {
        expected: Option<OnboardingStepKey>,
        requested: OnboardingStepKey,
    },
    #[error("training is completed module by module")]
    TrainingRequiresModules,
    #[error("evidence does not belong to step {0:?}")]
    EvidenceMismatch(OnboardingStepKey),
    #[error("step {0:?} cannot be completed without evidence")]
    MissingEvidence(OnboardingStepKey),
    #[error("adhesion payment needs a positive amount and a payment id")]
    InvalidPayment,
    #[error("kit installation needs every checklist item and a photo")]
    KitChecklistIncomplete,
    #[error("unknown training module `{0}`")]
    UnknownModule(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),
    #[error("tip of {0} is not one of the offered options")]
    UnsupportedTip(u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("driver must be online to receive ride offers")]
    NotOnline,
    #[error("another offer is awaiting a response")]
    OfferPending,
    #[error("no pending offer with id `{0}`")]
    NoOffer(String),
    #[error("a ride is already in progress")]
    ActiveRideInProgress,
    #[error("no ride in progress")]
    NoActiveRide,
    #[error("cannot {action} while the ride is {from:?}")]
    InvalidTransition {
        from: ActiveRideState,
        action: &'static str,
    },
    #[error("boarding checklist is incomplete")]
    ChecklistIncomplete,
    #[error("unknown checklist item `{0}`")]
    UnknownChecklistItem(String),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[cfg(feature = "osrm")]
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing service error: {0}")]
    Api(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("invalid payment amount {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("booking must be at the summary step")]
    NotAtSummary,
    #[error("booking is incomplete")]
    IncompleteBooking,
    #[error("route has not been resolved")]
    RouteNotReady,
    #[error("a payment is already pending")]
    PaymentPending,
    #[error("a ride is already in progress")]
    RideInProgress,
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture `{name}` is malformed: {source}")]
    Malformed {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}
