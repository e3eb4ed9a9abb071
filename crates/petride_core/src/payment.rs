//! Payment confirmation: a single-shot, delayed call to a processor.
//!
//! [PaymentSession::request] schedules a `PaymentResolved` event; the
//! processor is only consulted when that event fires and the session's token
//! still matches. Abandoning the session bumps the token, so a resolution
//! that arrives afterwards is ignored.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{EventKind, EventSubject, SimulationClock, ONE_SEC_MS};
use crate::error::PaymentError;

pub const DEFAULT_PAYMENT_DELAY_MS: u64 = 3 * ONE_SEC_MS;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    Boleto,
}

impl PaymentMethod {
    pub fn success_message(self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX payment approved! Notifying drivers.",
            PaymentMethod::CreditCard => "Payment approved! Notifying drivers.",
            PaymentMethod::Boleto => "Boleto issued! Drivers will be notified once it clears.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount: f64,
    pub ride_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_id: String,
    pub message: String,
}

/// Payment backend. Implementations must be `Send + Sync` so the processor
/// can be stored as an ECS resource.
pub trait PaymentProcessor: Send + Sync {
    fn process(
        &mut self,
        request: &PaymentRequest,
        at: DateTime<Utc>,
    ) -> Result<PaymentResult, PaymentError>;
}

#[derive(Resource)]
pub struct PaymentProcessorResource(pub Box<dyn PaymentProcessor>);

/// Approves every well-formed request.
pub struct SimulatedPaymentProcessor {
    rng: StdRng,
}

impl SimulatedPaymentProcessor {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn transaction_id(&mut self, at: DateTime<Utc>) -> String {
        let suffix: String = (0..9)
            .map(|_| BASE36[self.rng.gen_range(0..BASE36.len())] as char)
            .collect();
        format!("txn_{}_{}", at.timestamp_millis(), suffix)
    }
}

impl PaymentProcessor for SimulatedPaymentProcessor {
    fn process(
        &mut self,
        request: &PaymentRequest,
        at: DateTime<Utc>,
    ) -> Result<PaymentResult, PaymentError> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(PaymentError::InvalidAmount(request.amount.to_string()));
        }
        Ok(PaymentResult {
            success: true,
            transaction_id: self.transaction_id(at),
            message: request.method.success_message().to_string(),
        })
    }
}

/// Declines every request; exercises the failure path.
pub struct DecliningPaymentProcessor;

impl PaymentProcessor for DecliningPaymentProcessor {
    fn process(
        &mut self,
        _request: &PaymentRequest,
        _at: DateTime<Utc>,
    ) -> Result<PaymentResult, PaymentError> {
        Ok(PaymentResult {
            success: false,
            transaction_id: String::new(),
            message: "Payment declined".to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PaymentState {
    #[default]
    Idle,
    Pending {
        token: u64,
        request: PaymentRequest,
    },
    Succeeded(PaymentResult),
    Failed(String),
}

#[derive(Debug, Resource)]
pub struct PaymentSession {
    state: PaymentState,
    token: u64,
    delay_ms: u64,
}

impl Default for PaymentSession {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_DELAY_MS)
    }
}

impl PaymentSession {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            state: PaymentState::Idle,
            token: 0,
            delay_ms,
        }
    }

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PaymentState::Pending { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            PaymentState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Submits `request`; the outcome arrives after the configured delay.
    pub fn request(&mut self, clock: &mut SimulationClock, request: PaymentRequest) -> u64 {
        self.token += 1;
        debug!(token = self.token, amount = request.amount, method = ?request.method, "payment requested");
        self.state = PaymentState::Pending {
            token: self.token,
            request,
        };
        clock.schedule_in(
            self.delay_ms,
            EventKind::PaymentResolved,
            Some(EventSubject::Payment(self.token)),
        );
        self.token
    }

    /// Drops any pending payment; its resolution will be ignored.
    pub fn abandon(&mut self, clock: &mut SimulationClock) {
        self.token += 1;
        clock.cancel_where(|e| matches!(e.subject, Some(EventSubject::Payment(_))));
        self.state = PaymentState::Idle;
    }

    /// Takes the pending request if `token` is still current.
    pub(crate) fn take_pending(&mut self, token: u64) -> Option<PaymentRequest> {
        match &self.state {
            PaymentState::Pending {
                token: pending, ..
            } if *pending == token && token == self.token => {}
            _ => return None,
        }
        match std::mem::take(&mut self.state) {
            PaymentState::Pending { request, .. } => Some(request),
            _ => None,
        }
    }

    pub(crate) fn settle(&mut self, outcome: Result<PaymentResult, String>) {
        self.state = match outcome {
            Ok(result) => PaymentState::Succeeded(result),
            Err(message) => PaymentState::Failed(message),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            method: PaymentMethod::Pix,
            amount: 22.5,
            ride_id: "ride-1".into(),
        }
    }

    #[test]
    fn simulated_processor_issues_transaction_ids() {
        let mut processor = SimulatedPaymentProcessor::new(Some(1));
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).expect("timestamp");
        let result = processor.process(&request(), at).expect("payment");
        assert!(result.success);
        assert!(result.transaction_id.starts_with("txn_1700000000000_"));
        assert_eq!(result.transaction_id.len(), "txn_1700000000000_".len() + 9);
        assert_eq!(result.message, PaymentMethod::Pix.success_message());
    }

    #[test]
    fn simulated_processor_rejects_non_positive_amount() {
        let mut processor = SimulatedPaymentProcessor::new(Some(1));
        let bad = PaymentRequest {
            amount: 0.0,
            ..request()
        };
        assert!(processor.process(&bad, Utc::now()).is_err());
    }

    #[test]
    fn abandoned_payment_cannot_be_taken() {
        let mut clock = SimulationClock::default();
        let mut session = PaymentSession::new(3_000);
        let token = session.request(&mut clock, request());
        assert!(session.is_pending());
        session.abandon(&mut clock);
        assert!(clock.is_empty());
        assert_eq!(session.take_pending(token), None);
        assert_eq!(session.state(), &PaymentState::Idle);
    }

    #[test]
    fn superseded_request_token_is_stale() {
        let mut clock = SimulationClock::default();
        let mut session = PaymentSession::new(3_000);
        let first = session.request(&mut clock, request());
        let second = session.request(&mut clock, request());
        assert_eq!(session.take_pending(first), None);
        assert!(session.take_pending(second).is_some());
    }
}
