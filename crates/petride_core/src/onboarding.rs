//! Driver onboarding pipeline:
//! registration → empathy test → payment → kit installation → training.
//!
//! Steps complete strictly in order; a request for any step other than the
//! current one fails with [OnboardingError::OutOfOrder] and leaves the state
//! untouched. Training completes module by module, and finishing it is the
//! only way (besides the administrative [OnboardingCommand::CompleteTraining])
//! to reach a [DriverStatus] that may toggle availability.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::OnboardingError;
use crate::payment::PaymentMethod;
use crate::ride::Vehicle;

/// One-off fee charged at the payment step.
pub const ADHESION_FEE: f64 = 300.0;

/// Items the kit photo must show.
pub const KIT_ITEMS: [&str; 4] = [
    "Pet seat belt installed",
    "Transport crate available",
    "Hygienic mat in the vehicle",
    "Waste bags",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStepKey {
    Registration,
    EmpathyTest,
    Payment,
    KitInstallation,
    Training,
}

pub const ONBOARDING_STEPS: [OnboardingStepKey; 5] = [
    OnboardingStepKey::Registration,
    OnboardingStepKey::EmpathyTest,
    OnboardingStepKey::Payment,
    OnboardingStepKey::KitInstallation,
    OnboardingStepKey::Training,
];

impl OnboardingStepKey {
    pub fn index(self) -> usize {
        match self {
            OnboardingStepKey::Registration => 0,
            OnboardingStepKey::EmpathyTest => 1,
            OnboardingStepKey::Payment => 2,
            OnboardingStepKey::KitInstallation => 3,
            OnboardingStepKey::Training => 4,
        }
    }

    /// 1-based position, as shown on the timeline.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn next(self) -> Option<OnboardingStepKey> {
        ONBOARDING_STEPS.get(self.index() + 1).copied()
    }

    /// Payment and kit pass through an external review, hence `approved`.
    pub fn completion_status(self) -> StepStatus {
        match self {
            OnboardingStepKey::Payment | OnboardingStepKey::KitInstallation => StepStatus::Approved,
            _ => StepStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Approved,
    // Reserved for a failed review; no transition produces it yet.
    Rejected,
}

impl StepStatus {
    pub fn is_done(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    #[default]
    Onboarding,
    Active,
    Offline,
    Online,
    OnRide,
}

impl DriverStatus {
    pub fn accepts_availability_toggle(self) -> bool {
        matches!(
            self,
            DriverStatus::Active | DriverStatus::Online | DriverStatus::Offline
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingModule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationStep {
    pub status: StepStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmpathyTestStep {
    pub status: StepStatus,
    pub score: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentStep {
    pub status: StepStatus,
    pub amount: Option<f64>,
    pub payment_id: Option<String>,
    pub method: Option<PaymentMethod>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KitInstallationStep {
    pub status: StepStatus,
    pub photo_url: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingStep {
    pub status: StepStatus,
    pub total_modules: usize,
    pub completed_modules: usize,
    pub last_watched_id: Option<String>,
    pub modules: Vec<TrainingModule>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OnboardingSteps {
    pub registration: RegistrationStep,
    pub empathy_test: EmpathyTestStep,
    pub payment: PaymentStep,
    pub kit_installation: KitInstallationStep,
    pub training: TrainingStep,
}

impl OnboardingSteps {
    pub fn status(&self, key: OnboardingStepKey) -> StepStatus {
        match key {
            OnboardingStepKey::Registration => self.registration.status,
            OnboardingStepKey::EmpathyTest => self.empathy_test.status,
            OnboardingStepKey::Payment => self.payment.status,
            OnboardingStepKey::KitInstallation => self.kit_installation.status,
            OnboardingStepKey::Training => self.training.status,
        }
    }

    fn status_mut(&mut self, key: OnboardingStepKey) -> &mut StepStatus {
        match key {
            OnboardingStepKey::Registration => &mut self.registration.status,
            OnboardingStepKey::EmpathyTest => &mut self.empathy_test.status,
            OnboardingStepKey::Payment => &mut self.payment.status,
            OnboardingStepKey::KitInstallation => &mut self.kit_installation.status,
            OnboardingStepKey::Training => &mut self.training.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingState {
    /// 1-based index into [ONBOARDING_STEPS].
    pub current_step: usize,
    pub steps: OnboardingSteps,
}

impl OnboardingState {
    pub fn current_key(&self) -> Option<OnboardingStepKey> {
        self.current_step
            .checked_sub(1)
            .and_then(|i| ONBOARDING_STEPS.get(i).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo: String,
    pub cpf: String,
    pub cnh: String,
    pub cnh_category: String,
    pub vehicle: Vehicle,
}

/// Profile and onboarding progress as loaded at mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSnapshot {
    pub driver: DriverProfile,
    pub onboarding: OnboardingState,
    pub driver_status: DriverStatus,
}

impl DriverSnapshot {
    /// A driver who has just started registering.
    pub fn new_applicant(driver: DriverProfile, modules: Vec<TrainingModule>) -> Self {
        let mut steps = OnboardingSteps::default();
        steps.registration.status = StepStatus::InProgress;
        steps.training.total_modules = modules.len();
        steps.training.completed_modules = modules.iter().filter(|m| m.completed).count();
        steps.training.modules = modules;
        Self {
            driver,
            onboarding: OnboardingState {
                current_step: 1,
                steps,
            },
            driver_status: DriverStatus::Onboarding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitEvidence {
    pub photo_url: Option<String>,
    /// One flag per entry of [KIT_ITEMS].
    pub checked_items: [bool; 4],
}

impl KitEvidence {
    pub fn is_complete(&self) -> bool {
        self.photo_url.is_some() && self.checked_items.iter().all(|c| *c)
    }
}

/// Step-specific data captured when a step completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepEvidence {
    EmpathyTest {
        score: u32,
    },
    Payment {
        amount: f64,
        payment_id: String,
        method: PaymentMethod,
    },
    KitInstallation(KitEvidence),
}

impl StepEvidence {
    fn step(&self) -> OnboardingStepKey {
        match self {
            StepEvidence::EmpathyTest { .. } => OnboardingStepKey::EmpathyTest,
            StepEvidence::Payment { .. } => OnboardingStepKey::Payment,
            StepEvidence::KitInstallation(_) => OnboardingStepKey::KitInstallation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingCommand {
    CompleteStep {
        step: OnboardingStepKey,
        evidence: Option<StepEvidence>,
    },
    CompleteModule(String),
    /// Administrative shortcut: completes every module at once.
    CompleteTraining,
    SetOnline(bool),
    BeginRide,
    EndRide,
    Reset,
}

#[derive(Debug, Clone, Resource)]
pub struct DriverAccount {
    initial: DriverSnapshot,
    pub driver: DriverProfile,
    pub onboarding: OnboardingState,
    pub driver_status: DriverStatus,
    pub is_online: bool,
}

impl DriverAccount {
    pub fn from_snapshot(snapshot: DriverSnapshot) -> Self {
        Self {
            driver: snapshot.driver.clone(),
            onboarding: snapshot.onboarding.clone(),
            driver_status: snapshot.driver_status,
            is_online: matches!(
                snapshot.driver_status,
                DriverStatus::Online | DriverStatus::OnRide
            ),
            initial: snapshot,
        }
    }

    /// Applies `command` at `at`. `Ok(false)` means the command was accepted
    /// but had nothing to change, or was silently ignored.
    pub fn apply(
        &mut self,
        command: OnboardingCommand,
        at: DateTime<Utc>,
    ) -> Result<bool, OnboardingError> {
        match command {
            OnboardingCommand::CompleteStep { step, evidence } => {
                self.complete_step_inner(step, evidence, at)
            }
            OnboardingCommand::CompleteModule(id) => self.complete_module_inner(&id, at),
            OnboardingCommand::CompleteTraining => Ok(self.complete_training_inner(at)),
            OnboardingCommand::SetOnline(online) => Ok(self.set_online_inner(online)),
            OnboardingCommand::BeginRide => Ok(self.swap_status(DriverStatus::Online, DriverStatus::OnRide)),
            OnboardingCommand::EndRide => Ok(self.swap_status(DriverStatus::OnRide, DriverStatus::Online)),
            OnboardingCommand::Reset => {
                *self = DriverAccount::from_snapshot(self.initial.clone());
                Ok(true)
            }
        }
    }

    pub fn complete_step(
        &mut self,
        step: OnboardingStepKey,
        evidence: Option<StepEvidence>,
        at: DateTime<Utc>,
    ) -> Result<(), OnboardingError> {
        self.apply(OnboardingCommand::CompleteStep { step, evidence }, at)
            .map(|_| ())
    }

    pub fn complete_module(&mut self, module_id: &str, at: DateTime<Utc>) -> Result<bool, OnboardingError> {
        self.apply(OnboardingCommand::CompleteModule(module_id.to_string()), at)
    }

    pub fn complete_training(&mut self, at: DateTime<Utc>) {
        self.complete_training_inner(at);
    }

    /// Returns whether the request was accepted. Ignored until onboarding is done.
    pub fn set_online(&mut self, online: bool) -> bool {
        self.set_online_inner(online)
    }

    pub fn begin_ride(&mut self) -> bool {
        self.swap_status(DriverStatus::Online, DriverStatus::OnRide)
    }

    pub fn end_ride(&mut self) -> bool {
        self.swap_status(DriverStatus::OnRide, DriverStatus::Online)
    }

    pub fn reset(&mut self) {
        *self = DriverAccount::from_snapshot(self.initial.clone());
    }

    pub fn is_training_complete(&self) -> bool {
        let training = &self.onboarding.steps.training;
        training.completed_modules == training.total_modules
    }

    pub fn can_go_online(&self) -> bool {
        self.driver_status.accepts_availability_toggle()
    }

    /// Training progress in percent.
    pub fn training_progress(&self) -> f64 {
        let training = &self.onboarding.steps.training;
        if training.total_modules == 0 {
            return 0.0;
        }
        training.completed_modules as f64 / training.total_modules as f64 * 100.0
    }

    fn complete_step_inner(
        &mut self,
        step: OnboardingStepKey,
        evidence: Option<StepEvidence>,
        at: DateTime<Utc>,
    ) -> Result<bool, OnboardingError> {
        if step == OnboardingStepKey::Training {
            return Err(OnboardingError::TrainingRequiresModules);
        }
        let current = self.onboarding.current_key();
        if current != Some(step) || self.onboarding.steps.status(step) != StepStatus::InProgress {
            warn!(?step, ?current, "out-of-order step completion rejected");
            return Err(OnboardingError::OutOfOrder {
                expected: current,
                requested: step,
            });
        }
        if let Err(err) = check_evidence(step, evidence.as_ref()) {
            warn!(?step, error = %err, "step completion rejected");
            return Err(err);
        }

        let steps = &mut self.onboarding.steps;
        match step {
            OnboardingStepKey::Registration => steps.registration.completed_at = Some(at),
            OnboardingStepKey::EmpathyTest => steps.empathy_test.completed_at = Some(at),
            OnboardingStepKey::Payment => steps.payment.completed_at = Some(at),
            OnboardingStepKey::KitInstallation => steps.kit_installation.approved_at = Some(at),
            OnboardingStepKey::Training => {}
        }
        match evidence {
            Some(StepEvidence::EmpathyTest { score }) => steps.empathy_test.score = Some(score),
            Some(StepEvidence::Payment {
                amount,
                payment_id,
                method,
            }) => {
                steps.payment.amount = Some(amount);
                steps.payment.payment_id = Some(payment_id);
                steps.payment.method = Some(method);
            }
            Some(StepEvidence::KitInstallation(kit)) => steps.kit_installation.photo_url = kit.photo_url,
            None => {}
        }
        *steps.status_mut(step) = step.completion_status();

        if let Some(next) = step.next() {
            *steps.status_mut(next) = StepStatus::InProgress;
            self.onboarding.current_step = next.number();
        }
        info!(?step, current_step = self.onboarding.current_step, "onboarding step completed");
        Ok(true)
    }

    fn complete_module_inner(&mut self, module_id: &str, at: DateTime<Utc>) -> Result<bool, OnboardingError> {
        let training = &mut self.onboarding.steps.training;
        if training.status == StepStatus::Pending {
            return Err(OnboardingError::OutOfOrder {
                expected: self.onboarding.current_key(),
                requested: OnboardingStepKey::Training,
            });
        }
        let Some(module) = training.modules.iter_mut().find(|m| m.id == module_id) else {
            return Err(OnboardingError::UnknownModule(module_id.to_string()));
        };
        training.last_watched_id = Some(module_id.to_string());
        if module.completed {
            return Ok(false);
        }
        module.completed = true;
        module.completed_at = Some(at);
        training.completed_modules = training.modules.iter().filter(|m| m.completed).count();
        debug!(module = module_id, completed = training.completed_modules, total = training.total_modules, "training module completed");

        if training.completed_modules >= training.total_modules {
            training.status = StepStatus::Completed;
            self.activate();
        }
        Ok(true)
    }

    fn complete_training_inner(&mut self, at: DateTime<Utc>) -> bool {
        let training = &mut self.onboarding.steps.training;
        if training.status == StepStatus::Completed && self.driver_status != DriverStatus::Onboarding {
            return false;
        }
        for module in training.modules.iter_mut().filter(|m| !m.completed) {
            module.completed = true;
            module.completed_at = Some(at);
        }
        training.completed_modules = training.total_modules;
        training.status = StepStatus::Completed;
        self.activate();
        true
    }

    fn activate(&mut self) {
        if self.driver_status == DriverStatus::Onboarding {
            self.driver_status = DriverStatus::Active;
            info!(driver = %self.driver.id, "driver onboarding finished");
        }
    }

    fn set_online_inner(&mut self, online: bool) -> bool {
        if !self.driver_status.accepts_availability_toggle() {
            debug!(status = ?self.driver_status, "availability toggle ignored");
            return false;
        }
        self.is_online = online;
        self.driver_status = if online {
            DriverStatus::Online
        } else {
            DriverStatus::Offline
        };
        true
    }

    fn swap_status(&mut self, from: DriverStatus, to: DriverStatus) -> bool {
        if self.driver_status != from {
            return false;
        }
        self.driver_status = to;
        true
    }
}

/// Registration carries no evidence; every other manual step needs its own.
fn check_evidence(
    step: OnboardingStepKey,
    evidence: Option<&StepEvidence>,
) -> Result<(), OnboardingError> {
    let Some(evidence) = evidence else {
        return match step {
            OnboardingStepKey::Registration => Ok(()),
            _ => Err(OnboardingError::MissingEvidence(step)),
        };
    };
    if evidence.step() != step {
        return Err(OnboardingError::EvidenceMismatch(step));
    }
    match evidence {
        StepEvidence::Payment {
            amount, payment_id, ..
        } if !amount.is_finite() || *amount <= 0.0 || payment_id.trim().is_empty() => {
            Err(OnboardingError::InvalidPayment)
        }
        StepEvidence::KitInstallation(kit) if !kit.is_complete() => {
            Err(OnboardingError::KitChecklistIncomplete)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
    }

    fn module(id: &str) -> TrainingModule {
        TrainingModule {
            id: id.to_string(),
            title: format!("Module {id}"),
            description: String::new(),
            duration: "5 min".to_string(),
            completed: false,
            completed_at: None,
        }
    }

    fn account() -> DriverAccount {
        let profile = DriverProfile {
            id: "drv-42".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "+55 11 90000-0000".into(),
            photo: String::new(),
            cpf: "000.000.000-00".into(),
            cnh: "00000000000".into(),
            cnh_category: "B".into(),
            vehicle: Vehicle {
                model: "Fit".into(),
                plate: "XYZ9A87".into(),
                color: "Grey".into(),
                year: 2020,
            },
        };
        DriverAccount::from_snapshot(DriverSnapshot::new_applicant(
            profile,
            vec![module("m1"), module("m2")],
        ))
    }

    fn kit() -> StepEvidence {
        StepEvidence::KitInstallation(KitEvidence {
            photo_url: Some("https://example.com/kit.jpg".into()),
            checked_items: [true; 4],
        })
    }

    fn complete_through_kit(account: &mut DriverAccount) {
        account.complete_step(OnboardingStepKey::Registration, None, at()).expect("registration");
        account
            .complete_step(OnboardingStepKey::EmpathyTest, Some(StepEvidence::EmpathyTest { score: 18 }), at())
            .expect("empathy");
        account
            .complete_step(
                OnboardingStepKey::Payment,
                Some(StepEvidence::Payment {
                    amount: ADHESION_FEE,
                    payment_id: "pay-1".into(),
                    method: PaymentMethod::Pix,
                }),
                at(),
            )
            .expect("payment");
        account.complete_step(OnboardingStepKey::KitInstallation, Some(kit()), at()).expect("kit");
    }

    #[test]
    fn registration_advances_to_empathy_test() {
        let mut account = account();
        account.complete_step(OnboardingStepKey::Registration, None, at()).expect("registration");
        assert_eq!(account.onboarding.current_step, 2);
        assert_eq!(account.onboarding.steps.registration.status, StepStatus::Completed);
        assert_eq!(account.onboarding.steps.registration.completed_at, Some(at()));
        assert_eq!(account.onboarding.steps.empathy_test.status, StepStatus::InProgress);
    }

    #[test]
    fn out_of_order_completion_is_rejected_without_change() {
        let mut account = account();
        account.complete_step(OnboardingStepKey::Registration, None, at()).expect("registration");
        let before = account.onboarding.clone();
        let err = account
            .complete_step(OnboardingStepKey::Payment, None, at())
            .expect_err("payment before empathy test");
        assert_eq!(
            err,
            OnboardingError::OutOfOrder {
                expected: Some(OnboardingStepKey::EmpathyTest),
                requested: OnboardingStepKey::Payment,
            }
        );
        assert_eq!(account.onboarding, before);

        // Completing an already completed step is out of order too.
        assert!(account.complete_step(OnboardingStepKey::Registration, None, at()).is_err());
    }

    #[test]
    fn payment_and_kit_are_approved_and_training_starts() {
        let mut account = account();
        complete_through_kit(&mut account);
        let steps = &account.onboarding.steps;
        assert_eq!(steps.empathy_test.score, Some(18));
        assert_eq!(steps.payment.status, StepStatus::Approved);
        assert_eq!(steps.payment.amount, Some(ADHESION_FEE));
        assert_eq!(steps.kit_installation.status, StepStatus::Approved);
        assert_eq!(steps.kit_installation.approved_at, Some(at()));
        assert_eq!(steps.training.status, StepStatus::InProgress);
        assert_eq!(account.onboarding.current_step, 5);
        assert_eq!(account.driver_status, DriverStatus::Onboarding);
    }

    #[test]
    fn evidence_must_match_step_and_kit_must_be_complete() {
        let mut account = account();
        assert_eq!(
            account.complete_step(OnboardingStepKey::Registration, Some(kit()), at()),
            Err(OnboardingError::EvidenceMismatch(OnboardingStepKey::Registration))
        );
        account.complete_step(OnboardingStepKey::Registration, None, at()).expect("registration");
        account
            .complete_step(OnboardingStepKey::EmpathyTest, Some(StepEvidence::EmpathyTest { score: 16 }), at())
            .expect("empathy");
        account
            .complete_step(
                OnboardingStepKey::Payment,
                Some(StepEvidence::Payment {
                    amount: ADHESION_FEE,
                    payment_id: "pay-1".into(),
                    method: PaymentMethod::Boleto,
                }),
                at(),
            )
            .expect("payment");
        let partial = StepEvidence::KitInstallation(KitEvidence {
            photo_url: Some("https://example.com/kit.jpg".into()),
            checked_items: [true, true, false, true],
        });
        assert_eq!(
            account.complete_step(OnboardingStepKey::KitInstallation, Some(partial), at()),
            Err(OnboardingError::KitChecklistIncomplete)
        );
        assert_eq!(account.onboarding.steps.kit_installation.status, StepStatus::InProgress);

        let no_photo = StepEvidence::KitInstallation(KitEvidence {
            photo_url: None,
            checked_items: [true; 4],
        });
        assert_eq!(
            account.complete_step(OnboardingStepKey::KitInstallation, Some(no_photo), at()),
            Err(OnboardingError::KitChecklistIncomplete)
        );
    }

    #[test]
    fn steps_after_registration_require_evidence() {
        let mut account = account();
        account.complete_step(OnboardingStepKey::Registration, None, at()).expect("registration");
        assert_eq!(
            account.complete_step(OnboardingStepKey::EmpathyTest, None, at()),
            Err(OnboardingError::MissingEvidence(OnboardingStepKey::EmpathyTest))
        );
        assert_eq!(account.onboarding.steps.empathy_test.status, StepStatus::InProgress);
        assert_eq!(account.onboarding.steps.empathy_test.score, None);
        account
            .complete_step(OnboardingStepKey::EmpathyTest, Some(StepEvidence::EmpathyTest { score: 9 }), at())
            .expect("a failing score still completes the step");
        assert_eq!(account.onboarding.steps.empathy_test.score, Some(9));

        assert_eq!(
            account.complete_step(OnboardingStepKey::Payment, None, at()),
            Err(OnboardingError::MissingEvidence(OnboardingStepKey::Payment))
        );
        let unpaid = StepEvidence::Payment {
            amount: ADHESION_FEE,
            payment_id: "  ".into(),
            method: PaymentMethod::Pix,
        };
        assert_eq!(
            account.complete_step(OnboardingStepKey::Payment, Some(unpaid), at()),
            Err(OnboardingError::InvalidPayment)
        );
        assert_eq!(account.onboarding.steps.payment.status, StepStatus::InProgress);
        account
            .complete_step(
                OnboardingStepKey::Payment,
                Some(StepEvidence::Payment {
                    amount: ADHESION_FEE,
                    payment_id: "pay-2".into(),
                    method: PaymentMethod::CreditCard,
                }),
                at(),
            )
            .expect("payment");

        let before = account.onboarding.clone();
        assert_eq!(
            account.complete_step(OnboardingStepKey::KitInstallation, None, at()),
            Err(OnboardingError::MissingEvidence(OnboardingStepKey::KitInstallation))
        );
        assert_eq!(account.onboarding, before);
        assert_eq!(account.onboarding.steps.kit_installation.photo_url, None);
    }

    #[test]
    fn snapshot_statuses_deserialize_including_rejected() {
        let step: KitInstallationStep =
            serde_json::from_str(r#"{"status": "rejected", "photo_url": "https://example.com/kit.jpg"}"#)
                .expect("kit step");
        assert_eq!(step.status, StepStatus::Rejected);
        assert!(!step.status.is_done());
    }

    #[test]
    fn training_cannot_be_completed_as_a_step() {
        let mut account = account();
        assert_eq!(
            account.complete_step(OnboardingStepKey::Training, None, at()),
            Err(OnboardingError::TrainingRequiresModules)
        );
    }

    #[test]
    fn modules_require_training_to_have_started() {
        let mut account = account();
        assert!(matches!(
            account.complete_module("m1", at()),
            Err(OnboardingError::OutOfOrder { .. })
        ));
        complete_through_kit(&mut account);
        assert_eq!(
            account.complete_module("nope", at()),
            Err(OnboardingError::UnknownModule("nope".into()))
        );
    }

    #[test]
    fn online_toggle_is_gated_on_training() {
        let mut account = account();
        complete_through_kit(&mut account);
        assert!(!account.set_online(true));
        assert!(!account.is_online);
        assert_eq!(account.driver_status, DriverStatus::Onboarding);

        assert_eq!(account.complete_module("m1", at()), Ok(true));
        assert!((account.training_progress() - 50.0).abs() < 1e-9);
        assert!(!account.set_online(true));

        assert_eq!(account.complete_module("m1", at()), Ok(false), "repeat is a no-op");
        assert_eq!(account.complete_module("m2", at()), Ok(true));
        assert!(account.is_training_complete());
        assert_eq!(account.onboarding.steps.training.status, StepStatus::Completed);
        assert_eq!(account.onboarding.steps.training.last_watched_id.as_deref(), Some("m2"));
        assert_eq!(account.driver_status, DriverStatus::Active);

        assert!(account.set_online(true));
        assert_eq!(account.driver_status, DriverStatus::Online);
        assert!(account.set_online(false));
        assert_eq!(account.driver_status, DriverStatus::Offline);
    }

    #[test]
    fn complete_training_shortcut_activates_driver() {
        let mut account = account();
        account.complete_training(at());
        assert!(account.is_training_complete());
        assert!(account.onboarding.steps.training.modules.iter().all(|m| m.completed));
        assert_eq!(account.driver_status, DriverStatus::Active);
        assert!(account.can_go_online());
    }

    #[test]
    fn on_ride_blocks_availability_toggle() {
        let mut account = account();
        account.complete_training(at());
        assert!(!account.begin_ride(), "must be online first");
        assert!(account.set_online(true));
        assert!(account.begin_ride());
        assert!(!account.set_online(false));
        assert_eq!(account.driver_status, DriverStatus::OnRide);
        assert!(account.end_ride());
        assert_eq!(account.driver_status, DriverStatus::Online);
    }

    #[test]
    fn reset_restores_the_snapshot() {
        let mut account = account();
        account.complete_step(OnboardingStepKey::Registration, None, at()).expect("registration");
        account.reset();
        assert_eq!(account.onboarding.current_step, 1);
        assert_eq!(account.onboarding.steps.registration.status, StepStatus::InProgress);
    }
}
