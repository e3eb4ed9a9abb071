//! Rider booking wizard: a four-step linear flow with advisory gates.
//!
//! Every mutation goes through [BookingState::apply] with a [BookingCommand];
//! the named helpers are thin wrappers. Gates are pure reads and are never
//! enforced by a transition.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geo::Coordinate;

/// Maximum number of pets in one booking.
pub const MAX_PETS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStep {
    #[default]
    Location,
    Pets,
    Schedule,
    Summary,
}

pub const STEP_ORDER: [BookingStep; 4] = [
    BookingStep::Location,
    BookingStep::Pets,
    BookingStep::Schedule,
    BookingStep::Summary,
];

impl BookingStep {
    pub fn index(self) -> usize {
        match self {
            BookingStep::Location => 0,
            BookingStep::Pets => 1,
            BookingStep::Schedule => 2,
            BookingStep::Summary => 3,
        }
    }

    pub fn next(self) -> Option<BookingStep> {
        STEP_ORDER.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<BookingStep> {
        self.index().checked_sub(1).map(|i| STEP_ORDER[i])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub is_immediate: bool,
    pub date: Option<DateTime<Utc>>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            is_immediate: true,
            date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingCommand {
    SetOrigin(Option<Location>),
    SetDestination(Option<Location>),
    AddPet(String),
    RemovePet(String),
    TogglePet(String),
    SetSchedule(Schedule),
    ToggleImmediate,
    SetDate(Option<DateTime<Utc>>),
    NextStep,
    PrevStep,
    GoToStep(BookingStep),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    PetCapacityReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Unchanged,
    Rejected(RejectionReason),
}

impl CommandOutcome {
    /// False only for a rejection; a no-op still counts as accepted.
    pub fn is_accepted(self) -> bool {
        !matches!(self, CommandOutcome::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Resource)]
pub struct BookingState {
    pub step: BookingStep,
    pub origin: Option<Location>,
    pub destination: Option<Location>,
    pub selected_pets: Vec<String>,
    pub schedule: Schedule,
}

impl BookingState {
    pub fn apply(&mut self, command: BookingCommand) -> CommandOutcome {
        match command {
            BookingCommand::SetOrigin(location) => {
                self.origin = location;
                CommandOutcome::Applied
            }
            BookingCommand::SetDestination(location) => {
                self.destination = location;
                CommandOutcome::Applied
            }
            BookingCommand::AddPet(id) => self.add_pet_inner(id),
            BookingCommand::RemovePet(id) => {
                let before = self.selected_pets.len();
                self.selected_pets.retain(|p| *p != id);
                if self.selected_pets.len() == before {
                    CommandOutcome::Unchanged
                } else {
                    CommandOutcome::Applied
                }
            }
            BookingCommand::TogglePet(id) => {
                if self.selected_pets.contains(&id) {
                    self.selected_pets.retain(|p| *p != id);
                    CommandOutcome::Applied
                } else {
                    self.add_pet_inner(id)
                }
            }
            BookingCommand::SetSchedule(schedule) => {
                // An immediate ride never carries a date.
                self.schedule = Schedule {
                    is_immediate: schedule.is_immediate,
                    date: if schedule.is_immediate { None } else { schedule.date },
                };
                CommandOutcome::Applied
            }
            BookingCommand::ToggleImmediate => {
                let was_immediate = self.schedule.is_immediate;
                self.schedule.is_immediate = !was_immediate;
                if !was_immediate {
                    self.schedule.date = None;
                }
                CommandOutcome::Applied
            }
            BookingCommand::SetDate(date) => {
                self.schedule.date = date;
                CommandOutcome::Applied
            }
            BookingCommand::NextStep => match self.step.next() {
                Some(next) => self.move_to(next),
                None => CommandOutcome::Unchanged,
            },
            BookingCommand::PrevStep => match self.step.prev() {
                Some(prev) => self.move_to(prev),
                None => CommandOutcome::Unchanged,
            },
            BookingCommand::GoToStep(step) => {
                if step == self.step {
                    CommandOutcome::Unchanged
                } else {
                    self.move_to(step)
                }
            }
            BookingCommand::Reset => {
                *self = BookingState::default();
                debug!("booking wizard reset");
                CommandOutcome::Applied
            }
        }
    }

    fn add_pet_inner(&mut self, id: String) -> CommandOutcome {
        if self.selected_pets.contains(&id) {
            return CommandOutcome::Unchanged;
        }
        if self.selected_pets.len() >= MAX_PETS {
            warn!(pet = %id, "pet selection rejected: capacity reached");
            return CommandOutcome::Rejected(RejectionReason::PetCapacityReached);
        }
        self.selected_pets.push(id);
        CommandOutcome::Applied
    }

    fn move_to(&mut self, step: BookingStep) -> CommandOutcome {
        debug!(from = ?self.step, to = ?step, "booking step changed");
        self.step = step;
        CommandOutcome::Applied
    }

    pub fn set_origin(&mut self, location: Option<Location>) {
        self.apply(BookingCommand::SetOrigin(location));
    }

    pub fn set_destination(&mut self, location: Option<Location>) {
        self.apply(BookingCommand::SetDestination(location));
    }

    /// Returns false when the pet is not selected and the booking is full.
    pub fn add_pet(&mut self, id: &str) -> bool {
        self.apply(BookingCommand::AddPet(id.to_string())).is_accepted()
    }

    pub fn remove_pet(&mut self, id: &str) {
        self.apply(BookingCommand::RemovePet(id.to_string()));
    }

    /// Deselects a selected pet (always succeeds) or selects an unselected one
    /// if capacity allows. The boolean drives the "max pets" warning.
    pub fn toggle_pet(&mut self, id: &str) -> bool {
        self.apply(BookingCommand::TogglePet(id.to_string())).is_accepted()
    }

    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.apply(BookingCommand::SetSchedule(schedule));
    }

    pub fn toggle_immediate(&mut self) {
        self.apply(BookingCommand::ToggleImmediate);
    }

    /// No invariant check: callers must not set a date on an immediate ride.
    pub fn set_date(&mut self, date: Option<DateTime<Utc>>) {
        self.apply(BookingCommand::SetDate(date));
    }

    pub fn next_step(&mut self) {
        self.apply(BookingCommand::NextStep);
    }

    pub fn prev_step(&mut self) {
        self.apply(BookingCommand::PrevStep);
    }

    pub fn go_to_step(&mut self, step: BookingStep) {
        self.apply(BookingCommand::GoToStep(step));
    }

    pub fn reset(&mut self) {
        self.apply(BookingCommand::Reset);
    }

    pub fn can_proceed_from_location(&self) -> bool {
        self.origin.is_some() && self.destination.is_some()
    }

    pub fn can_proceed_from_pets(&self) -> bool {
        (1..=MAX_PETS).contains(&self.selected_pets.len())
    }

    pub fn can_proceed_from_schedule(&self) -> bool {
        self.schedule.is_immediate || self.schedule.date.is_some()
    }

    /// Gate of the current step; the summary step has none.
    pub fn can_proceed(&self) -> bool {
        match self.step {
            BookingStep::Location => self.can_proceed_from_location(),
            BookingStep::Pets => self.can_proceed_from_pets(),
            BookingStep::Schedule => self.can_proceed_from_schedule(),
            BookingStep::Summary => true,
        }
    }

    /// Every gate passes, i.e. the booking could be submitted.
    pub fn is_complete(&self) -> bool {
        self.can_proceed_from_location()
            && self.can_proceed_from_pets()
            && self.can_proceed_from_schedule()
    }

    pub fn current_step_index(&self) -> usize {
        self.step.index()
    }

    pub fn total_steps(&self) -> usize {
        STEP_ORDER.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn location(id: &str) -> Location {
        Location {
            id: id.to_string(),
            address: format!("{id} street"),
            lat: -23.55,
            lng: -46.63,
        }
    }

    #[test]
    fn pet_selection_never_exceeds_capacity() {
        let mut rng = StdRng::seed_from_u64(7);
        let ids = ["p1", "p2", "p3", "p4", "p5"];
        let mut booking = BookingState::default();
        for _ in 0..500 {
            let id = ids[rng.gen_range(0..ids.len())];
            let was_selected = booking.selected_pets.iter().any(|p| p == id);
            let full = booking.selected_pets.len() >= MAX_PETS;
            let accepted = booking.toggle_pet(id);
            assert!(booking.selected_pets.len() <= MAX_PETS);
            if was_selected {
                assert!(accepted, "deselecting must always succeed");
                assert!(!booking.selected_pets.iter().any(|p| p == id));
            } else {
                assert_eq!(accepted, !full);
            }
        }
    }

    #[test]
    fn toggling_fourth_pet_is_rejected_without_change() {
        let mut booking = BookingState::default();
        assert!(booking.toggle_pet("p1"));
        assert!(booking.toggle_pet("p2"));
        assert!(booking.toggle_pet("p3"));
        let before = booking.clone();
        assert!(!booking.toggle_pet("p4"));
        assert_eq!(booking, before);
        // Deselect at full capacity still works.
        assert!(booking.toggle_pet("p2"));
        assert_eq!(booking.selected_pets, vec!["p1", "p3"]);
    }

    #[test]
    fn add_pet_reports_duplicates_as_selected() {
        let mut booking = BookingState::default();
        assert!(booking.add_pet("p1"));
        assert_eq!(
            booking.apply(BookingCommand::AddPet("p1".into())),
            CommandOutcome::Unchanged
        );
        assert_eq!(booking.selected_pets.len(), 1);
        booking.remove_pet("p1");
        assert!(booking.selected_pets.is_empty());
    }

    #[test]
    fn toggle_immediate_clears_date_and_does_not_restore_it() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap();
        let mut booking = BookingState::default();
        assert_eq!(booking.schedule, Schedule { is_immediate: true, date: None });

        booking.toggle_immediate();
        assert_eq!(booking.schedule, Schedule { is_immediate: false, date: None });

        booking.set_date(Some(date));
        assert_eq!(booking.schedule, Schedule { is_immediate: false, date: Some(date) });

        booking.toggle_immediate();
        assert_eq!(booking.schedule, Schedule { is_immediate: true, date: None });

        booking.toggle_immediate();
        assert_eq!(booking.schedule, Schedule { is_immediate: false, date: None });
    }

    #[test]
    fn set_schedule_drops_date_for_immediate_rides() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let mut booking = BookingState::default();
        booking.set_schedule(Schedule { is_immediate: true, date: Some(date) });
        assert_eq!(booking.schedule.date, None);
        booking.set_schedule(Schedule { is_immediate: false, date: Some(date) });
        assert_eq!(booking.schedule.date, Some(date));
    }

    #[test]
    fn steps_advance_without_consulting_gates() {
        let mut booking = BookingState::default();
        assert!(!booking.can_proceed());
        booking.next_step();
        assert_eq!(booking.step, BookingStep::Pets);
        booking.next_step();
        booking.next_step();
        assert_eq!(booking.step, BookingStep::Summary);
        assert_eq!(booking.apply(BookingCommand::NextStep), CommandOutcome::Unchanged);
        assert_eq!(booking.step, BookingStep::Summary);
        assert_eq!(booking.current_step_index(), 3);
        assert_eq!(booking.total_steps(), 4);
    }

    #[test]
    fn prev_step_is_noop_at_first_step() {
        let mut booking = BookingState::default();
        assert_eq!(booking.apply(BookingCommand::PrevStep), CommandOutcome::Unchanged);
        booking.go_to_step(BookingStep::Schedule);
        booking.prev_step();
        assert_eq!(booking.step, BookingStep::Pets);
    }

    #[test]
    fn gates_follow_state() {
        let mut booking = BookingState::default();
        booking.set_origin(Some(location("home")));
        assert!(!booking.can_proceed_from_location());
        booking.set_destination(Some(location("vet")));
        assert!(booking.can_proceed_from_location());

        assert!(!booking.can_proceed_from_pets());
        booking.toggle_pet("p1");
        assert!(booking.can_proceed_from_pets());

        assert!(booking.can_proceed_from_schedule());
        booking.toggle_immediate();
        assert!(!booking.can_proceed_from_schedule());
        booking.set_date(Some(Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).unwrap()));
        assert!(booking.can_proceed_from_schedule());
        assert!(booking.is_complete());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut booking = BookingState::default();
        booking.set_origin(Some(location("home")));
        booking.toggle_pet("p1");
        booking.toggle_immediate();
        booking.next_step();
        booking.reset();
        assert_eq!(booking, BookingState::default());
    }
}
