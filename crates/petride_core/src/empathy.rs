//! Driver empathy test: scenario questions scored by the answer chosen.

use std::collections::HashMap;

pub const PASS_THRESHOLD: u32 = 15;

#[derive(Debug, Clone, Copy)]
pub struct AnswerOption {
    pub id: &'static str,
    pub text: &'static str,
    pub points: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Question {
    pub id: &'static str,
    pub text: &'static str,
    pub options: [AnswerOption; 3],
}

pub const QUESTIONS: [Question; 4] = [
    Question {
        id: "q1",
        text: "A dog starts crying during the ride. What do you do?",
        options: [
            AnswerOption { id: "a", text: "Stop the car immediately", points: 2 },
            AnswerOption { id: "b", text: "Talk calmly and look for a safe place to pull over", points: 5 },
            AnswerOption { id: "c", text: "Ignore it and keep driving", points: 0 },
        ],
    },
    Question {
        id: "q2",
        text: "The owner forgot the pet's leash. What do you do?",
        options: [
            AnswerOption { id: "a", text: "Refuse the ride", points: 1 },
            AnswerOption { id: "b", text: "Offer the spare leash from the kit", points: 5 },
            AnswerOption { id: "c", text: "Do the ride anyway", points: 0 },
        ],
    },
    Question {
        id: "q3",
        text: "A cat looks stressed in its carrier. What do you do?",
        options: [
            AnswerOption { id: "a", text: "Partially cover the carrier with a cloth", points: 5 },
            AnswerOption { id: "b", text: "Open the carrier so it can breathe", points: 0 },
            AnswerOption { id: "c", text: "Turn the air conditioning to maximum", points: 2 },
        ],
    },
    Question {
        id: "q4",
        text: "The pet peed on the seat. How do you react?",
        options: [
            AnswerOption { id: "a", text: "Get annoyed with the owner", points: 0 },
            AnswerOption { id: "b", text: "Use the hygienic mat and clean up calmly", points: 5 },
            AnswerOption { id: "c", text: "Ask the owner to clean it", points: 1 },
        ],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmpathyResult {
    pub score: u32,
    pub max_score: u32,
    pub passed: bool,
}

pub fn max_score() -> u32 {
    QUESTIONS
        .iter()
        .map(|q| q.options.iter().map(|o| o.points).max().unwrap_or(0))
        .sum()
}

/// Scores `answers` (question id → option id). Unanswered or unknown
/// answers earn nothing.
pub fn score(answers: &HashMap<String, String>) -> EmpathyResult {
    let score = QUESTIONS
        .iter()
        .filter_map(|q| {
            let chosen = answers.get(q.id)?;
            q.options.iter().find(|o| o.id == chosen.as_str()).map(|o| o.points)
        })
        .sum();
    EmpathyResult {
        score,
        max_score: max_score(),
        passed: score >= PASS_THRESHOLD,
    }
}
