use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;

/// Tip amounts offered after a ride, in currency units. Zero means no tip.
pub const TIP_OPTIONS: [u32; 4] = [0, 2, 5, 10];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideFeedback {
    rating: u8,
    comment: String,
    tip: u32,
}

impl RideFeedback {
    pub fn new(rating: u8, comment: impl Into<String>, tip: u32) -> Result<Self, FeedbackError> {
        if !(1..=5).contains(&rating) {
            return Err(FeedbackError::RatingOutOfRange(rating));
        }
        if !TIP_OPTIONS.contains(&tip) {
            return Err(FeedbackError::UnsupportedTip(tip));
        }
        Ok(Self {
            rating,
            comment: comment.into(),
            tip,
        })
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn tip(&self) -> u32 {
        self.tip
    }
}

impl Default for RideFeedback {
    fn default() -> Self {
        Self {
            rating: 5,
            comment: String::new(),
            tip: 0,
        }
    }
}
