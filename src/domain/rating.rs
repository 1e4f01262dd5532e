use crate::error::LipaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingScore(u8);

impl RatingScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, LipaError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(LipaError::ValidationError(format!(
                "Rating must be between {} and {}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub payer_id: String,
    pub subject_id: String,
    pub score: RatingScore,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Rating {
    pub payer_id: String,
    pub subject_id: String,
    pub score: RatingScore,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<NewRating> for Rating {
    fn from(new: NewRating) -> Self {
        Self {
            payer_id: new.payer_id,
            subject_id: new.subject_id,
            score: new.score,
            comment: new.comment,
            created_at: new.created_at,
        }
    }
}

impl Rating {
    /// Whether this rating blocks another one from the same payer for the
    /// same subject created at or after `since`.
    pub fn blocks(&self, payer_id: &str, subject_id: &str, since: DateTime<Utc>) -> bool {
        self.payer_id == payer_id && self.subject_id == subject_id && self.created_at > since
    }
}
