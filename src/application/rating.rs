use crate::domain::ports::{PaymentStoreRef, RatingInsert, RatingStoreRef};
use crate::domain::rating::{NewRating, Rating, RatingScore};
use crate::error::{LipaError, Result};
use chrono::{DateTime, Duration, Utc};

/// Raw rating submission from a rider.
#[derive(Debug, Clone, Default)]
pub struct RatingRequest {
    pub payer_id: String,
    pub subject_id: String,
    pub score: Option<i64>,
    pub comment: Option<String>,
}

/// Accepts ratings only from payers with a successful payment for the
/// subject, at most once per payer and subject per rolling window.
pub struct RatingService {
    payments: PaymentStoreRef,
    ratings: RatingStoreRef,
    window: Duration,
}

impl RatingService {
    pub fn new(payments: PaymentStoreRef, ratings: RatingStoreRef, window: Duration) -> Self {
        Self {
            payments,
            ratings,
            window,
        }
    }

    /// Whether a Succeeded payment exists for (payer, subject).
    pub async fn is_eligible(&self, payer_id: &str, subject_id: &str) -> Result<bool> {
        self.payments.has_succeeded(payer_id, subject_id).await
    }

    pub async fn submit(&self, request: RatingRequest) -> Result<Rating> {
        self.submit_at(request, Utc::now()).await
    }

    pub async fn submit_at(&self, request: RatingRequest, now: DateTime<Utc>) -> Result<Rating> {
        let payer_id = request.payer_id.trim();
        let subject_id = request.subject_id.trim();
        if payer_id.is_empty() || subject_id.is_empty() {
            return Err(LipaError::ValidationError(
                "payer id, subject id and rating are required".to_string(),
            ));
        }
        let score = request
            .score
            .ok_or_else(|| {
                LipaError::ValidationError(
                    "payer id, subject id and rating are required".to_string(),
                )
            })
            .and_then(RatingScore::new)?;

        if !self.is_eligible(payer_id, subject_id).await? {
            tracing::info!(payer_id, subject_id, "Rating refused, no successful payment");
            return Err(LipaError::NotEligible);
        }

        let comment = request
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let rating = NewRating {
            payer_id: payer_id.to_string(),
            subject_id: subject_id.to_string(),
            score,
            comment,
            created_at: now,
        };

        match self
            .ratings
            .insert_unless_recent(rating, now - self.window)
            .await?
        {
            RatingInsert::Inserted(rating) => {
                tracing::info!(payer_id, subject_id, score = score.value(), "Rating recorded");
                Ok(rating)
            }
            RatingInsert::Duplicate(existing) => {
                tracing::info!(
                    payer_id,
                    subject_id,
                    previous = %existing.created_at,
                    "Rating refused, already rated in window"
                );
                Err(LipaError::AlreadyRated)
            }
        }
    }

    pub async fn ratings_for(&self, subject_id: &str) -> Result<Vec<Rating>> {
        self.ratings.for_subject(subject_id).await
    }
}
