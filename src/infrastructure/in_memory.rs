use crate::domain::payment::{Amount, NewPayment, PaymentId, PaymentRecord, PaymentStatus};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{PaymentStore, RatingInsert, RatingStore, Transition};
use crate::domain::rating::{NewRating, Rating};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for payment records.
///
/// Records are kept in insertion order, so the newest match is found by a
/// reverse scan. Every write holds the lock for its whole check-and-mutate
/// step, which makes `resolve` a true compare-and-set.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<Vec<PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord> {
        let record = PaymentRecord::pending(PaymentId::generate(), payment);
        let mut payments = self.payments.write().await;
        payments.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments.iter().find(|p| p.id == id).cloned())
    }

    async fn latest_matching(
        &self,
        phone: &PhoneNumber,
        amount: Amount,
        pending_only: bool,
    ) -> Result<Option<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .rev()
            .filter(|p| !pending_only || p.status == PaymentStatus::Pending)
            .find(|p| p.matches(phone, amount))
            .cloned())
    }

    async fn resolve(
        &self,
        id: PaymentId,
        outcome: PaymentStatus,
        at: DateTime<Utc>,
        notice_id: Option<&str>,
    ) -> Result<Transition> {
        let mut payments = self.payments.write().await;
        let Some(index) = payments.iter().position(|p| p.id == id) else {
            return Ok(Transition::Missing);
        };

        if let Some(notice_id) = notice_id {
            let target = &payments[index];
            if let Some(settled) = payments
                .iter()
                .find(|p| p.matches(&target.phone, target.amount) && p.settled_by(notice_id))
            {
                return Ok(Transition::Duplicate(settled.clone()));
            }
        }

        let record = &mut payments[index];
        if record.resolve(outcome, at) {
            record.resolved_by = notice_id.map(str::to_string);
            Ok(Transition::Applied(record.clone()))
        } else {
            Ok(Transition::Stale(record.clone()))
        }
    }

    async fn has_succeeded(&self, payer_id: &str, subject_id: &str) -> Result<bool> {
        let payments = self.payments.read().await;
        Ok(payments.iter().any(|p| {
            p.payer_id == payer_id
                && p.subject_id == subject_id
                && p.status == PaymentStatus::Succeeded
        }))
    }

    async fn all(&self) -> Result<Vec<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments.clone())
    }
}

/// A thread-safe in-memory store for ratings.
#[derive(Default, Clone)]
pub struct InMemoryRatingStore {
    ratings: Arc<RwLock<Vec<Rating>>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn insert_unless_recent(
        &self,
        rating: NewRating,
        since: DateTime<Utc>,
    ) -> Result<RatingInsert> {
        let mut ratings = self.ratings.write().await;
        if let Some(existing) = ratings
            .iter()
            .find(|r| r.blocks(&rating.payer_id, &rating.subject_id, since))
        {
            return Ok(RatingInsert::Duplicate(existing.clone()));
        }

        let rating = Rating::from(rating);
        ratings.push(rating.clone());
        Ok(RatingInsert::Inserted(rating))
    }

    async fn for_subject(&self, subject_id: &str) -> Result<Vec<Rating>> {
        let ratings = self.ratings.read().await;
        let mut found: Vec<Rating> = ratings
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
