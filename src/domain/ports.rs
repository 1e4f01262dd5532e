use super::payment::{Amount, NewPayment, PaymentId, PaymentRecord, PaymentStatus};
use super::phone::PhoneNumber;
use super::rating::{NewRating, Rating};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Result of a compare-and-set on a payment record's status.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The record was Pending and now carries the terminal status.
    Applied(PaymentRecord),
    /// The record had already left Pending; it is returned unchanged.
    Stale(PaymentRecord),
    /// The same gateway notice already settled a record with this phone and
    /// amount; that record is returned and nothing is written.
    Duplicate(PaymentRecord),
    /// No record with that id exists.
    Missing,
}

/// Outcome of a conditional rating insert.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingInsert {
    Inserted(Rating),
    /// A rating for the same (payer, subject) already exists in the window.
    Duplicate(Rating),
}

/// Durable table of payment attempts.
///
/// Implementations must make `insert` and `resolve` atomic with respect to
/// each other; `resolve` is the only concurrency control the reconciler
/// relies on.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord>;

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>>;

    /// The most recently inserted record with this phone and amount.
    /// With `pending_only`, records that already left Pending are skipped.
    async fn latest_matching(
        &self,
        phone: &PhoneNumber,
        amount: Amount,
        pending_only: bool,
    ) -> Result<Option<PaymentRecord>>;

    /// Moves the record from Pending to `outcome`, only if it is still Pending
    /// and no record with the same phone and amount was already settled by
    /// `notice_id`. The check and the write happen under one lock.
    async fn resolve(
        &self,
        id: PaymentId,
        outcome: PaymentStatus,
        at: DateTime<Utc>,
        notice_id: Option<&str>,
    ) -> Result<Transition>;

    async fn has_succeeded(&self, payer_id: &str, subject_id: &str) -> Result<bool>;

    /// Every record in insertion order.
    async fn all(&self) -> Result<Vec<PaymentRecord>>;
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Inserts the rating unless one for the same (payer, subject) was created
    /// after `since`. Check and insert happen atomically.
    async fn insert_unless_recent(
        &self,
        rating: NewRating,
        since: DateTime<Utc>,
    ) -> Result<RatingInsert>;

    /// Ratings for a subject, newest first.
    async fn for_subject(&self, subject_id: &str) -> Result<Vec<Rating>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

/// Everything the gateway needs to prompt the payer's phone.
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub phone: PhoneNumber,
    pub amount: Amount,
    pub subject_reference: String,
}

/// The gateway accepted the push for asynchronous processing.
/// This is not a payment outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayAck {
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub description: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("authentication failed with status {status}")]
    Auth {
        status: u16,
        payload: serde_json::Value,
    },
    #[error("push rejected with status {status}")]
    Rejected {
        status: u16,
        payload: serde_json::Value,
    },
    #[error("gateway did not respond in time")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// The raw diagnostic payload for the caller.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Auth { payload, .. } | Self::Rejected { payload, .. } => payload.clone(),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

/// The external push-payment gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn authenticate(&self) -> std::result::Result<AccessToken, GatewayError>;

    async fn push_payment(
        &self,
        token: &AccessToken,
        request: &PushRequest,
    ) -> std::result::Result<GatewayAck, GatewayError>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type RatingStoreRef = Arc<dyn RatingStore>;
pub type GatewayRef = Arc<dyn Gateway>;
