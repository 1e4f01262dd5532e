use super::phone::PhoneNumber;
use crate::error::LipaError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier assigned by the payment store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PaymentId {
    type Err = LipaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| LipaError::ValidationError(format!("Invalid payment id: {}", s)))
    }
}

/// A strictly positive fare amount.
///
/// Equality is numeric, so `50` and `50.00` echoed back by the gateway
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LipaError> {
        if value > Decimal::ZERO {
            Ok(Self(value.normalize()))
        } else {
            Err(LipaError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LipaError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    /// Maps a gateway result code onto the terminal status it implies.
    pub fn from_result_code(code: i64) -> Self {
        if code == 0 {
            Self::Succeeded
        } else {
            Self::Failed
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The fields the initiation handler supplies; the store fills in the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub payer_id: String,
    pub subject_id: String,
    pub phone: PhoneNumber,
    pub amount: Amount,
    pub checkout_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One push-payment attempt.
///
/// Created `Pending` once the gateway accepts the push and moved to a
/// terminal status exactly once by the callback reconciler.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub payer_id: String,
    pub subject_id: String,
    pub phone: PhoneNumber,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub checkout_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// CheckoutRequestID of the gateway notice that settled this record.
    #[serde(default)]
    pub resolved_by: Option<String>,
}

impl PaymentRecord {
    pub fn pending(id: PaymentId, new: NewPayment) -> Self {
        Self {
            id,
            payer_id: new.payer_id,
            subject_id: new.subject_id,
            phone: new.phone,
            amount: new.amount,
            status: PaymentStatus::Pending,
            checkout_request_id: new.checkout_request_id,
            created_at: new.created_at,
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn matches(&self, phone: &PhoneNumber, amount: Amount) -> bool {
        &self.phone == phone && self.amount == amount
    }

    /// Whether the gateway notice `notice_id` already settled this record,
    /// either as recorded on resolution or as the push it was created for.
    pub fn settled_by(&self, notice_id: &str) -> bool {
        self.status.is_terminal()
            && (self.resolved_by.as_deref() == Some(notice_id)
                || self.checkout_request_id.as_deref() == Some(notice_id))
    }

    /// Applies the single Pending -> terminal transition.
    ///
    /// Returns `false` without touching the record if it is already terminal
    /// or `outcome` is not a terminal status.
    pub fn resolve(&mut self, outcome: PaymentStatus, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        self.status = outcome;
        self.resolved_at = Some(at);
        true
    }
}
