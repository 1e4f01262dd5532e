//! Wire shapes for inbound requests and the gateway callback decode step.

use crate::application::initiation::PaymentRequest;
use crate::application::rating::RatingRequest;
use crate::application::reconciler::PaymentNotice;
use crate::domain::payment::Amount;
use crate::domain::phone::PhoneNumber;
use crate::error::{LipaError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// A JSON scalar the clients send either quoted or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }

    pub fn to_decimal(&self, field: &str) -> Result<Decimal> {
        let text = match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        };
        Decimal::from_str(&text)
            .map_err(|_| LipaError::ValidationError(format!("{} must be numeric", field)))
    }

    pub fn to_integer(&self, field: &str) -> Result<i64> {
        let invalid = || LipaError::ValidationError(format!("{} must be a whole number", field));
        match self {
            Self::Text(text) => text.trim().parse().map_err(|_| invalid()),
            Self::Number(number) => number.as_i64().ok_or_else(invalid),
        }
    }
}

fn text_or_empty(value: Option<Scalar>) -> String {
    value.map(Scalar::into_text).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushBody {
    pub phone_number: Option<Scalar>,
    pub amount: Option<Scalar>,
    pub customer_id: Option<Scalar>,
    pub matatu_id: Option<Scalar>,
}

impl PushBody {
    pub fn into_request(self) -> Result<PaymentRequest> {
        let amount = self
            .amount
            .as_ref()
            .map(|a| a.to_decimal("amount"))
            .transpose()?;
        Ok(PaymentRequest {
            phone: text_or_empty(self.phone_number),
            amount,
            payer_id: text_or_empty(self.customer_id),
            subject_id: text_or_empty(self.matatu_id),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingBody {
    pub customer_id: Option<Scalar>,
    pub matatu_id: Option<Scalar>,
    pub rating: Option<Scalar>,
    pub comment: Option<String>,
}

impl RatingBody {
    pub fn into_request(self) -> Result<RatingRequest> {
        let score = self
            .rating
            .as_ref()
            .map(|r| r.to_integer("rating"))
            .transpose()?;
        Ok(RatingRequest {
            payer_id: text_or_empty(self.customer_id),
            subject_id: text_or_empty(self.matatu_id),
            score,
            comment: self.comment,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    #[serde(rename = "Body")]
    body: CallbackBody,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StkCallback {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    result_code: i64,
    result_desc: Option<String>,
    callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
struct MetadataItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: Option<Scalar>,
}

impl CallbackMetadata {
    /// Items come in no guaranteed order, so they are looked up by name.
    fn get(&self, name: &str) -> Option<&Scalar> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }
}

/// Decodes a raw gateway callback body into a [`PaymentNotice`].
///
/// Absent `Amount` or `PhoneNumber` items decode to `None`; a missing result
/// code, malformed JSON or an unusable item value is a `DecodeError`.
pub fn decode_callback(bytes: &[u8], country_code: &str) -> Result<PaymentNotice> {
    let envelope: CallbackEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| LipaError::DecodeError(format!("callback body: {}", e)))?;
    let callback = envelope.body.stk_callback;
    let metadata = callback.callback_metadata.unwrap_or_default();

    let amount = metadata
        .get("Amount")
        .map(|value| {
            value
                .to_decimal("Amount")
                .and_then(Amount::new)
                .map_err(|e| LipaError::DecodeError(e.to_string()))
        })
        .transpose()?;
    let phone = metadata
        .get("PhoneNumber")
        .map(|value| {
            PhoneNumber::normalize(&value.clone().into_text(), country_code)
                .map_err(|e| LipaError::DecodeError(e.to_string()))
        })
        .transpose()?;

    Ok(PaymentNotice {
        result_code: callback.result_code,
        result_desc: callback.result_desc,
        checkout_request_id: callback.checkout_request_id,
        amount,
        phone,
    })
}
