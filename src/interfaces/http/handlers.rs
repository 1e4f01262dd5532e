use super::payload::{PushBody, RatingBody, decode_callback};
use crate::application::Services;
use crate::application::reconciler::ReconcileOutcome;
use crate::domain::payment::{PaymentId, PaymentRecord};
use crate::domain::rating::Rating;
use crate::error::{LipaError, Result};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

/// Fixed acknowledgment for every gateway delivery.
pub const CALLBACK_ACK: &str = "Callback received";

pub async fn index() -> &'static str {
    "Lipa backend is running"
}

pub async fn initiate_payment(
    State(services): State<Services>,
    Json(body): Json<PushBody>,
) -> Result<Json<Value>> {
    let initiated = services.initiator.initiate(body.into_request()?).await?;

    Ok(Json(json!({
        "message": "STK push initiated",
        "recordId": initiated.record.id,
        "response": initiated.ack.raw,
    })))
}

/// Receives the gateway's result notification.
///
/// Always answers 200: the gateway cannot act on a negative acknowledgment
/// and would only redeliver the same notice.
pub async fn payment_callback(
    State(services): State<Services>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let notice = match decode_callback(&body, &services.country_code) {
        Ok(notice) => notice,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding undecodable callback");
            return (StatusCode::OK, CALLBACK_ACK);
        }
    };

    match services.reconciler.reconcile(&notice).await {
        Ok(ReconcileOutcome::Applied(_)) => {}
        Ok(outcome) => tracing::debug!(?outcome, "Callback left store unchanged"),
        Err(e) => tracing::error!(
            error = %e,
            checkout_request_id = ?notice.checkout_request_id,
            "Callback could not be reconciled"
        ),
    }

    (StatusCode::OK, CALLBACK_ACK)
}

pub async fn get_payment(
    State(services): State<Services>,
    Path(id): Path<String>,
) -> Result<Json<PaymentRecord>> {
    let payment_id: PaymentId = id.parse()?;
    services
        .payments
        .get(payment_id)
        .await?
        .map(Json)
        .ok_or_else(|| LipaError::NotFound(format!("Payment {} not found", id)))
}

pub async fn submit_rating(
    State(services): State<Services>,
    Json(body): Json<RatingBody>,
) -> Result<(StatusCode, Json<Value>)> {
    services.ratings.submit(body.into_request()?).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Rating submitted successfully" })),
    ))
}

pub async fn list_ratings(
    State(services): State<Services>,
    Path(subject_id): Path<String>,
) -> Result<Json<Vec<Rating>>> {
    Ok(Json(services.ratings.ratings_for(&subject_id).await?))
}
