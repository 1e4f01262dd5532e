//! Application layer containing the payment and rating orchestration.
//!
//! `PaymentInitiator` starts a push payment, `CallbackReconciler` settles it
//! when the gateway calls back, and `RatingService` gates ratings on the
//! settled outcome. All three receive their store and gateway handles
//! explicitly; `Services` wires them once at startup.

pub mod initiation;
pub mod rating;
pub mod reconciler;

use crate::domain::ports::{GatewayRef, PaymentStoreRef, RatingStoreRef};
use chrono::Duration;
use initiation::PaymentInitiator;
use rating::RatingService;
use reconciler::CallbackReconciler;
use std::sync::Arc;

/// The three handlers sharing one set of collaborators.
#[derive(Clone)]
pub struct Services {
    pub initiator: Arc<PaymentInitiator>,
    pub reconciler: Arc<CallbackReconciler>,
    pub ratings: Arc<RatingService>,
    pub payments: PaymentStoreRef,
    /// Applied to payer numbers on both initiation and callback.
    pub country_code: String,
}

impl Services {
    pub fn new(
        gateway: GatewayRef,
        payments: PaymentStoreRef,
        ratings: RatingStoreRef,
        country_code: &str,
        rating_window: Duration,
    ) -> Self {
        Self {
            initiator: Arc::new(PaymentInitiator::new(
                gateway,
                payments.clone(),
                country_code,
            )),
            reconciler: Arc::new(CallbackReconciler::new(payments.clone())),
            ratings: Arc::new(RatingService::new(
                payments.clone(),
                ratings,
                rating_window,
            )),
            payments,
            country_code: country_code.to_string(),
        }
    }
}
