use crate::domain::payment::{Amount, NewPayment, PaymentRecord};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{GatewayAck, GatewayRef, PaymentStoreRef, PushRequest};
use crate::error::{LipaError, Result};
use chrono::Utc;
use rust_decimal::Decimal;

/// Raw caller input for a fare payment. Nothing here is trusted yet.
#[derive(Debug, Clone, Default)]
pub struct PaymentRequest {
    pub phone: String,
    pub amount: Option<Decimal>,
    pub payer_id: String,
    pub subject_id: String,
}

/// A push the gateway accepted, with the pending record written for it.
#[derive(Debug, Clone)]
pub struct Initiated {
    pub record: PaymentRecord,
    pub ack: GatewayAck,
}

/// Validates a pay request, asks the gateway to prompt the payer and records
/// the attempt as Pending.
///
/// The record is written only after the gateway accepts the push. If the
/// insert then fails, the push has already gone out and no local record
/// exists for it; the caller receives a store error and the orphaned push is
/// left as is.
pub struct PaymentInitiator {
    gateway: GatewayRef,
    store: PaymentStoreRef,
    country_code: String,
}

impl PaymentInitiator {
    pub fn new(gateway: GatewayRef, store: PaymentStoreRef, country_code: impl Into<String>) -> Self {
        Self {
            gateway,
            store,
            country_code: country_code.into(),
        }
    }

    pub async fn initiate(&self, request: PaymentRequest) -> Result<Initiated> {
        let payer_id = required(&request.payer_id, "payer id")?;
        let subject_id = required(&request.subject_id, "subject id")?;
        let amount = request
            .amount
            .ok_or_else(|| LipaError::ValidationError("amount is required".to_string()))
            .and_then(Amount::new)?;
        let phone = PhoneNumber::normalize(required(&request.phone, "phone number")?, &self.country_code)?;

        let token = self.gateway.authenticate().await?;
        let push = PushRequest {
            phone: phone.clone(),
            amount,
            subject_reference: subject_id.to_string(),
        };
        let ack = self.gateway.push_payment(&token, &push).await.inspect_err(|e| {
            tracing::warn!(payer_id, subject_id, error = %e, "Push request failed");
        })?;

        let record = self
            .store
            .insert(NewPayment {
                payer_id: payer_id.to_string(),
                subject_id: subject_id.to_string(),
                phone,
                amount,
                checkout_request_id: ack.checkout_request_id.clone(),
                created_at: Utc::now(),
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    payer_id,
                    subject_id,
                    checkout_request_id = ?ack.checkout_request_id,
                    error = %e,
                    "Push accepted but pending record was not written"
                );
            })?;

        tracing::info!(
            record_id = %record.id,
            phone = %record.phone,
            amount = %record.amount,
            "Payment pending"
        );

        Ok(Initiated { record, ack })
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LipaError::ValidationError(format!("{} is required", field)))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use crate::domain::ports::{AccessToken, Gateway, GatewayError, PaymentStore};
    use crate::infrastructure::in_memory::InMemoryPaymentStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGateway {
        reject: bool,
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl Gateway for CountingGateway {
        async fn authenticate(&self) -> std::result::Result<AccessToken, GatewayError> {
            Ok(AccessToken("tok".to_string()))
        }

        async fn push_payment(
            &self,
            _token: &AccessToken,
            _request: &PushRequest,
        ) -> std::result::Result<GatewayAck, GatewayError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(GatewayError::Rejected {
                    status: 400,
                    payload: serde_json::json!({"errorMessage": "Bad Request"}),
                });
            }
            Ok(GatewayAck {
                checkout_request_id: Some("ws_CO_1".to_string()),
                merchant_request_id: None,
                description: None,
                raw: serde_json::json!({"ResponseCode": "0"}),
            })
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            phone: "0712 345 678".to_string(),
            amount: Some(dec!(50)),
            payer_id: "1".to_string(),
            subject_id: "X".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepted_push_writes_pending_record() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(CountingGateway::default());
        let initiator = PaymentInitiator::new(gateway.clone(), store.clone(), "254");

        let initiated = initiator.initiate(request()).await.unwrap();

        assert_eq!(initiated.record.status, PaymentStatus::Pending);
        assert_eq!(initiated.record.phone.as_str(), "254712345678");
        assert_eq!(initiated.record.checkout_request_id.as_deref(), Some("ws_CO_1"));
        assert_eq!(store.all().await.unwrap(), vec![initiated.record]);
        assert_eq!(gateway.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_push_writes_nothing() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(CountingGateway {
            reject: true,
            ..Default::default()
        });
        let initiator = PaymentInitiator::new(gateway, store.clone(), "254");

        let err = initiator.initiate(request()).await.unwrap_err();

        assert!(matches!(err, LipaError::Gateway(GatewayError::Rejected { .. })));
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_network_call() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(CountingGateway::default());
        let initiator = PaymentInitiator::new(gateway.clone(), store.clone(), "254");

        let cases = [
            PaymentRequest { phone: String::new(), ..request() },
            PaymentRequest { amount: None, ..request() },
            PaymentRequest { amount: Some(dec!(0)), ..request() },
            PaymentRequest { amount: Some(dec!(-5)), ..request() },
            PaymentRequest { payer_id: " ".to_string(), ..request() },
            PaymentRequest { subject_id: String::new(), ..request() },
            PaymentRequest { phone: "abc".to_string(), ..request() },
        ];

        for case in cases {
            let err = initiator.initiate(case).await.unwrap_err();
            assert!(matches!(err, LipaError::ValidationError(_)));
        }

        assert_eq!(gateway.pushes.load(Ordering::SeqCst), 0);
        assert!(store.all().await.unwrap().is_empty());
    }
}
