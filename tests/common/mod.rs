#![allow(dead_code)]

use async_trait::async_trait;
use lipa::application::Services;
use lipa::domain::ports::{
    AccessToken, Gateway, GatewayAck, GatewayError, PaymentStoreRef, PushRequest,
};
use lipa::infrastructure::in_memory::{InMemoryPaymentStore, InMemoryRatingStore};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A gateway double that accepts or rejects every push and remembers what it
/// was asked to send.
#[derive(Default)]
pub struct ScriptedGateway {
    pub reject: bool,
    pub pushes: AtomicUsize,
    pub requests: Mutex<Vec<PushRequest>>,
}

impl ScriptedGateway {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn authenticate(&self) -> Result<AccessToken, GatewayError> {
        Ok(AccessToken("test-token".to_string()))
    }

    async fn push_payment(
        &self,
        _token: &AccessToken,
        request: &PushRequest,
    ) -> Result<GatewayAck, GatewayError> {
        let n = self.pushes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.reject {
            return Err(GatewayError::Rejected {
                status: 400,
                payload: json!({"errorCode": "400.002.02", "errorMessage": "Bad Request"}),
            });
        }
        let checkout = format!("ws_CO_{}", n);
        Ok(GatewayAck {
            checkout_request_id: Some(checkout.clone()),
            merchant_request_id: None,
            description: Some("Success. Request accepted for processing".to_string()),
            raw: json!({"ResponseCode": "0", "CheckoutRequestID": checkout}),
        })
    }
}

pub struct Harness {
    pub services: Services,
    pub payments: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<ScriptedGateway>,
}

pub fn harness_with(gateway: Arc<ScriptedGateway>, payments: Arc<InMemoryPaymentStore>) -> Harness {
    let store: PaymentStoreRef = payments.clone();
    let services = Services::new(
        gateway.clone(),
        store,
        Arc::new(InMemoryRatingStore::new()),
        "254",
        chrono::Duration::hours(24),
    );
    Harness {
        services,
        payments,
        gateway,
    }
}

pub fn harness() -> Harness {
    harness_with(ScriptedGateway::accepting(), Arc::new(InMemoryPaymentStore::new()))
}

/// A gateway callback body in the shape the gateway posts it.
pub fn callback_body(result_code: i64, amount: Value, phone: Value) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": result_code,
                "ResultDesc": if result_code == 0 {
                    "The service request is processed successfully."
                } else {
                    "Request cancelled by user"
                },
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": amount},
                        {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                        {"Name": "TransactionDate", "Value": 20191219102115u64},
                        {"Name": "PhoneNumber", "Value": phone}
                    ]
                }
            }
        }
    })
}
