use crate::config::GatewayConfig;
use crate::domain::ports::{AccessToken, Gateway, GatewayAck, GatewayError, PushRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const AUTH_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// The gateway validates timestamps against East Africa Time (UTC+3).
const GATEWAY_UTC_OFFSET_HOURS: i64 = 3;

/// Builds the push password and the timestamp it was derived from.
///
/// The gateway rejects stale timestamps, so this must run once per push.
pub fn stk_password(shortcode: &str, passkey: &str, now: DateTime<Utc>) -> (String, String) {
    let timestamp = (now.naive_utc() + chrono::Duration::hours(GATEWAY_UTC_OFFSET_HOURS))
        .format(TIMESTAMP_FORMAT)
        .to_string();
    let password = STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp));
    (password, timestamp)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: String,
    transaction_desc: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PushResponse {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    response_code: Option<String>,
    response_description: Option<String>,
}

/// Client for the Safaricom Daraja STK push API.
///
/// Holds the process-wide shortcode, credentials and callback URL. Every
/// request is bounded by the configured timeout; a timeout surfaces as
/// [`GatewayError::Timeout`].
pub struct MpesaGateway {
    http: Client,
    config: GatewayConfig,
}

impl MpesaGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Reads the body as JSON, falling back to the raw text so diagnostics are
/// never lost.
async fn payload(response: Response) -> Result<serde_json::Value, GatewayError> {
    let text = response.text().await.map_err(transport_error)?;
    Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
}

#[async_trait]
impl Gateway for MpesaGateway {
    async fn authenticate(&self) -> Result<AccessToken, GatewayError> {
        let response = self
            .http
            .get(self.url(AUTH_PATH))
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = payload(response).await?;
        if !status.is_success() {
            return Err(GatewayError::Auth {
                status: status.as_u16(),
                payload: body,
            });
        }

        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| GatewayError::Malformed(format!("token response: {}", e)))?;
        Ok(AccessToken(token.access_token))
    }

    async fn push_payment(
        &self,
        token: &AccessToken,
        request: &PushRequest,
    ) -> Result<GatewayAck, GatewayError> {
        let (password, timestamp) =
            stk_password(&self.config.shortcode, &self.config.passkey, Utc::now());
        let phone = request.phone.as_str();
        let body = StkPushBody {
            business_short_code: &self.config.shortcode,
            password,
            timestamp,
            transaction_type: &self.config.transaction_type,
            amount: request.amount.value(),
            party_a: phone,
            party_b: &self.config.shortcode,
            phone_number: phone,
            callback_url: &self.config.callback_url,
            account_reference: format!(
                "{} {}",
                self.config.account_reference_prefix, request.subject_reference
            ),
            transaction_desc: "Payment",
        };

        let response = self
            .http
            .post(self.url(PUSH_PATH))
            .bearer_auth(&token.0)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let raw = payload(response).await?;
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                payload: raw,
            });
        }

        let parsed: PushResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Malformed(format!("push response: {}", e)))?;
        if parsed.response_code.as_deref().is_some_and(|code| code != "0") {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                payload: raw,
            });
        }

        Ok(GatewayAck {
            checkout_request_id: parsed.checkout_request_id,
            merchant_request_id: parsed.merchant_request_id,
            description: parsed.response_description,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Amount;
    use crate::domain::phone::PhoneNumber;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GatewayConfig {
        GatewayConfig {
            base_url: base_url.to_string(),
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_url: "https://example.test/api/mpesa/stkcallback".to_string(),
            timeout_secs: 2,
            ..GatewayConfig::default()
        }
    }

    fn push_request() -> PushRequest {
        PushRequest {
            phone: PhoneNumber::normalize("0712345678", "254").unwrap(),
            amount: Amount::new(dec!(50)).unwrap(),
            subject_reference: "X".to_string(),
        }
    }

    #[test]
    fn test_stk_password_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 21, 4, 5).unwrap();
        let (password, timestamp) = stk_password("174379", "passkey", now);

        // 21:04:05 UTC is 00:04:05 the next day in EAT.
        assert_eq!(timestamp, "20240103000405");
        assert_eq!(
            password,
            STANDARD.encode("174379passkey20240103000405")
        );
    }

    #[test]
    fn test_stk_password_changes_with_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 21, 4, 5).unwrap();
        let later = now + chrono::Duration::seconds(1);
        assert_ne!(
            stk_password("174379", "passkey", now).0,
            stk_password("174379", "passkey", later).0
        );
    }

    #[tokio::test]
    async fn test_authenticate_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/v1/generate"))
            .and(query_param("grant_type", "client_credentials"))
            .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok", "expires_in": "3599"})),
            )
            .mount(&server)
            .await;

        let gateway = MpesaGateway::new(config(&server.uri())).unwrap();
        let token = gateway.authenticate().await.unwrap();
        assert_eq!(token, AccessToken("tok".to_string()));
    }

    #[tokio::test]
    async fn test_authenticate_failure_keeps_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/v1/generate"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"errorMessage": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let gateway = MpesaGateway::new(config(&server.uri())).unwrap();
        let err = gateway.authenticate().await.unwrap_err();
        match err {
            GatewayError::Auth { status, payload } => {
                assert_eq!(status, 400);
                assert_eq!(payload["errorMessage"], "Invalid credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_push_sends_expected_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(json!({
                "BusinessShortCode": "174379",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 50.0,
                "PartyA": "254712345678",
                "PartyB": "174379",
                "PhoneNumber": "254712345678",
                "CallBackURL": "https://example.test/api/mpesa/stkcallback",
                "AccountReference": "Matatu X",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = MpesaGateway::new(config(&server.uri())).unwrap();
        let ack = gateway
            .push_payment(&AccessToken("tok".to_string()), &push_request())
            .await
            .unwrap();

        assert_eq!(
            ack.checkout_request_id.as_deref(),
            Some("ws_CO_191220191020363925")
        );
        assert_eq!(ack.raw["ResponseCode"], "0");
    }

    #[tokio::test]
    async fn test_push_non_2xx_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let gateway = MpesaGateway::new(config(&server.uri())).unwrap();
        let err = gateway
            .push_payment(&AccessToken("tok".to_string()), &push_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Rejected { status: 500, ref payload } if payload == "upstream down"
        ));
    }

    #[tokio::test]
    async fn test_push_nonzero_response_code_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ResponseCode": "1",
                "ResponseDescription": "Rejected"
            })))
            .mount(&server)
            .await;

        let gateway = MpesaGateway::new(config(&server.uri())).unwrap();
        let err = gateway
            .push_payment(&AccessToken("tok".to_string()), &push_request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_push_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ResponseCode": "0"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.timeout_secs = 1;
        let gateway = MpesaGateway::new(cfg).unwrap();
        let err = gateway
            .push_payment(&AccessToken("tok".to_string()), &push_request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));
    }
}
