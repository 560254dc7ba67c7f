//! Payment gateway access. Checkout talks to a [`PaymentVerifier`]; production
//! wires in [`PaystackClient`], tests substitute their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{config::PaystackConfig, error::AppError};

/// Gateway view of a transaction after verification.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentVerification {
    pub reference: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub amount: Option<i64>,
}

impl PaymentVerification {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInit {
    pub email: String,
    /// Minor units.
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Rejected(String),
    #[error("payment gateway timed out")]
    Timeout,
    #[error("payment gateway unreachable: {0}")]
    Transport(String),
    #[error("unexpected payment gateway response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::Timeout
        } else if err.is_decode() {
            PaymentError::Malformed(err.to_string())
        } else {
            PaymentError::Transport(err.to_string())
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::PaymentVerificationFailed(err.to_string())
    }
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<PaymentVerification, PaymentError>;

    async fn initialize(&self, request: PaymentInit) -> Result<PaymentSession, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    id: Option<i64>,
    status: String,
    reference: String,
    amount: Option<i64>,
    paid_at: Option<DateTime<Utc>>,
}

pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(config: &PaystackConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentError::Transport(format!("gateway returned {status}")));
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.status {
            let message = if envelope.message.is_empty() {
                format!("gateway returned {status}")
            } else {
                envelope.message
            };
            return Err(PaymentError::Rejected(message));
        }
        envelope
            .data
            .ok_or_else(|| PaymentError::Malformed("missing data".into()))
    }
}

#[async_trait]
impl PaymentVerifier for PaystackClient {
    async fn verify(&self, reference: &str) -> Result<PaymentVerification, PaymentError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        tracing::debug!(%reference, "verifying payment");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let data: VerifyData = Self::read_envelope(response).await?;
        Ok(PaymentVerification {
            reference: data.reference,
            transaction_id: data.id.map(|id| id.to_string()),
            status: data.status,
            paid_at: data.paid_at,
            amount: data.amount,
        })
    }

    async fn initialize(&self, request: PaymentInit) -> Result<PaymentSession, PaymentError> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await?;

        Self::read_envelope(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_status_counts_as_paid() {
        let mut verification = PaymentVerification {
            reference: "ref".into(),
            transaction_id: None,
            status: "success".into(),
            paid_at: None,
            amount: Some(1_000),
        };
        assert!(verification.is_successful());
        verification.status = "abandoned".into();
        assert!(!verification.is_successful());
    }

    #[test]
    fn verify_payload_parses_gateway_shape() {
        let raw = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 4099260516,
                "status": "success",
                "reference": "re4lyvq3s3",
                "amount": 40333,
                "paid_at": "2024-08-22T09:15:02.000Z"
            }
        }"#;
        let envelope: Envelope<VerifyData> = serde_json::from_str(raw).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.id, Some(4099260516));
        assert_eq!(data.amount, Some(40333));
        assert!(data.paid_at.is_some());
    }

    #[test]
    fn rejected_envelope_may_omit_data() {
        let raw = r#"{"status": false, "message": "Transaction reference not found"}"#;
        let envelope: Envelope<VerifyData> = serde_json::from_str(raw).unwrap();
        assert!(!envelope.status);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn gateway_errors_become_verification_failures() {
        let err: AppError = PaymentError::Timeout.into();
        assert_eq!(err.kind(), "payment_verification_failed");
    }
}
