use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub email: String,
    /// Major currency units, e.g. `120.50`.
    pub amount: f64,
    pub reference: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSessionView {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}
