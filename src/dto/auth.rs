use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::middleware::auth::Role;

/// Bearer token payload. Tokens are minted by the identity service; this
/// crate only verifies them.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}
