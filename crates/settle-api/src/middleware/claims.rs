//! Claims Extraction
//!
//! Decodes the bearer token into a claim map and parks it as a request
//! extension for the resolver. Verification is the upstream gateway's
//! job; this layer re-checks the shared-secret signature and otherwise
//! treats the claim set as opaque.

use crate::state::ApiState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Decoded, verified claim set
#[derive(Debug, Clone)]
pub struct ClaimSet(pub Map<String, Value>);

impl ClaimSet {
    /// String claim by name
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Whether the caller carries the platform-admin role
    pub fn is_platform_admin(&self) -> bool {
        self.get_str("role") == Some("platform_admin")
    }
}

/// Decode the Authorization header, if any, into a [`ClaimSet`] extension
pub async fn extract_claims(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "));

    if let Some(token) = token {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        match decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => {
                req.extensions_mut().insert(ClaimSet(data.claims));
            }
            Err(err) => {
                // an unreadable token is not fatal; lower-trust strategies
                // may still attribute the request
                debug!(%err, "bearer token rejected");
            }
        }
    }

    next.run(req).await
}
