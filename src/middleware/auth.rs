//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Verify its HS256 signature and expiry
//! 3. Inject the caller identity into the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    error::AppError,
    models::order::{CallerIdentity, Role},
};

/// Claims carried by caller tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: i64,
    pub role: Role,
    /// Expiry, seconds since the Unix epoch
    pub exp: usize,
}

/// Verifies caller tokens signed with the shared `SECRET_KEY`.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode a token into the caller it names.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad signature, an expired token or malformed claims.
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "token rejected");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(CallerIdentity {
            id: data.claims.id,
            role: data.claims.role,
        })
    }
}

/// Authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Verify the token with `TokenVerifier`
/// 3. If valid: inject `CallerIdentity` into request, call next handler
/// 4. Otherwise: return 401 Unauthorized
///
/// Handlers read the caller with `Extension<CallerIdentity>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let caller = state.tokens.verify(token)?;

    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}
