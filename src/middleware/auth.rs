use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::ParticipantRole;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// `talent`, `company` or `admin`.
    pub role: String,
    pub exp: i64,
}

/// Authenticated caller identity, extracted once per request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: ParticipantRole,
}

pub fn verify_token(secret: &str, token: &str) -> Result<AuthContext, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(AuthContext {
        user_id,
        role: ParticipantRole::from_str(&data.claims.role),
    })
}

/// Mint a token. Used by local tooling and the integration tests; the
/// production issuer is the identity service.
pub fn mint_token(
    secret: &str,
    user_id: Uuid,
    role: ParticipantRole,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Config(format!("mint token: {e}")))
}

/// Bearer-token middleware: validates the JWT and stashes an `AuthContext`
/// in request extensions for the guard extractors. Introspection endpoints
/// and the WebSocket upgrade (query-string token) are exempt.
pub async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    let path = req.uri().path();
    if matches!(path, "/health") || path.ends_with("/ws") {
        return Ok(next.run(req).await);
    }

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
    let ctx = verify_token(&state.config.jwt_secret, token)?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
