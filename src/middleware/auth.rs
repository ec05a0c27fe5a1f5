use axum::{
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;
use crate::error::AppError;
use crate::AppState;

pub const LOGIN_AGAIN: &str = "Please login again";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

/// Caller identity taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    role: Role,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(secret: &str, token: &str) -> Result<AuthUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized(LOGIN_AGAIN.to_string())
    })?;

    let id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| AppError::Unauthorized(LOGIN_AGAIN.to_string()))?;
    Ok(AuthUser {
        id,
        role: data.claims.role,
    })
}

fn bearer<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_user<B>(
    State(state): State<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized(LOGIN_AGAIN.to_string()))?;
    let user = verify_token(&state.jwt_secret, token)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub async fn require_admin<B>(
    State(state): State<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized(LOGIN_AGAIN.to_string()))?;
    let user = verify_token(&state.jwt_secret, token)?;
    if user.role != Role::Admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
