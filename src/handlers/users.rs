use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{OtpScope, User, UserStatus};
use crate::error::AppError;
use crate::handlers::transactions::{current_user, CountResponse};
use crate::middleware::auth::{issue_token, AuthUser};
use crate::services::AdminUserUpdate;
use crate::validation::{validate_email, validate_required, Validator};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Admin edit body. `is_activated` restores a deleted account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminUserUpdateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub status: UserStatus,
    #[serde(default)]
    pub is_activated: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpRequest {
    #[serde(default)]
    pub email: String,
    pub scope: OtpScope,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpResponse {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub status: UserStatus,
}

#[utoipa::path(
    post,
    path = "/user/otp",
    request_body = OtpRequest,
    responses(
        (status = 202, description = "Code issued and queued for mailing", body = OtpResponse),
        (status = 400, description = "Throttled or invalid request"),
        (status = 404, description = "Unknown email")
    ),
    tag = "Users"
)]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(req): Json<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_email("email", req.email.trim())?;

    let issued = state.otp.request_otp(req.email.trim(), req.scope).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OtpResponse {
            message: format!("OTP sent to email {}", issued.email),
            expires_at: issued.otp.expires_at,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/user/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = VerifyEmailResponse),
        (status = 400, description = "Invalid OTP"),
        (status = 404, description = "Unknown email")
    ),
    tag = "Users"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>, AppError> {
    let mut v = Validator::new();
    v.check(validate_email("email", req.email.trim()))
        .check(validate_required("code", &req.code));
    v.finish()?;

    let user = state.otp.verify_email(req.email.trim(), req.code.trim()).await?;
    Ok(Json(VerifyEmailResponse {
        message: "Email verified".to_string(),
        status: user.status,
    }))
}

#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, email not yet verified", body = User),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "Email already exists")
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .register(&req.name, req.email.trim(), &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token", body = LoginResponse),
        (status = 401, description = "Bad credentials or inactive account")
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let mut v = Validator::new();
    v.check(validate_email("email", req.email.trim()))
        .check(validate_required("password", &req.password));
    v.finish()?;

    let user = state
        .users
        .authenticate(req.email.trim(), &req.password)
        .await?;

    let ttl = chrono::Duration::hours(state.token_ttl_hours);
    let token = issue_token(&state.jwt_secret, user.id, user.role, ttl).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign token");
        AppError::Internal("failed to issue token".to_string())
    })?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(LoginResponse {
        token,
        expires_at: Utc::now() + ttl,
    }))
}

#[utoipa::path(
    post,
    path = "/user/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = User),
        (status = 400, description = "Invalid OTP or weak password"),
        (status = 404, description = "Unknown email")
    ),
    tag = "Users"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<User>, AppError> {
    let mut v = Validator::new();
    v.check(validate_email("email", req.email.trim()))
        .check(validate_required("code", &req.code));
    v.finish()?;

    let user = state
        .otp
        .reset_password(req.email.trim(), req.code.trim(), &req.password)
        .await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/user/profile",
    responses(
        (status = 200, description = "Caller's account", body = User),
        (status = 401, description = "Not logged in")
    ),
    tag = "Users"
)]
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    Ok(Json(current_user(&state, &auth).await?))
}

#[utoipa::path(
    put,
    path = "/user/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "Email already exists")
    ),
    tag = "Users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let user = current_user(&state, &auth).await?;
    let updated = state
        .users
        .update_profile(user.id, &req.name, req.email.trim())
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    put,
    path = "/user/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = User),
        (status = 400, description = "Old password is incorrect or new one is weak")
    ),
    tag = "Users"
)]
pub async fn update_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<User>, AppError> {
    validate_required("old_password", &req.old_password)?;

    let user = current_user(&state, &auth).await?;
    let updated = state
        .users
        .update_password(user.id, &req.old_password, &req.new_password)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/user",
    responses((status = 200, description = "Every account, deleted ones included", body = [User])),
    tag = "Admin"
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list().await?))
}

#[utoipa::path(
    get,
    path = "/user/count",
    responses((status = 200, description = "Number of live accounts", body = CountResponse)),
    tag = "Admin"
)]
pub async fn count(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    let total = state.users.count().await?;
    Ok(Json(CountResponse { total }))
}

#[utoipa::path(
    get,
    path = "/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account", body = User),
        (status = 404, description = "Unknown user")
    ),
    tag = "Admin"
)]
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_by_id(id).await?))
}

#[utoipa::path(
    put,
    path = "/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AdminUserUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "Email already exists")
    ),
    tag = "Admin"
)]
pub async fn update_by_admin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUserUpdateRequest>,
) -> Result<Json<User>, AppError> {
    let update = AdminUserUpdate {
        name: req.name,
        email: req.email.trim().to_string(),
        password: req.password.filter(|p| !p.is_empty()),
        status: req.status,
        reactivate: req.is_activated,
    };
    Ok(Json(state.users.update_by_admin(id, update).await?))
}

#[utoipa::path(
    delete,
    path = "/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Deleted account", body = User),
        (status = 404, description = "Unknown user")
    ),
    tag = "Admin"
)]
pub async fn delete_by_admin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.delete_by_admin(id).await?))
}
