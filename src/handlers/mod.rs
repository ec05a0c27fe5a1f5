pub mod products;
pub mod transactions;
pub mod users;

use crate::health::{check_health, HealthResponse};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        transactions::review,
        transactions::submit,
        transactions::callback,
        transactions::history,
        transactions::history_by_id,
        transactions::history_all,
        transactions::count,
        transactions::update_status,
        transactions::delete,
        transactions::top_categories,
        transactions::income,
        products::list,
        products::categories,
        products::get_by_code,
        products::get_by_id,
        products::list_by_type,
        products::categories_by_type,
        products::list_by_category,
        products::count,
        products::create,
        products::update,
        products::delete,
        users::request_otp,
        users::verify_email,
        users::register,
        users::login,
        users::reset_password,
        users::profile,
        users::update_profile,
        users::update_password,
        users::list,
        users::count,
        users::get_by_id,
        users::update_by_admin,
        users::delete_by_admin,
    ),
    components(schemas(
        crate::domain::Transaction,
        crate::domain::EnrichedTransaction,
        crate::domain::PurchaseQuote,
        crate::domain::Product,
        crate::domain::ProductDraft,
        crate::domain::OtpScope,
        crate::domain::Role,
        crate::domain::User,
        crate::domain::UserStatus,
        transactions::ReviewRequest,
        transactions::SubmitRequest,
        transactions::CallbackPayload,
        transactions::StatusUpdateRequest,
        transactions::CountResponse,
        users::OtpRequest,
        users::OtpResponse,
        users::VerifyEmailRequest,
        users::VerifyEmailResponse,
        users::RegisterRequest,
        users::LoginRequest,
        users::LoginResponse,
        users::ResetPasswordRequest,
        users::UpdateProfileRequest,
        users::UpdatePasswordRequest,
        users::AdminUserUpdateRequest,
    )),
    tags(
        (name = "Transactions", description = "Purchase lifecycle"),
        (name = "Products", description = "Catalog"),
        (name = "Users", description = "Accounts, login and OTP flows"),
        (name = "Admin", description = "Admin-only operations")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response: HealthResponse = check_health(&state.health_checkers, state.started_at).await;

    // Return 503 if a dependency is down, 200 otherwise
    let status_code = if response.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
