use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    EnrichedTransaction, PaymentInfo, Product, PurchaseQuote, Transaction, User,
};
use crate::error::AppError;
use crate::middleware::auth::{AuthUser, LOGIN_AGAIN};
use crate::services::transaction_service::IncomeReport;
use crate::services::PurchaseRequest;
use crate::validation::{
    sanitize_string, validate_max_len, validate_redirect_url, validate_required, Validator,
    CUSTOMER_ID_MAX_LEN, PRODUCT_CODE_MAX_LEN, STATUS_MAX_LEN,
};
use crate::AppState;

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub product_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub success_redirect_url: String,
    #[serde(default)]
    pub failure_redirect_url: String,
}

/// Invoice callback body. Xendit sends many more fields; only these are read.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackPayload {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_channel: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncomeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub total: i64,
}

/// Resolves the bearer's account. Any failure reads as an expired session.
pub(crate) async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User, AppError> {
    match state.users.get_by_id(auth.id).await {
        Ok(user) if !user.is_deleted() => Ok(user),
        Ok(_) | Err(AppError::NotFound(_)) => Err(AppError::Unauthorized(LOGIN_AGAIN.to_string())),
        Err(e) => Err(e),
    }
}

async fn purchasable_product(state: &AppState, code: &str) -> Result<Product, AppError> {
    state.products.get_by_code(code).await.map_err(|e| match e {
        AppError::NotFound(_) => AppError::NotFound(format!("Product {} not found", code)),
        other => other,
    })
}

#[utoipa::path(
    post,
    path = "/transaction/review",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Priced preview", body = PurchaseQuote),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Unknown product")
    ),
    tag = "Transactions"
)]
pub async fn review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<PurchaseQuote>, AppError> {
    let user = current_user(&state, &auth).await?;

    let customer_id = sanitize_string(&req.customer_id);
    let product_code = sanitize_string(&req.product_code);
    let mut v = Validator::new();
    v.check(validate_required("customer_id", &customer_id))
        .check(validate_max_len("customer_id", &customer_id, CUSTOMER_ID_MAX_LEN))
        .check(validate_required("product_code", &product_code))
        .check(validate_max_len("product_code", &product_code, PRODUCT_CODE_MAX_LEN));
    v.finish()?;

    let product = purchasable_product(&state, &product_code).await?;
    Ok(Json(state.transactions.review(&product, &user, &customer_id)))
}

#[utoipa::path(
    post,
    path = "/transaction/submit",
    request_body = SubmitRequest,
    responses(
        (status = 201, description = "Transaction created with an invoice", body = Transaction),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Unknown product"),
        (status = 502, description = "Invoice could not be created")
    ),
    tag = "Transactions"
)]
pub async fn submit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&state, &auth).await?;

    let customer_id = sanitize_string(&req.customer_id);
    let product_code = sanitize_string(&req.product_code);
    let success_url = req.success_redirect_url.trim();
    let failure_url = req.failure_redirect_url.trim();
    let mut v = Validator::new();
    v.check(validate_required("customer_id", &customer_id))
        .check(validate_max_len("customer_id", &customer_id, CUSTOMER_ID_MAX_LEN))
        .check(validate_required("product_code", &product_code))
        .check(validate_max_len("product_code", &product_code, PRODUCT_CODE_MAX_LEN))
        .check(validate_redirect_url("success_redirect_url", success_url))
        .check(validate_redirect_url("failure_redirect_url", failure_url));
    v.finish()?;

    let product = purchasable_product(&state, &product_code).await?;
    let transaction = state
        .transactions
        .create_transaction(
            &product,
            &user,
            &PurchaseRequest {
                customer_id,
                success_redirect_url: success_url.to_string(),
                failure_redirect_url: failure_url.to_string(),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[utoipa::path(
    post,
    path = "/transaction/callback",
    request_body = CallbackPayload,
    responses(
        (status = 200, description = "Callback acknowledged", body = Transaction),
        (status = 401, description = "Bad callback token"),
        (status = 404, description = "Unknown invoice")
    ),
    tag = "Transactions"
)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CallbackPayload>,
) -> Result<Json<Transaction>, AppError> {
    if let Some(expected) = state.callback_token.as_deref() {
        let provided = headers
            .get(CALLBACK_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!(invoice_id = %payload.id, "Callback rejected: bad token");
            return Err(AppError::Unauthorized("Invalid callback token".to_string()));
        }
    }

    let info = PaymentInfo {
        status: payload.status,
        payment_method: payload.payment_method,
        payment_channel: payload.payment_channel,
    };
    let outcome = state.reconciler.reconcile(&payload.id, &info).await?;
    Ok(Json(outcome.transaction))
}

#[utoipa::path(
    get,
    path = "/transaction/history",
    responses(
        (status = 200, description = "Caller's transactions", body = [EnrichedTransaction]),
        (status = 401, description = "Not logged in")
    ),
    tag = "Transactions"
)]
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<EnrichedTransaction>>, AppError> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(state.transactions.history_by_user(user.id).await?))
}

#[utoipa::path(
    get,
    path = "/transaction/history/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction", body = EnrichedTransaction),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown transaction")
    ),
    tag = "Transactions"
)]
pub async fn history_by_id(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnrichedTransaction>, AppError> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(state.transactions.history_by_id(id, &user).await?))
}

#[utoipa::path(
    get,
    path = "/transaction/history/all",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of transactions", body = [EnrichedTransaction]),
        (status = 400, description = "Bad page or limit"),
        (status = 403, description = "Admin only")
    ),
    tag = "Admin"
)]
pub async fn history_all(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<EnrichedTransaction>>, AppError> {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let rows = state
        .transactions
        .all_paged(page, limit, query.status.as_deref())
        .await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/transaction/count",
    responses((status = 200, description = "Number of transactions", body = CountResponse)),
    tag = "Admin"
)]
pub async fn count(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    let total = state.transactions.count_all().await?;
    Ok(Json(CountResponse { total }))
}

#[utoipa::path(
    put,
    path = "/transaction/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Updated transaction", body = Transaction),
        (status = 404, description = "Unknown transaction"),
        (status = 409, description = "Concurrent update")
    ),
    tag = "Admin"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Transaction>, AppError> {
    let status = sanitize_string(&req.status);
    let mut v = Validator::new();
    v.check(validate_required("status", &status))
        .check(validate_max_len("status", &status, STATUS_MAX_LEN));
    v.finish()?;

    Ok(Json(state.transactions.change_status(id, &status).await?))
}

#[utoipa::path(
    delete,
    path = "/transaction/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Soft-deleted transaction", body = Transaction),
        (status = 404, description = "Unknown transaction")
    ),
    tag = "Admin"
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.transactions.soft_delete(id).await?))
}

#[utoipa::path(
    get,
    path = "/transaction/top-categories",
    responses((status = 200, description = "SUCCESS transactions per product category")),
    tag = "Admin"
)]
pub async fn top_categories(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, i64>>, AppError> {
    Ok(Json(state.transactions.top_products_by_category().await?))
}

#[utoipa::path(
    get,
    path = "/transaction/income",
    params(IncomeQuery),
    responses(
        (status = 200, description = "Income per day and product type"),
        (status = 400, description = "Bad date range")
    ),
    tag = "Admin"
)]
pub async fn income(
    State(state): State<AppState>,
    Query(query): Query<IncomeQuery>,
) -> Result<Json<IncomeReport>, AppError> {
    Ok(Json(
        state.transactions.income_per_day(query.from, query.to).await?,
    ))
}
