use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::domain::{Product, ProductDraft};
use crate::error::AppError;
use crate::handlers::transactions::CountResponse;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/product",
    responses((status = 200, description = "Live products", body = [Product])),
    tag = "Products"
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list().await?))
}

#[utoipa::path(
    get,
    path = "/product/categories",
    responses((status = 200, description = "Distinct categories", body = [String])),
    tag = "Products"
)]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.products.categories().await?))
}

#[utoipa::path(
    get,
    path = "/product/code/{code}",
    params(("code" = String, Path, description = "Product code")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Unknown code")
    ),
    tag = "Products"
)]
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.products.get_by_code(&code).await?))
}

#[utoipa::path(
    get,
    path = "/product/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product, retired ones included", body = Product),
        (status = 404, description = "Unknown product")
    ),
    tag = "Products"
)]
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.products.get_by_id(id).await?))
}

#[utoipa::path(
    get,
    path = "/product/type/{product_type}",
    params(("product_type" = String, Path, description = "Product type, e.g. PULSA")),
    responses((status = 200, description = "Live products of the type", body = [Product])),
    tag = "Products"
)]
pub async fn list_by_type(
    State(state): State<AppState>,
    Path(product_type): Path<String>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list_by_type(&product_type).await?))
}

#[utoipa::path(
    get,
    path = "/product/type/{product_type}/categories",
    params(("product_type" = String, Path, description = "Product type, e.g. PULSA")),
    responses((status = 200, description = "Categories offered under the type", body = [String])),
    tag = "Products"
)]
pub async fn categories_by_type(
    State(state): State<AppState>,
    Path(product_type): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.products.categories_by_type(&product_type).await?))
}

#[utoipa::path(
    get,
    path = "/product/category/{category}",
    params(("category" = String, Path, description = "Category name")),
    responses((status = 200, description = "Live products in the category", body = [Product])),
    tag = "Products"
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list_by_category(&category).await?))
}

#[utoipa::path(
    get,
    path = "/product/count",
    responses((status = 200, description = "Number of live products", body = CountResponse)),
    tag = "Admin"
)]
pub async fn count(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    let total = state.products.count().await?;
    Ok(Json(CountResponse { total }))
}

#[utoipa::path(
    post,
    path = "/product",
    request_body = ProductDraft,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 400, description = "Invalid product"),
        (status = 409, description = "Code already used")
    ),
    tag = "Admin"
)]
pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<ProductDraft>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.create(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    put,
    path = "/product/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductDraft,
    responses(
        (status = 200, description = "Replacement product", body = Product),
        (status = 404, description = "Unknown product"),
        (status = 409, description = "Code already used")
    ),
    tag = "Admin"
)]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.products.update(id, draft).await?))
}

#[utoipa::path(
    delete,
    path = "/product/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Deleted product", body = Product),
        (status = 404, description = "Unknown product")
    ),
    tag = "Admin"
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.products.delete(id).await?))
}
