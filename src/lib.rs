pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;
pub mod xendit;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::ServiceSettings;
use crate::health::DependencyChecker;
use crate::middleware::auth::{require_admin, require_user};
use crate::middleware::request_logger::request_logger_middleware;
use crate::ports::{Mailer, PaymentGateway, Repositories};
use crate::services::{
    BillPricer, CallbackReconciler, MailDispatcher, OtpService, ProductCatalog,
    TransactionService, UserDirectory,
};

#[derive(Clone)]
pub struct AppState {
    pub transactions: TransactionService,
    pub reconciler: CallbackReconciler,
    pub products: ProductCatalog,
    pub users: UserDirectory,
    pub otp: OtpService,
    pub jwt_secret: Arc<str>,
    pub token_ttl_hours: i64,
    pub callback_token: Option<Arc<str>>,
    pub health_checkers: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires every service over the given storage and collaborators.
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        pricer: BillPricer,
        settings: ServiceSettings,
        jwt_secret: &str,
        callback_token: Option<&str>,
    ) -> Self {
        let timeout = settings.storage_timeout;
        let token_ttl_hours = settings.token_ttl_hours;
        let products = ProductCatalog::new(repos.products, timeout);
        let users = UserDirectory::new(repos.users, timeout);
        let transactions =
            TransactionService::new(repos.transactions, gateway, pricer, settings.clone());
        let reconciler = CallbackReconciler::new(transactions.clone(), products.clone());
        let otp = OtpService::new(
            repos.otps,
            users.clone(),
            MailDispatcher::new(mailer),
            settings.app_name.clone(),
            timeout,
        );

        Self {
            transactions,
            reconciler,
            products,
            users,
            otp,
            jwt_secret: Arc::from(jwt_secret),
            token_ttl_hours,
            callback_token: callback_token.map(Arc::from),
            health_checkers: Arc::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    pub fn with_health_checker(mut self, checker: Arc<dyn DependencyChecker>) -> Self {
        let mut checkers = self.health_checkers.as_ref().clone();
        checkers.push(checker);
        self.health_checkers = Arc::new(checkers);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin_only = from_fn_with_state(state.clone(), require_admin);

    let user_routes = Router::new()
        .route("/transaction/review", post(handlers::transactions::review))
        .route("/transaction/submit", post(handlers::transactions::submit))
        .route("/transaction/history", get(handlers::transactions::history))
        .route(
            "/transaction/history/:id",
            get(handlers::transactions::history_by_id),
        )
        .route(
            "/user/profile",
            get(handlers::users::profile).put(handlers::users::update_profile),
        )
        .route("/user/password", put(handlers::users::update_password))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let admin_routes = Router::new()
        .route(
            "/transaction/history/all",
            get(handlers::transactions::history_all),
        )
        .route("/transaction/count", get(handlers::transactions::count))
        .route(
            "/transaction/top-categories",
            get(handlers::transactions::top_categories),
        )
        .route("/transaction/income", get(handlers::transactions::income))
        .route(
            "/transaction/:id",
            put(handlers::transactions::update_status).delete(handlers::transactions::delete),
        )
        .route("/product/count", get(handlers::products::count))
        .route("/user", get(handlers::users::list))
        .route("/user/count", get(handlers::users::count))
        .route(
            "/user/:id",
            get(handlers::users::get_by_id)
                .put(handlers::users::update_by_admin)
                .delete(handlers::users::delete_by_admin),
        )
        .route_layer(admin_only.clone());

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .route("/transaction/callback", post(handlers::transactions::callback))
        .route(
            "/product",
            get(handlers::products::list)
                .merge(post(handlers::products::create).route_layer(admin_only.clone())),
        )
        .route(
            "/product/:id",
            get(handlers::products::get_by_id).merge(
                put(handlers::products::update)
                    .delete(handlers::products::delete)
                    .route_layer(admin_only),
            ),
        )
        .route("/product/categories", get(handlers::products::categories))
        .route("/product/code/:code", get(handlers::products::get_by_code))
        .route(
            "/product/type/:product_type",
            get(handlers::products::list_by_type),
        )
        .route(
            "/product/type/:product_type/categories",
            get(handlers::products::categories_by_type),
        )
        .route(
            "/product/category/:category",
            get(handlers::products::list_by_category),
        )
        .route("/user/register", post(handlers::users::register))
        .route("/user/login", post(handlers::users::login))
        .route("/user/otp", post(handlers::users::request_otp))
        .route("/user/verify-email", post(handlers::users::verify_email))
        .route("/user/reset-password", post(handlers::users::reset_password));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(request_logger_middleware))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
