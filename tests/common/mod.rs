#![allow(dead_code)]

use async_trait::async_trait;
use payoll_core::adapters::{InMemoryStore, LogMailer};
use payoll_core::config::ServiceSettings;
use payoll_core::domain::{ExternalInvoice, Product, ProductDraft, Role, User};
use payoll_core::middleware::auth::issue_token;
use payoll_core::ports::{
    GatewayError, InvoiceRequest, PaymentGateway, ProductRepository, UserRepository,
};
use payoll_core::services::BillPricer;
use payoll_core::{create_app, AppState};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const JWT_SECRET: &str = "test-secret";
pub const CALLBACK_TOKEN: &str = "callback-token";

/// Gateway double that records every invoice request.
#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<InvoiceRequest>>,
    failing: AtomicBool,
    issued: AtomicUsize,
}

impl FakeGateway {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<InvoiceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<ExternalInvoice, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "{\"error_code\":\"API_VALIDATION_ERROR\"}".to_string(),
            });
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ExternalInvoice {
            id: format!("inv_{}", n),
            external_id: request.external_id.clone(),
            status: "PENDING".to_string(),
            invoice_url: format!("https://checkout.xendit.co/web/inv_{}", n),
        })
    }
}

pub struct TestApp {
    pub store: InMemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub state: AppState,
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        storage_timeout: Duration::from_secs(5),
        ..ServiceSettings::default()
    }
}

pub fn test_app() -> TestApp {
    test_app_with(settings())
}

pub fn test_app_with(settings: ServiceSettings) -> TestApp {
    let store = InMemoryStore::new();
    let gateway = Arc::new(FakeGateway::default());
    let state = AppState::new(
        store.repositories(),
        gateway.clone(),
        Arc::new(LogMailer),
        BillPricer::with_salt(42),
        settings,
        JWT_SECRET,
        Some(CALLBACK_TOKEN),
    );
    TestApp {
        store,
        gateway,
        state,
    }
}

pub async fn seed_user(store: &InMemoryStore, email: &str, role: Role) -> User {
    let user = User::new(
        "Test User".to_string(),
        email.to_string(),
        String::new(),
        role,
    );
    UserRepository::insert(store, &user).await.unwrap()
}

pub fn draft(code: &str, product_type: &str, category: &str, price: i64) -> ProductDraft {
    ProductDraft {
        code: code.to_string(),
        description: format!("{} description", code),
        nominal: String::new(),
        details: String::new(),
        price,
        product_type: product_type.to_string(),
        category: category.to_string(),
        active_period: 30,
        status: None,
        icon_url: String::new(),
    }
}

pub async fn seed_product(
    store: &InMemoryStore,
    code: &str,
    product_type: &str,
    category: &str,
    price: i64,
) -> Product {
    let product = Product::new(draft(code, product_type, category, price));
    ProductRepository::insert(store, &product).await.unwrap()
}

pub fn token_for(user: &User) -> String {
    issue_token(JWT_SECRET, user.id, user.role, chrono::Duration::hours(1)).unwrap()
}

/// Serves the app on an ephemeral port and returns its base URL.
pub async fn spawn_server(state: AppState) -> String {
    let app = create_app(state);

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    format!("http://{}", actual_addr)
}
