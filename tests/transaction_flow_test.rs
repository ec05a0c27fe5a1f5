mod common;

use common::{seed_product, seed_user, test_app, test_app_with};
use payoll_core::domain::transaction::{STATUS_DELETED, STATUS_FAILED, STATUS_PENDING};
use payoll_core::domain::Role;
use payoll_core::error::AppError;
use payoll_core::ports::TransactionRepository;
use payoll_core::services::pricing::{BILL_AMOUNT_MAX, BILL_AMOUNT_MIN};
use payoll_core::services::PurchaseRequest;

fn purchase(customer_id: &str) -> PurchaseRequest {
    PurchaseRequest {
        customer_id: customer_id.to_string(),
        success_redirect_url: "https://shop.example.com/ok".to_string(),
        failure_redirect_url: "https://shop.example.com/fail".to_string(),
    }
}

#[tokio::test]
async fn test_review_uses_catalog_price_for_regular_products() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "PLN20", "PREPAID", "Electricity", 20_500).await;

    let quote = app.state.transactions.review(&product, &user, "5312 0000 11");

    assert_eq!(quote.product_code, "PLN20");
    assert_eq!(quote.product_price, 20_500);
    assert_eq!(quote.admin_fee, 0);
    assert_eq!(quote.total_price, 20_500);
}

#[tokio::test]
async fn test_bill_price_is_stable_between_review_and_submit() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "BPJS", "BILL", "Insurance", 0).await;

    let quote = app.state.transactions.review(&product, &user, "8888001");
    assert!(quote.product_price >= BILL_AMOUNT_MIN && quote.product_price <= BILL_AMOUNT_MAX);

    let tx = app
        .state
        .transactions
        .create_transaction(&product, &user, &purchase("8888001"))
        .await
        .unwrap();
    assert_eq!(tx.product_price, quote.product_price);
    assert_eq!(tx.total_price, quote.total_price);

    // The invoice bills the computed amount, not the placeholder catalog price.
    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, quote.total_price);
    assert_eq!(requests[0].items[0].price, quote.product_price);
}

#[tokio::test]
async fn test_create_transaction_builds_invoice_and_stores_pending_row() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;

    let tx = app
        .state
        .transactions
        .create_transaction(&product, &user, &purchase("081234567890"))
        .await
        .unwrap();

    assert_eq!(tx.status, STATUS_PENDING);
    assert_eq!(tx.user_id, user.id);
    assert_eq!(tx.product_id, product.id);
    assert_eq!(tx.xendit_invoice_id.as_deref(), Some("inv_1"));
    assert_eq!(
        tx.xendit_payment_url.as_deref(),
        Some("https://checkout.xendit.co/web/inv_1")
    );

    let request = &app.gateway.requests()[0];
    assert!(request
        .external_id
        .starts_with(&format!("INV-{}-", user.id)));
    assert_eq!(tx.xendit_external_id.as_deref(), Some(request.external_id.as_str()));
    assert_eq!(request.amount, 10_000);
    assert_eq!(request.currency, "IDR");
    assert_eq!(request.invoice_duration, 86_400);
    assert_eq!(request.customer.email, "buyer@example.com");
    assert_eq!(request.items.len(), 1);
    assert_eq!(request.items[0].quantity, 1);
    assert_eq!(request.items[0].category, "Mobile");
    assert_eq!(request.fees[0].fee_type, "ADMIN");
    assert_eq!(request.fees[0].value, 0);
    assert_eq!(request.success_redirect_url, "https://shop.example.com/ok");

    let stored = app.state.transactions.get_by_invoice_id("inv_1").await.unwrap();
    assert_eq!(stored.id, tx.id);
}

#[tokio::test]
async fn test_two_purchases_in_one_second_get_distinct_external_ids() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;

    for _ in 0..2 {
        app.state
            .transactions
            .create_transaction(&product, &user, &purchase("0812"))
            .await
            .unwrap();
    }

    let requests = app.gateway.requests();
    assert_ne!(requests[0].external_id, requests[1].external_id);
}

#[tokio::test]
async fn test_gateway_failure_stores_nothing() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    app.gateway.set_failing(true);

    let err = app
        .state
        .transactions
        .create_transaction(&product, &user, &purchase("0812"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Gateway(_)));
    assert_eq!(app.state.transactions.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_change_status_and_soft_delete() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    let tx = app
        .state
        .transactions
        .create_transaction(&product, &user, &purchase("0812"))
        .await
        .unwrap();

    let failed = app
        .state
        .transactions
        .change_status(tx.id, STATUS_FAILED)
        .await
        .unwrap();
    assert_eq!(failed.status, STATUS_FAILED);

    let deleted = app.state.transactions.soft_delete(tx.id).await.unwrap();
    assert_eq!(deleted.status, STATUS_DELETED);
    assert!(deleted.deleted_at.is_some());

    // Deleting again is a no-op.
    let again = app.state.transactions.soft_delete(tx.id).await.unwrap();
    assert_eq!(again.deleted_at, deleted.deleted_at);
    assert_eq!(again.version, deleted.version);

    let history = app.state.transactions.history_by_user(user.id).await.unwrap();
    assert!(history.is_empty());
    // Counting includes deleted rows.
    assert_eq!(app.state.transactions.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn test_get_by_id_is_stable_without_writes() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    let tx = app
        .state
        .transactions
        .create_transaction(&product, &user, &purchase("0812"))
        .await
        .unwrap();

    let first = app.state.transactions.get_by_id(tx.id).await.unwrap();
    let second = app.state.transactions.get_by_id(tx.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, tx);
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let app = test_app();
    let err = app
        .state
        .transactions
        .change_status(uuid::Uuid::new_v4(), STATUS_FAILED)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_stale_write_is_rejected_with_optimistic_locking() {
    let mut settings = common::settings();
    settings.optimistic_locking = true;
    let app = test_app_with(settings);
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    let tx = app
        .state
        .transactions
        .create_transaction(&product, &user, &purchase("0812"))
        .await
        .unwrap();

    // A writer that loaded the row before this status change loses.
    app.state
        .transactions
        .change_status(tx.id, STATUS_FAILED)
        .await
        .unwrap();
    let err = TransactionRepository::update(&app.store, &tx, Some(tx.version))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        payoll_core::ports::RepositoryError::Conflict(_)
    ));
}
