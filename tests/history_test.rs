mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::{seed_product, seed_user, test_app, TestApp};
use payoll_core::domain::transaction::{STATUS_DELETED, STATUS_FAILED, STATUS_SUCCESS};
use payoll_core::domain::{Product, Role, Transaction, User};
use payoll_core::error::AppError;
use payoll_core::services::PurchaseRequest;

async fn buy(app: &TestApp, product: &Product, user: &User, customer_id: &str) -> Transaction {
    app.state
        .transactions
        .create_transaction(
            product,
            user,
            &PurchaseRequest {
                customer_id: customer_id.to_string(),
                success_redirect_url: "https://shop.example.com/ok".to_string(),
                failure_redirect_url: "https://shop.example.com/fail".to_string(),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_history_by_id_is_limited_to_owner_and_admins() {
    let app = test_app();
    let owner = seed_user(&app.store, "owner@example.com", Role::User).await;
    let other = seed_user(&app.store, "other@example.com", Role::User).await;
    let admin = seed_user(&app.store, "admin@example.com", Role::Admin).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    let tx = buy(&app, &product, &owner, "0812").await;

    let entry = app.state.transactions.history_by_id(tx.id, &owner).await.unwrap();
    assert_eq!(entry.user_email.as_deref(), Some("owner@example.com"));
    assert_eq!(entry.product_code.as_deref(), Some("TSEL10"));
    assert_eq!(entry.product_description.as_deref(), Some("TSEL10 description"));

    let err = app
        .state
        .transactions
        .history_by_id(tx.id, &other)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert!(app.state.transactions.history_by_id(tx.id, &admin).await.is_ok());
}

#[tokio::test]
async fn test_history_by_user_lists_only_own_rows_in_creation_order() {
    let app = test_app();
    let alice = seed_user(&app.store, "alice@example.com", Role::User).await;
    let bob = seed_user(&app.store, "bob@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;

    let first = buy(&app, &product, &alice, "a-1").await;
    buy(&app, &product, &bob, "b-1").await;
    let second = buy(&app, &product, &alice, "a-2").await;

    let history = app.state.transactions.history_by_user(alice.id).await.unwrap();
    let ids: Vec<_> = history.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn test_all_paged_windows_and_filters() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let product = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;

    let mut created = Vec::new();
    for i in 0..5 {
        created.push(buy(&app, &product, &user, &format!("c-{}", i)).await);
    }
    app.state
        .transactions
        .change_status(created[1].id, STATUS_FAILED)
        .await
        .unwrap();
    app.state.transactions.soft_delete(created[4].id).await.unwrap();

    let page1 = app.state.transactions.all_paged(1, 2, None).await.unwrap();
    let page2 = app.state.transactions.all_paged(2, 2, None).await.unwrap();
    let page3 = app.state.transactions.all_paged(3, 2, None).await.unwrap();
    assert_eq!(
        page1.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![created[0].id, created[1].id]
    );
    assert_eq!(
        page2.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![created[2].id, created[3].id]
    );
    assert!(page3.is_empty());

    // An empty status behaves like no filter.
    let unfiltered = app.state.transactions.all_paged(1, 10, Some("")).await.unwrap();
    assert_eq!(unfiltered.len(), 4);

    let failed = app
        .state
        .transactions
        .all_paged(1, 10, Some(STATUS_FAILED))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, created[1].id);

    let deleted = app
        .state
        .transactions
        .all_paged(1, 10, Some(STATUS_DELETED))
        .await
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].id, created[4].id);
}

#[tokio::test]
async fn test_all_paged_rejects_bad_window() {
    let app = test_app();
    assert!(matches!(
        app.state.transactions.all_paged(0, 10, None).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        app.state.transactions.all_paged(1, 0, None).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_top_products_counts_success_per_category() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let pulsa = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    let pln = seed_product(&app.store, "PLN20", "PREPAID", "Electricity", 20_000).await;

    let a = buy(&app, &pulsa, &user, "1").await;
    let b = buy(&app, &pulsa, &user, "2").await;
    let c = buy(&app, &pln, &user, "3").await;
    buy(&app, &pln, &user, "4").await;
    for tx in [&a, &b, &c] {
        app.state
            .transactions
            .change_status(tx.id, STATUS_SUCCESS)
            .await
            .unwrap();
    }

    let counts = app.state.transactions.top_products_by_category().await.unwrap();
    assert_eq!(counts.get("Mobile"), Some(&2));
    assert_eq!(counts.get("Electricity"), Some(&1));
    assert_eq!(counts.len(), 2);
}

#[tokio::test]
async fn test_income_per_day_sums_success_by_product_type() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let pulsa = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;
    let pln = seed_product(&app.store, "PLN20", "PREPAID", "Electricity", 20_000).await;

    let a = buy(&app, &pulsa, &user, "1").await;
    let b = buy(&app, &pulsa, &user, "2").await;
    let c = buy(&app, &pln, &user, "3").await;
    buy(&app, &pln, &user, "4").await;
    for tx in [&a, &b, &c] {
        app.state
            .transactions
            .change_status(tx.id, STATUS_SUCCESS)
            .await
            .unwrap();
    }

    let today = Utc::now().date_naive();
    let report = app
        .state
        .transactions
        .income_per_day(today, today)
        .await
        .unwrap();
    let day = report.get(&today).expect("today in report");
    assert_eq!(day.get("PULSA"), Some(&20_000));
    assert_eq!(day.get("PREPAID"), Some(&20_000));

    let tomorrow = today + Duration::days(1);
    let empty = app
        .state
        .transactions
        .income_per_day(tomorrow, tomorrow + Duration::days(6))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_income_per_day_rejects_inverted_range() {
    let app = test_app();
    let today = Utc::now().date_naive();
    let err = app
        .state
        .transactions
        .income_per_day(today, today - Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_income_per_day_rejects_range_ending_at_the_last_date() {
    let app = test_app();
    let today = Utc::now().date_naive();
    let err = app
        .state
        .transactions
        .income_per_day(today, NaiveDate::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_aggregates_skip_success_rows_deleted_afterwards() {
    let app = test_app();
    let user = seed_user(&app.store, "buyer@example.com", Role::User).await;
    let pulsa = seed_product(&app.store, "TSEL10", "PULSA", "Mobile", 10_000).await;

    let kept = buy(&app, &pulsa, &user, "1").await;
    let dropped = buy(&app, &pulsa, &user, "2").await;
    for tx in [&kept, &dropped] {
        app.state
            .transactions
            .change_status(tx.id, STATUS_SUCCESS)
            .await
            .unwrap();
    }
    app.state.transactions.soft_delete(dropped.id).await.unwrap();

    let counts = app.state.transactions.top_products_by_category().await.unwrap();
    assert_eq!(counts.get("Mobile"), Some(&1));

    let today = Utc::now().date_naive();
    let report = app
        .state
        .transactions
        .income_per_day(today, today)
        .await
        .unwrap();
    assert_eq!(report.get(&today).and_then(|d| d.get("PULSA")), Some(&10_000));
}
