//! In-process storage behind the same ports as the Postgres adapters.
//! Backs `serve --in-memory` and the service-level tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::otp::OtpStatus;
use crate::domain::transaction::{STATUS_DELETED, STATUS_SUCCESS};
use crate::domain::{
    EnrichedTransaction, HistoryPage, IncomeRow, Otp, OtpScope, Product, Transaction, User,
    UserStatus,
};
use crate::ports::{
    OtpRepository, ProductRepository, Repositories, RepositoryError, RepositoryResult,
    TransactionRepository, UserRepository,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    // Insertion order doubles as the creation order for listings.
    transactions: Vec<Transaction>,
    otps: Vec<Otp>,
}

impl State {
    fn enrich(&self, tx: &Transaction) -> EnrichedTransaction {
        let user = self.users.get(&tx.user_id);
        let product = self.products.get(&tx.product_id);
        EnrichedTransaction {
            id: tx.id,
            user_email: user.map(|u| u.email.clone()),
            product_code: product.map(|p| p.code.clone()),
            product_description: product.map(|p| p.description.clone()),
            customer_id: tx.customer_id.clone(),
            product_price: tx.product_price,
            admin_fee: tx.admin_fee,
            total_price: tx.total_price,
            xendit_payment_url: tx.xendit_payment_url.clone(),
            xendit_status: tx.xendit_status.clone(),
            xendit_payment_method: tx.xendit_payment_method.clone(),
            xendit_payment_channel: tx.xendit_payment_channel.clone(),
            status: tx.status.clone(),
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }

    fn sorted_transactions(&self) -> Vec<&Transaction> {
        let mut all: Vec<&Transaction> = self.transactions.iter().collect();
        // Stable sort keeps insertion order for equal timestamps.
        all.sort_by_key(|tx| tx.created_at);
        all
    }
}

/// Shared in-memory store. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            transactions: Arc::new(self.clone()),
            products: Arc::new(self.clone()),
            users: Arc::new(self.clone()),
            otps: Arc::new(self.clone()),
        }
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        if state.transactions.iter().any(|t| t.id == tx.id) {
            return Err(RepositoryError::Conflict(format!("transaction {}", tx.id)));
        }
        state.transactions.push(tx.clone());
        Ok(tx.clone())
    }

    async fn update(
        &self,
        tx: &Transaction,
        expected_version: Option<i64>,
    ) -> RepositoryResult<Transaction> {
        let mut state = self.state.write().await;
        let stored = state
            .transactions
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or_else(|| RepositoryError::NotFound(tx.id.to_string()))?;

        if let Some(expected) = expected_version {
            if stored.version != expected {
                return Err(RepositoryError::Conflict(format!(
                    "transaction {} is at version {}, expected {}",
                    tx.id, stored.version, expected
                )));
            }
        }

        stored.xendit_invoice_id = tx.xendit_invoice_id.clone();
        stored.xendit_payment_url = tx.xendit_payment_url.clone();
        stored.xendit_status = tx.xendit_status.clone();
        stored.xendit_external_id = tx.xendit_external_id.clone();
        stored.xendit_payment_method = tx.xendit_payment_method.clone();
        stored.xendit_payment_channel = tx.xendit_payment_channel.clone();
        stored.status = tx.status.clone();
        stored.updated_at = tx.updated_at;
        stored.deleted_at = tx.deleted_at;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let state = self.state.read().await;
        state
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_by_invoice_id(&self, invoice_id: &str) -> RepositoryResult<Transaction> {
        let state = self.state.read().await;
        state
            .transactions
            .iter()
            .find(|t| t.xendit_invoice_id.as_deref() == Some(invoice_id))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("invoice {}", invoice_id)))
    }

    async fn history_by_id(&self, id: Uuid) -> RepositoryResult<EnrichedTransaction> {
        let state = self.state.read().await;
        state
            .transactions
            .iter()
            .find(|t| t.id == id)
            .map(|t| state.enrich(t))
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn history_by_user(&self, user_id: Uuid) -> RepositoryResult<Vec<EnrichedTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .sorted_transactions()
            .into_iter()
            .filter(|t| t.user_id == user_id && !t.is_deleted())
            .map(|t| state.enrich(t))
            .collect())
    }

    async fn list_history(&self, page: &HistoryPage) -> RepositoryResult<Vec<EnrichedTransaction>> {
        let state = self.state.read().await;
        let skip = usize::try_from(page.skip.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(page.take.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .sorted_transactions()
            .into_iter()
            .filter(|t| match &page.status {
                Some(status) => &t.status == status,
                None => t.status != STATUS_DELETED && !t.is_deleted(),
            })
            .skip(skip)
            .take(take)
            .map(|t| state.enrich(t))
            .collect())
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let state = self.state.read().await;
        Ok(state.transactions.len() as i64)
    }

    async fn count_success_by_category(&self) -> RepositoryResult<HashMap<String, i64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for tx in state
            .transactions
            .iter()
            .filter(|t| t.status == STATUS_SUCCESS && !t.is_deleted())
        {
            if let Some(product) = state.products.get(&tx.product_id) {
                *counts.entry(product.category.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn income_by_day(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<IncomeRow>> {
        let state = self.state.read().await;
        let mut totals: BTreeMap<(chrono::NaiveDate, String), i64> = BTreeMap::new();
        for tx in state.transactions.iter().filter(|t| {
            t.status == STATUS_SUCCESS
                && !t.is_deleted()
                && t.created_at >= from
                && t.created_at < to
        }) {
            if let Some(product) = state.products.get(&tx.product_id) {
                *totals
                    .entry((tx.created_at.date_naive(), product.product_type.clone()))
                    .or_insert(0) += tx.total_price;
            }
        }
        Ok(totals
            .into_iter()
            .map(|((day, product_type), total)| IncomeRow {
                day,
                product_type,
                total,
            })
            .collect())
    }
}

impl State {
    fn insert_product(&mut self, product: &Product, ignore: Option<Uuid>) -> RepositoryResult<Product> {
        let duplicate = self
            .products
            .values()
            .any(|p| !p.is_deleted() && p.code == product.code && Some(p.id) != ignore);
        if duplicate && !product.is_deleted() {
            return Err(RepositoryError::Conflict(format!(
                "product code {}",
                product.code
            )));
        }
        self.products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    fn live_products(&self, keep: impl Fn(&Product) -> bool) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .values()
            .filter(|p| !p.is_deleted() && keep(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            (&a.category, a.price, &a.code).cmp(&(&b.category, b.price, &b.code))
        });
        products
    }

    fn live_categories(&self, keep: impl Fn(&Product) -> bool) -> Vec<String> {
        let categories: BTreeSet<String> = self
            .products
            .values()
            .filter(|p| !p.is_deleted() && keep(p))
            .map(|p| p.category.clone())
            .collect();
        categories.into_iter().collect()
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert(&self, product: &Product) -> RepositoryResult<Product> {
        let mut state = self.state.write().await;
        state.insert_product(product, None)
    }

    async fn replace(&self, retired: Uuid, replacement: &Product) -> RepositoryResult<Product> {
        let mut state = self.state.write().await;
        match state.products.get(&retired) {
            Some(current) if !current.is_deleted() => {}
            _ => return Err(RepositoryError::NotFound(format!("product {}", retired))),
        }

        // The retired row still counts as live until the insert succeeds.
        let saved = state.insert_product(replacement, Some(retired))?;
        if let Some(current) = state.products.get_mut(&retired) {
            let now = Utc::now();
            current.deleted_at = Some(now);
            current.updated_at = now;
        }
        Ok(saved)
    }

    async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Product> {
        let mut state = self.state.write().await;
        match state.products.get_mut(&id) {
            Some(product) if !product.is_deleted() => {
                let now = Utc::now();
                product.deleted_at = Some(now);
                product.updated_at = now;
                Ok(product.clone())
            }
            _ => Err(RepositoryError::NotFound(format!("product {}", id))),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Product> {
        let state = self.state.read().await;
        state
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", id)))
    }

    async fn get_active_by_code(&self, code: &str) -> RepositoryResult<Product> {
        let state = self.state.read().await;
        state
            .products
            .values()
            .find(|p| !p.is_deleted() && p.code == code)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", code)))
    }

    async fn list_active(&self) -> RepositoryResult<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state.live_products(|_| true))
    }

    async fn list_by_category(&self, category: &str) -> RepositoryResult<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state.live_products(|p| p.category == category))
    }

    async fn list_by_type(&self, product_type: &str) -> RepositoryResult<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state.live_products(|p| p.product_type == product_type))
    }

    async fn categories(&self) -> RepositoryResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.live_categories(|_| true))
    }

    async fn categories_by_type(&self, product_type: &str) -> RepositoryResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.live_categories(|p| p.product_type == product_type))
    }

    async fn count_active(&self) -> RepositoryResult<i64> {
        let state = self.state.read().await;
        Ok(state.products.values().filter(|p| !p.is_deleted()).count() as i64)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: &User) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict(format!("email {}", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<User> {
        let state = self.state.read().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<User> {
        let state = self.state.read().await;
        state
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", email)))
    }

    async fn set_status(&self, id: Uuid, status: UserStatus) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
        user.status = status;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(RepositoryError::Conflict(format!("email {}", user.email)));
        }
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user.id)))?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.status = user.status;
        stored.updated_at = user.updated_at;
        stored.deleted_at = user.deleted_at;
        Ok(stored.clone())
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(users)
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let state = self.state.read().await;
        Ok(state.users.values().filter(|u| !u.is_deleted()).count() as i64)
    }
}

#[async_trait]
impl OtpRepository for InMemoryStore {
    async fn insert(&self, otp: &Otp) -> RepositoryResult<Otp> {
        let mut state = self.state.write().await;
        state.otps.push(otp.clone());
        Ok(otp.clone())
    }

    async fn last_for_user(&self, user_id: Uuid) -> RepositoryResult<Option<Otp>> {
        let state = self.state.read().await;
        Ok(state
            .otps
            .iter()
            .filter(|o| o.user_id == user_id)
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        code: &str,
        scope: OtpScope,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Otp>> {
        let state = self.state.read().await;
        Ok(state
            .otps
            .iter()
            .rev()
            .find(|o| o.user_id == user_id && o.accepts(code, scope, now))
            .cloned())
    }

    async fn consume(&self, id: Uuid) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        match state
            .otps
            .iter_mut()
            .find(|o| o.id == id && o.status == OtpStatus::Active)
        {
            Some(otp) => {
                otp.status = OtpStatus::Consumed;
                otp.updated_at = Utc::now();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("otp {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductDraft;

    fn product(code: &str) -> Product {
        Product::new(ProductDraft {
            code: code.to_string(),
            description: format!("{} voucher", code),
            nominal: "10K".to_string(),
            details: String::new(),
            price: 10_000,
            product_type: "VOUCHER".to_string(),
            category: "PULSA".to_string(),
            active_period: 30,
            status: None,
            icon_url: String::new(),
        })
    }

    #[tokio::test]
    async fn test_versioned_update_rejects_stale_writer() {
        let store = InMemoryStore::new();
        let tx = Transaction::draft(Uuid::new_v4(), Uuid::new_v4(), "c-1".into(), 5_000, 0);
        TransactionRepository::insert(&store, &tx).await.unwrap();

        let mut first = tx.clone();
        first.set_status("FAILED");
        let saved = TransactionRepository::update(&store, &first, Some(0)).await.unwrap();
        assert_eq!(saved.version, 1);

        let mut stale = tx.clone();
        stale.set_status(STATUS_SUCCESS);
        let err = TransactionRepository::update(&store, &stale, Some(0)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unversioned_update_is_last_write_wins() {
        let store = InMemoryStore::new();
        let tx = Transaction::draft(Uuid::new_v4(), Uuid::new_v4(), "c-1".into(), 5_000, 0);
        TransactionRepository::insert(&store, &tx).await.unwrap();

        let mut a = tx.clone();
        a.set_status("FAILED");
        TransactionRepository::update(&store, &a, None).await.unwrap();
        let mut b = tx.clone();
        b.set_status(STATUS_SUCCESS);
        let saved = TransactionRepository::update(&store, &b, None).await.unwrap();
        assert_eq!(saved.status, STATUS_SUCCESS);
        assert_eq!(saved.version, 2);
    }

    #[tokio::test]
    async fn test_code_is_unique_among_live_products() {
        let store = InMemoryStore::new();
        let first = product("PLN20");
        ProductRepository::insert(&store, &first).await.unwrap();
        let err = ProductRepository::insert(&store, &product("PLN20"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        store.soft_delete(first.id).await.unwrap();
        ProductRepository::insert(&store, &product("PLN20")).await.unwrap();
        assert_eq!(store.count_active().await.unwrap(), 1);
        // The deleted row stays addressable by id.
        assert!(ProductRepository::get_by_id(&store, first.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_product_live() {
        let store = InMemoryStore::new();
        let tsel = product("TSEL10");
        let pln = product("PLN20");
        ProductRepository::insert(&store, &tsel).await.unwrap();
        ProductRepository::insert(&store, &pln).await.unwrap();

        let err = store.replace(tsel.id, &product("PLN20")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(!ProductRepository::get_by_id(&store, tsel.id)
            .await
            .unwrap()
            .is_deleted());
        assert_eq!(store.count_active().await.unwrap(), 2);

        // Keeping the code of the retired row is fine.
        let replacement = store.replace(tsel.id, &product("TSEL10")).await.unwrap();
        assert_eq!(store.get_active_by_code("TSEL10").await.unwrap().id, replacement.id);
        assert!(ProductRepository::get_by_id(&store, tsel.id)
            .await
            .unwrap()
            .is_deleted());
    }
}
