use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Product, ProductDraft};
use crate::error::AppError;
use crate::ports::{ProductRepository, RepositoryError};
use crate::services::with_timeout;
use crate::validation::{
    sanitize_string, validate_max_len, validate_required, ValidationError, Validator,
    PRODUCT_CODE_MAX_LEN,
};

#[derive(Clone)]
pub struct ProductCatalog {
    products: Arc<dyn ProductRepository>,
    storage_timeout: Duration,
}

impl ProductCatalog {
    pub fn new(products: Arc<dyn ProductRepository>, storage_timeout: Duration) -> Self {
        Self {
            products,
            storage_timeout,
        }
    }

    pub async fn create(&self, draft: ProductDraft) -> Result<Product, AppError> {
        let draft = normalize(draft)?;
        self.ensure_code_free(&draft.code, None).await?;

        let product = Product::new(draft);
        let saved = with_timeout(
            self.storage_timeout,
            "insert product",
            self.products.insert(&product),
        )
        .await?;
        tracing::info!(product_id = %saved.id, code = %saved.code, "Product created");
        Ok(saved)
    }

    /// Replaces a product by shadow-deleting the old row and inserting a new
    /// one that keeps the original creation time, in one storage call.
    /// Transactions keep pointing at the old row.
    pub async fn update(&self, id: Uuid, draft: ProductDraft) -> Result<Product, AppError> {
        let draft = normalize(draft)?;
        let current = self.get_by_id(id).await?;
        if current.is_deleted() {
            return Err(AppError::NotFound(format!("product {}", id)));
        }
        if current.code != draft.code {
            self.ensure_code_free(&draft.code, Some(id)).await?;
        }

        let mut replacement = Product::new(draft);
        replacement.created_at = current.created_at;
        let saved = with_timeout(
            self.storage_timeout,
            "replace product",
            self.products.replace(id, &replacement),
        )
        .await?;
        tracing::info!(old_id = %id, new_id = %saved.id, code = %saved.code, "Product updated");
        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid) -> Result<Product, AppError> {
        let deleted = with_timeout(
            self.storage_timeout,
            "delete product",
            self.products.soft_delete(id),
        )
        .await?;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(deleted)
    }

    /// Resolves deleted products too.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Product, AppError> {
        with_timeout(
            self.storage_timeout,
            "get product",
            self.products.get_by_id(id),
        )
        .await
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Product, AppError> {
        with_timeout(
            self.storage_timeout,
            "get product by code",
            self.products.get_active_by_code(code),
        )
        .await
    }

    pub async fn list(&self) -> Result<Vec<Product>, AppError> {
        with_timeout(self.storage_timeout, "list products", self.products.list_active()).await
    }

    pub async fn categories(&self) -> Result<Vec<String>, AppError> {
        with_timeout(self.storage_timeout, "list categories", self.products.categories()).await
    }

    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, AppError> {
        let category = sanitize_string(category);
        with_timeout(
            self.storage_timeout,
            "list products by category",
            self.products.list_by_category(&category),
        )
        .await
    }

    /// Types are stored upper-cased, so the lookup is case-insensitive.
    pub async fn list_by_type(&self, product_type: &str) -> Result<Vec<Product>, AppError> {
        let product_type = sanitize_string(product_type).to_uppercase();
        with_timeout(
            self.storage_timeout,
            "list products by type",
            self.products.list_by_type(&product_type),
        )
        .await
    }

    pub async fn categories_by_type(&self, product_type: &str) -> Result<Vec<String>, AppError> {
        let product_type = sanitize_string(product_type).to_uppercase();
        with_timeout(
            self.storage_timeout,
            "list categories by type",
            self.products.categories_by_type(&product_type),
        )
        .await
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        with_timeout(self.storage_timeout, "count products", self.products.count_active()).await
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), AppError> {
        match self.products.get_active_by_code(code).await {
            Ok(existing) if Some(existing.id) != except => Err(AppError::Conflict(format!(
                "product code {} already exists",
                code
            ))),
            Ok(_) | Err(RepositoryError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn normalize(mut draft: ProductDraft) -> Result<ProductDraft, AppError> {
    draft.code = sanitize_string(&draft.code);
    draft.description = sanitize_string(&draft.description);
    draft.product_type = sanitize_string(&draft.product_type).to_uppercase();
    draft.category = sanitize_string(&draft.category);

    let mut v = Validator::new();
    v.check(validate_required("code", &draft.code))
        .check(validate_max_len("code", &draft.code, PRODUCT_CODE_MAX_LEN))
        .check(validate_required("description", &draft.description))
        .check(validate_required("type", &draft.product_type))
        .check(validate_required("category", &draft.category));
    if draft.price < 0 {
        v.check(Err(ValidationError::new("price", "must not be negative")));
    }
    v.finish()?;
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(Arc::new(InMemoryStore::new()), Duration::from_secs(1))
    }

    fn draft(code: &str) -> ProductDraft {
        ProductDraft {
            code: code.to_string(),
            description: "Telkomsel 10K".to_string(),
            nominal: "10000".to_string(),
            details: String::new(),
            price: 11_000,
            product_type: "voucher".to_string(),
            category: "PULSA".to_string(),
            active_period: 30,
            status: None,
            icon_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_code() {
        let catalog = catalog();
        let created = catalog.create(draft("TSEL10")).await.unwrap();
        assert_eq!(created.product_type, "VOUCHER");

        let err = catalog.create(draft("TSEL10")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_shadows_old_row() {
        let catalog = catalog();
        let original = catalog.create(draft("TSEL10")).await.unwrap();

        let mut changes = draft("TSEL10");
        changes.price = 12_000;
        let updated = catalog.update(original.id, changes).await.unwrap();

        assert_ne!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.price, 12_000);
        assert!(catalog.get_by_id(original.id).await.unwrap().is_deleted());
        assert_eq!(catalog.get_by_code("TSEL10").await.unwrap().id, updated.id);
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_onto_taken_code_keeps_original_live() {
        let catalog = catalog();
        let tsel = catalog.create(draft("TSEL10")).await.unwrap();
        catalog.create(draft("XL10")).await.unwrap();

        let err = catalog.update(tsel.id, draft("XL10")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!catalog.get_by_id(tsel.id).await.unwrap().is_deleted());
        assert_eq!(catalog.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_filters_by_type_and_category() {
        let catalog = catalog();
        catalog.create(draft("TSEL10")).await.unwrap();
        let mut pln = draft("PLN20");
        pln.product_type = "prepaid".to_string();
        pln.category = "Electricity".to_string();
        catalog.create(pln).await.unwrap();
        let mut bpjs = draft("BPJS");
        bpjs.product_type = "BILL".to_string();
        bpjs.category = "Insurance".to_string();
        let bpjs = catalog.create(bpjs).await.unwrap();
        catalog.delete(bpjs.id).await.unwrap();

        let prepaid = catalog.list_by_type("Prepaid").await.unwrap();
        assert_eq!(prepaid.len(), 1);
        assert_eq!(prepaid[0].code, "PLN20");
        assert_eq!(
            catalog.categories_by_type("voucher").await.unwrap(),
            vec!["PULSA".to_string()]
        );
        assert!(catalog.list_by_type("BILL").await.unwrap().is_empty());

        let pulsa = catalog.list_by_category("PULSA").await.unwrap();
        assert_eq!(pulsa.len(), 1);
        assert_eq!(pulsa[0].code, "TSEL10");
    }

    #[tokio::test]
    async fn test_invalid_draft_reports_fields() {
        let mut bad = draft("");
        bad.category = " ".to_string();
        match catalog().create(bad).await.unwrap_err() {
            AppError::InvalidFields(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["code", "category"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
