use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Role, User, UserStatus};
use crate::error::AppError;
use crate::ports::UserRepository;
use crate::services::password::{hash_password, verify_password};
use crate::services::with_timeout;
use crate::validation::{
    sanitize_string, validate_email, validate_len_between, validate_password, Validator,
    NAME_MAX_LEN, NAME_MIN_LEN,
};

/// Admin-side account edit. A changed email drops the account back to
/// `NotVerified` whatever `status` says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUserUpdate {
    pub name: String,
    pub email: String,
    /// Left unchanged when `None`.
    pub password: Option<String>,
    pub status: UserStatus,
    /// Clears the delete marker.
    pub reactivate: bool,
}

/// Accounts: registration, login checks, profile and admin management.
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    storage_timeout: Duration,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>, storage_timeout: Duration) -> Self {
        Self {
            users,
            storage_timeout,
        }
    }

    /// Self-service sign-up. The role is always `User`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AppError> {
        let (name, email) = normalize_identity(name, email);
        let mut v = Validator::new();
        v.check(validate_len_between("name", &name, NAME_MIN_LEN, NAME_MAX_LEN))
            .check(validate_email("email", &email))
            .check(validate_password("password", password));
        v.finish()?;

        let user = User::new(name, email, hash_password(password), Role::User);
        let saved = self.insert(&user).await?;
        tracing::info!(user_id = %saved.id, "User registered");
        Ok(saved)
    }

    /// Operator-side account creation. Without a password the account can
    /// only log in after a password reset.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password: Option<&str>,
        role: Role,
    ) -> Result<User, AppError> {
        let (name, email) = normalize_identity(name, email);
        let mut v = Validator::new();
        v.check(validate_len_between("name", &name, NAME_MIN_LEN, NAME_MAX_LEN))
            .check(validate_email("email", &email));
        if let Some(password) = password {
            v.check(validate_password("password", password));
        }
        v.finish()?;

        let password_hash = password.map(hash_password).unwrap_or_default();
        let user = User::new(name, email, password_hash, role);
        let saved = self.insert(&user).await?;
        tracing::info!(user_id = %saved.id, role = %saved.role, "User created");
        Ok(saved)
    }

    /// Checks credentials for a login. Only verified, live accounts pass.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.get_by_email(email).await.map_err(|e| match e {
            AppError::NotFound(msg) => AppError::Unauthorized(msg),
            other => other,
        })?;

        if user.status != UserStatus::Verified {
            return Err(AppError::Unauthorized("user is not active".to_string()));
        }
        if user.is_deleted() {
            return Err(AppError::Unauthorized("user is deleted".to_string()));
        }
        if !verify_password(password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AppError::Unauthorized("password is incorrect".to_string()));
        }

        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User, AppError> {
        with_timeout(self.storage_timeout, "get user", self.users.get_by_id(id)).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        with_timeout(
            self.storage_timeout,
            "get user by email",
            self.users.get_by_email(&email),
        )
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound("email not found".to_string()),
            other => other,
        })
    }

    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        with_timeout(self.storage_timeout, "list users", self.users.list()).await
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        with_timeout(self.storage_timeout, "count users", self.users.count()).await
    }

    pub async fn mark_verified(&self, id: Uuid) -> Result<User, AppError> {
        with_timeout(
            self.storage_timeout,
            "verify user",
            self.users.set_status(id, UserStatus::Verified),
        )
        .await
    }

    /// Name and email change. A new email needs verifying again.
    pub async fn update_profile(&self, id: Uuid, name: &str, email: &str) -> Result<User, AppError> {
        let (name, email) = normalize_identity(name, email);
        let mut v = Validator::new();
        v.check(validate_len_between("name", &name, NAME_MIN_LEN, NAME_MAX_LEN))
            .check(validate_email("email", &email));
        v.finish()?;

        let mut user = self.get_by_id(id).await?;
        if user.email != email {
            user.email = email;
            user.status = UserStatus::NotVerified;
        }
        user.name = name;
        user.updated_at = Utc::now();

        let saved = self.save(&user).await?;
        tracing::info!(user_id = %id, status = saved.status.as_str(), "Profile updated");
        Ok(saved)
    }

    pub async fn update_password(
        &self,
        id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<User, AppError> {
        validate_password("new_password", new_password)?;

        let user = self.get_by_id(id).await?;
        if !verify_password(old_password, &user.password_hash) {
            return Err(AppError::BadRequest("old password is incorrect".to_string()));
        }
        self.set_password(user, new_password).await
    }

    /// Replaces the password without checking the old one. Callers prove
    /// ownership some other way, e.g. with a reset-password code.
    pub async fn reset_password(&self, id: Uuid, new_password: &str) -> Result<User, AppError> {
        validate_password("password", new_password)?;
        let user = self.get_by_id(id).await?;
        self.set_password(user, new_password).await
    }

    pub async fn update_by_admin(&self, id: Uuid, update: AdminUserUpdate) -> Result<User, AppError> {
        let (name, email) = normalize_identity(&update.name, &update.email);
        let mut v = Validator::new();
        v.check(validate_len_between("name", &name, NAME_MIN_LEN, NAME_MAX_LEN))
            .check(validate_email("email", &email));
        if let Some(password) = update.password.as_deref() {
            v.check(validate_password("password", password));
        }
        v.finish()?;

        let mut user = self.get_by_id(id).await?;
        user.status = update.status;
        if user.email != email {
            user.email = email;
            user.status = UserStatus::NotVerified;
        }
        user.name = name;
        if let Some(password) = update.password.as_deref() {
            user.password_hash = hash_password(password);
        }
        if update.reactivate {
            user.deleted_at = None;
        }
        user.updated_at = Utc::now();

        let saved = self.save(&user).await?;
        tracing::info!(user_id = %id, status = saved.status.as_str(), "User updated by admin");
        Ok(saved)
    }

    /// Soft delete. Deleting twice keeps the first timestamp.
    pub async fn delete_by_admin(&self, id: Uuid) -> Result<User, AppError> {
        let mut user = self.get_by_id(id).await?;
        if user.is_deleted() {
            return Ok(user);
        }
        let now = Utc::now();
        user.deleted_at = Some(now);
        user.updated_at = now;

        let saved = self.save(&user).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(saved)
    }

    async fn set_password(&self, mut user: User, new_password: &str) -> Result<User, AppError> {
        user.password_hash = hash_password(new_password);
        user.updated_at = Utc::now();
        let saved = self.save(&user).await?;
        tracing::info!(user_id = %saved.id, "Password changed");
        Ok(saved)
    }

    async fn insert(&self, user: &User) -> Result<User, AppError> {
        with_timeout(self.storage_timeout, "insert user", self.users.insert(user))
            .await
            .map_err(email_taken)
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        with_timeout(self.storage_timeout, "update user", self.users.update(user))
            .await
            .map_err(email_taken)
    }
}

fn normalize_identity(name: &str, email: &str) -> (String, String) {
    (sanitize_string(name), email.trim().to_lowercase())
}

fn email_taken(err: AppError) -> AppError {
    match err {
        AppError::Conflict(_) => AppError::Conflict("email already exists".to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;

    const PASSWORD: &str = "Secr3t!pass";

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(InMemoryStore::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_register_forces_user_role_and_hashes_password() {
        let users = directory();
        let user = users
            .register(" Buyer  One ", " Buyer@Example.com ", PASSWORD)
            .await
            .unwrap();

        assert_eq!(user.name, "Buyer One");
        assert_eq!(user.email, "buyer@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, UserStatus::NotVerified);
        assert_ne!(user.password_hash, PASSWORD);
        assert!(verify_password(PASSWORD, &user.password_hash));

        let err = users
            .register("Someone", "buyer@example.com", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "email already exists"));
    }

    #[tokio::test]
    async fn test_register_reports_every_bad_field() {
        match directory().register("Al", "nope", "short").await.unwrap_err() {
            AppError::InvalidFields(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["name", "email", "password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authenticate_requires_verified_live_account() {
        let users = directory();
        let user = users.register("Buyer", "buyer@example.com", PASSWORD).await.unwrap();

        let err = users.authenticate("buyer@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "user is not active"));

        users.mark_verified(user.id).await.unwrap();
        let err = users.authenticate("buyer@example.com", "Wr0ng!pass").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "password is incorrect"));
        assert_eq!(
            users.authenticate("BUYER@example.com", PASSWORD).await.unwrap().id,
            user.id
        );

        users.delete_by_admin(user.id).await.unwrap();
        let err = users.authenticate("buyer@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "user is deleted"));

        let err = users.authenticate("nobody@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_email_change_requires_new_verification() {
        let users = directory();
        let user = users.register("Buyer", "buyer@example.com", PASSWORD).await.unwrap();
        users.register("Other", "other@example.com", PASSWORD).await.unwrap();
        users.mark_verified(user.id).await.unwrap();

        let renamed = users
            .update_profile(user.id, "Buyer Renamed", "buyer@example.com")
            .await
            .unwrap();
        assert_eq!(renamed.name, "Buyer Renamed");
        assert_eq!(renamed.status, UserStatus::Verified);

        let err = users
            .update_profile(user.id, "Buyer", "other@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let moved = users
            .update_profile(user.id, "Buyer", "new@example.com")
            .await
            .unwrap();
        assert_eq!(moved.email, "new@example.com");
        assert_eq!(moved.status, UserStatus::NotVerified);
    }

    #[tokio::test]
    async fn test_update_password_checks_old_password() {
        let users = directory();
        let user = users.register("Buyer", "buyer@example.com", PASSWORD).await.unwrap();

        let err = users
            .update_password(user.id, "Wr0ng!pass", "N3w!passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let updated = users
            .update_password(user.id, PASSWORD, "N3w!passwd")
            .await
            .unwrap();
        assert!(verify_password("N3w!passwd", &updated.password_hash));
        assert!(!verify_password(PASSWORD, &updated.password_hash));
    }

    #[tokio::test]
    async fn test_admin_update_delete_and_count() {
        let users = directory();
        let user = users.register("Buyer", "buyer@example.com", PASSWORD).await.unwrap();
        users
            .create("Admin", "admin@example.com", None, Role::Admin)
            .await
            .unwrap();
        assert_eq!(users.count().await.unwrap(), 2);

        let deleted = users.delete_by_admin(user.id).await.unwrap();
        assert!(deleted.is_deleted());
        let again = users.delete_by_admin(user.id).await.unwrap();
        assert_eq!(again.deleted_at, deleted.deleted_at);
        assert_eq!(users.count().await.unwrap(), 1);
        assert_eq!(users.list().await.unwrap().len(), 2);

        let restored = users
            .update_by_admin(
                user.id,
                AdminUserUpdate {
                    name: "Buyer".to_string(),
                    email: "buyer@example.com".to_string(),
                    password: Some("N3w!passwd".to_string()),
                    status: UserStatus::Verified,
                    reactivate: true,
                },
            )
            .await
            .unwrap();
        assert!(!restored.is_deleted());
        assert_eq!(restored.status, UserStatus::Verified);
        assert!(verify_password("N3w!passwd", &restored.password_hash));
        assert_eq!(users.count().await.unwrap(), 2);

        let moved = users
            .update_by_admin(
                user.id,
                AdminUserUpdate {
                    name: "Buyer".to_string(),
                    email: "moved@example.com".to_string(),
                    password: None,
                    status: UserStatus::Verified,
                    reactivate: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.status, UserStatus::NotVerified);
        assert!(verify_password("N3w!passwd", &moved.password_hash));
    }
}
