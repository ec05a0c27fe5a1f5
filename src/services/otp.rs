use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::otp::{OTP_CODE_MAX, OTP_CODE_MIN, OTP_TTL_MINUTES};
use crate::domain::{Otp, OtpScope, User};
use crate::error::AppError;
use crate::ports::{MailMessage, OtpRepository};
use crate::services::{with_timeout, MailDispatcher, UserDirectory};
use crate::validation::validate_password;

const RESEND_INTERVAL_SECS: i64 = 60;

/// Issued code plus the delivery task carrying it.
pub struct IssuedOtp {
    pub otp: Otp,
    pub email: String,
    pub delivery: JoinHandle<bool>,
}

#[derive(Clone)]
pub struct OtpService {
    otps: Arc<dyn OtpRepository>,
    users: UserDirectory,
    dispatcher: MailDispatcher,
    app_name: String,
    storage_timeout: Duration,
}

impl OtpService {
    pub fn new(
        otps: Arc<dyn OtpRepository>,
        users: UserDirectory,
        dispatcher: MailDispatcher,
        app_name: String,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            otps,
            users,
            dispatcher,
            app_name,
            storage_timeout,
        }
    }

    pub async fn request_otp(&self, email: &str, scope: OtpScope) -> Result<IssuedOtp, AppError> {
        let user = self.active_user(email).await?;

        let last = with_timeout(
            self.storage_timeout,
            "last otp",
            self.otps.last_for_user(user.id),
        )
        .await?;
        if let Some(last) = last {
            if Utc::now() - last.created_at < ChronoDuration::seconds(RESEND_INTERVAL_SECS) {
                return Err(AppError::BadRequest(
                    "please wait 1 minute to request new OTP".to_string(),
                ));
            }
        }

        let code = rand::thread_rng()
            .gen_range(OTP_CODE_MIN..=OTP_CODE_MAX)
            .to_string();
        let otp = with_timeout(
            self.storage_timeout,
            "insert otp",
            self.otps.insert(&Otp::issue(user.id, code, scope)),
        )
        .await?;

        let delivery = self.dispatcher.dispatch(MailMessage {
            to: vec![user.email.clone()],
            subject: format!("{} verification code", self.app_name),
            body: format!(
                "Your {} code is {}. It expires in {} minutes.",
                scope.as_str(),
                otp.code,
                OTP_TTL_MINUTES
            ),
        });

        tracing::info!(user_id = %user.id, scope = scope.as_str(), "OTP issued");
        Ok(IssuedOtp {
            otp,
            email: user.email,
            delivery,
        })
    }

    pub async fn verify(&self, user_id: Uuid, code: &str, scope: OtpScope) -> Result<Otp, AppError> {
        let found = with_timeout(
            self.storage_timeout,
            "find otp",
            self.otps.find_active(user_id, code, scope, Utc::now()),
        )
        .await?;
        found.ok_or_else(|| AppError::BadRequest("invalid OTP".to_string()))
    }

    pub async fn consume(&self, user_id: Uuid, code: &str, scope: OtpScope) -> Result<(), AppError> {
        let otp = self.verify(user_id, code, scope).await?;
        with_timeout(self.storage_timeout, "consume otp", self.otps.consume(otp.id)).await
    }

    /// Checks a verify-email code, marks the account verified and burns the code.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<User, AppError> {
        let user = self.active_user(email).await?;
        let otp = self.verify(user.id, code, OtpScope::VerifyEmail).await?;

        let verified = self.users.mark_verified(user.id).await?;
        with_timeout(self.storage_timeout, "consume otp", self.otps.consume(otp.id)).await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(verified)
    }

    /// Checks a reset-password code, stores the new password and burns the code.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<User, AppError> {
        validate_password("password", new_password)?;
        let user = self.active_user(email).await?;
        let otp = self.verify(user.id, code, OtpScope::ResetPassword).await?;

        let updated = self.users.reset_password(user.id, new_password).await?;
        with_timeout(self.storage_timeout, "consume otp", self.otps.consume(otp.id)).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(updated)
    }

    async fn active_user(&self, email: &str) -> Result<User, AppError> {
        let user = self.users.get_by_email(email).await?;
        if user.is_deleted() {
            return Err(AppError::BadRequest("user is deleted".to_string()));
        }
        Ok(user)
    }
}
