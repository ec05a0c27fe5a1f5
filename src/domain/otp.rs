use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub const OTP_TTL_MINUTES: i64 = 10;
pub const OTP_CODE_MIN: u32 = 100_000;
pub const OTP_CODE_MAX: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum OtpScope {
    VerifyEmail,
    ResetPassword,
}

impl OtpScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpScope::VerifyEmail => "verify-email",
            OtpScope::ResetPassword => "reset-password",
        }
    }
}

impl FromStr for OtpScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify-email" => Ok(OtpScope::VerifyEmail),
            "reset-password" => Ok(OtpScope::ResetPassword),
            other => Err(format!("unknown otp scope '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpStatus {
    Active,
    Consumed,
}

impl OtpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpStatus::Active => "active",
            OtpStatus::Consumed => "consumed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Otp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub scope: OtpScope,
    pub status: OtpStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Otp {
    pub fn issue(user_id: Uuid, code: String, scope: OtpScope) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            code,
            scope,
            status: OtpStatus::Active,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            created_at: now,
            updated_at: now,
        }
    }

    /// Active, unexpired, and issued for exactly this code and scope.
    pub fn accepts(&self, code: &str, scope: OtpScope, now: DateTime<Utc>) -> bool {
        self.status == OtpStatus::Active
            && self.scope == scope
            && self.code == code
            && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_accepts_only_matching_active_code() {
        let otp = Otp::issue(Uuid::new_v4(), "123456".into(), OtpScope::VerifyEmail);
        let now = Utc::now();
        assert!(otp.accepts("123456", OtpScope::VerifyEmail, now));
        assert!(!otp.accepts("654321", OtpScope::VerifyEmail, now));
        assert!(!otp.accepts("123456", OtpScope::ResetPassword, now));
        assert!(!otp.accepts("123456", OtpScope::VerifyEmail, now + Duration::minutes(11)));
    }

    #[test]
    fn test_scope_round_trips_through_str() {
        assert_eq!("verify-email".parse::<OtpScope>(), Ok(OtpScope::VerifyEmail));
        assert!("login".parse::<OtpScope>().is_err());
    }
}
