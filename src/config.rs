use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_XENDIT_BASE_URL: &str = "https://api.xendit.co";
pub const DEFAULT_MAIL_API_URL: &str = "https://smtp.maileroo.com/send";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub xendit_base_url: String,
    pub xendit_secret_key: String,
    pub xendit_callback_token: Option<String>,
    pub jwt_secret: String,
    pub storage_timeout_secs: u64,
    pub gateway_timeout_secs: u64,
    pub invoice_duration_secs: u64,
    pub invoice_currency: String,
    pub app_name: String,
    pub optimistic_locking: bool,
    pub token_ttl_hours: i64,
    pub mail: Option<MailConfig>,
    pub log_format: LogFormat,
}

/// HTTP mail API used to deliver OTP codes. Unset means mail is only logged.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl MailConfig {
    fn from_env() -> anyhow::Result<Option<Self>> {
        let api_key = match env::var("MAIL_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };
        let from = env::var("MAIL_FROM")
            .map_err(|_| anyhow::anyhow!("MAIL_FROM must be set with MAIL_API_KEY"))?;

        Ok(Some(MailConfig {
            api_url: env::var("MAIL_API_URL").unwrap_or_else(|_| DEFAULT_MAIL_API_URL.to_string()),
            api_key,
            from,
        }))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

/// Runtime knobs handed to the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub storage_timeout: Duration,
    pub invoice_duration_secs: u64,
    pub currency: String,
    pub app_name: String,
    pub optimistic_locking: bool,
    pub token_ttl_hours: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(20),
            invoice_duration_secs: 86_400,
            currency: "IDR".to_string(),
            app_name: "PayOll".to_string(),
            optimistic_locking: false,
            token_ttl_hours: 24,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").ok(),
            xendit_base_url: env::var("XENDIT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_XENDIT_BASE_URL.to_string()),
            xendit_secret_key: env::var("XENDIT_SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("XENDIT_SECRET_KEY must be set"))?,
            xendit_callback_token: env::var("XENDIT_CALLBACK_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            storage_timeout_secs: parse_or("STORAGE_TIMEOUT_SECS", 20)?,
            gateway_timeout_secs: parse_or("GATEWAY_TIMEOUT_SECS", 30)?,
            invoice_duration_secs: parse_or("INVOICE_DURATION_SECS", 86_400)?,
            invoice_currency: env::var("INVOICE_CURRENCY").unwrap_or_else(|_| "IDR".to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "PayOll".to_string()),
            optimistic_locking: parse_or("OPTIMISTIC_LOCKING", false)?,
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", 24)?,
            mail: MailConfig::from_env()?,
            log_format: parse_or("LOG_FORMAT", LogFormat::Pretty)?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            storage_timeout: Duration::from_secs(self.storage_timeout_secs),
            invoice_duration_secs: self.invoice_duration_secs,
            currency: self.invoice_currency.clone(),
            app_name: self.app_name.clone(),
            optimistic_locking: self.optimistic_locking,
            token_ttl_hours: self.token_ttl_hours,
        }
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        _ => Ok(default),
    }
}
