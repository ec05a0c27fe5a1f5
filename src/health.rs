use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Runs every checker concurrently, each bounded by a 5 s timeout.
pub async fn check_health(
    checkers: &[Arc<dyn DependencyChecker>],
    start_time: Instant,
) -> HealthResponse {
    let results = join_all(checkers.iter().map(|checker| async move {
        let status = timeout(CHECK_TIMEOUT, checker.check())
            .await
            .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
        (checker.name().to_string(), status)
    }))
    .await;

    let dependencies: HashMap<String, DependencyStatus> = results.into_iter().collect();

    HealthResponse {
        status: overall_status(&dependencies).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn overall_status(dependencies: &HashMap<String, DependencyStatus>) -> &'static str {
    if dependencies
        .values()
        .any(|s| matches!(s, DependencyStatus::Unhealthy { .. }))
    {
        "unhealthy"
    } else {
        "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    #[async_trait]
    impl DependencyChecker for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn check(&self) -> DependencyStatus {
            if self.0 {
                DependencyStatus::Healthy {
                    status: "healthy".to_string(),
                    latency_ms: 0,
                }
            } else {
                DependencyStatus::unhealthy("down")
            }
        }
    }

    #[tokio::test]
    async fn test_no_dependencies_is_healthy() {
        let response = check_health(&[], Instant::now()).await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_failed_dependency_is_unhealthy() {
        let checkers: Vec<Arc<dyn DependencyChecker>> = vec![Arc::new(Fixed(false))];
        let response = check_health(&checkers, Instant::now()).await;
        assert_eq!(response.status, "unhealthy");
        assert!(response.dependencies.contains_key("fixed"));
    }
}
