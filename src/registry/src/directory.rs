//! Application directory capability
//!
//! Role writes check `appCode`/`moduleCode` against an external directory of
//! applications and modules. The directory is best-effort: when it cannot be
//! reached the configured [`DirectoryFailurePolicy`] decides the outcome.
//! A directory that answers "inactive" always rejects.

use crate::error::{RegistryError, Result};
use crate::metrics::RegistryMetrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Directory lookup failures (as opposed to negative answers)
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unavailable(String),

    #[error("unexpected directory response: {0}")]
    InvalidResponse(String),
}

/// External directory of applications and their modules
#[async_trait]
pub trait ApplicationDirectory: Send + Sync {
    async fn is_active_application(&self, app_code: &str) -> std::result::Result<bool, DirectoryError>;

    async fn is_active_module(
        &self,
        app_code: &str,
        module_code: &str,
    ) -> std::result::Result<bool, DirectoryError>;
}

/// Behavior when a directory lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectoryFailurePolicy {
    /// Proceed as if the lookup had succeeded
    FailOpen,
    /// Abort the write with an internal error
    FailClosed,
}

impl FromStr for DirectoryFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail-open" | "open" => Ok(DirectoryFailurePolicy::FailOpen),
            "fail-closed" | "closed" => Ok(DirectoryFailurePolicy::FailClosed),
            other => Err(format!("unknown directory failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for DirectoryFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryFailurePolicy::FailOpen => f.write_str("fail-open"),
            DirectoryFailurePolicy::FailClosed => f.write_str("fail-closed"),
        }
    }
}

/// Outcome of checking a role's application and module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryVerdict {
    /// Directory confirmed both codes are active
    Allowed,
    /// Directory answered and one of the codes is inactive or unknown
    Rejected(String),
    /// Directory could not be consulted; allowed by policy
    FailedOpen(String),
}

/// Applies the failure policy on top of an [`ApplicationDirectory`]
#[derive(Clone)]
pub struct DirectoryGate {
    directory: Arc<dyn ApplicationDirectory>,
    policy: DirectoryFailurePolicy,
    metrics: RegistryMetrics,
}

impl DirectoryGate {
    pub fn new(
        directory: Arc<dyn ApplicationDirectory>,
        policy: DirectoryFailurePolicy,
        metrics: RegistryMetrics,
    ) -> Self {
        Self {
            directory,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> DirectoryFailurePolicy {
        self.policy
    }

    /// Check that `app_code` and `module_code` are active
    pub async fn check(&self, app_code: &str, module_code: &str) -> Result<DirectoryVerdict> {
        match self.directory.is_active_application(app_code).await {
            Ok(true) => self.count("active"),
            Ok(false) => {
                self.count("inactive");
                return Ok(DirectoryVerdict::Rejected(format!(
                    "application '{}' is not active",
                    app_code
                )));
            }
            Err(e) => return self.on_failure(app_code, module_code, e),
        }

        match self.directory.is_active_module(app_code, module_code).await {
            Ok(true) => {
                self.count("active");
                debug!(app_code, module_code, "directory confirmed application and module");
                Ok(DirectoryVerdict::Allowed)
            }
            Ok(false) => {
                self.count("inactive");
                Ok(DirectoryVerdict::Rejected(format!(
                    "module '{}' of application '{}' is not active",
                    module_code, app_code
                )))
            }
            Err(e) => self.on_failure(app_code, module_code, e),
        }
    }

    fn on_failure(
        &self,
        app_code: &str,
        module_code: &str,
        err: DirectoryError,
    ) -> Result<DirectoryVerdict> {
        self.count("error");
        match self.policy {
            DirectoryFailurePolicy::FailOpen => {
                self.metrics.directory_fail_open_total.inc();
                warn!(
                    app_code,
                    module_code,
                    error = %err,
                    "application directory unavailable, allowing role write"
                );
                Ok(DirectoryVerdict::FailedOpen(err.to_string()))
            }
            DirectoryFailurePolicy::FailClosed => Err(RegistryError::internal(format!(
                "application directory check failed: {}",
                err
            ))),
        }
    }

    fn count(&self, outcome: &str) {
        self.metrics
            .directory_lookups_total
            .with_label_values(&[outcome])
            .inc();
    }
}

/// Directory used when none is configured: everything is active
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllDirectory;

#[async_trait]
impl ApplicationDirectory for AllowAllDirectory {
    async fn is_active_application(&self, _app_code: &str) -> std::result::Result<bool, DirectoryError> {
        Ok(true)
    }

    async fn is_active_module(
        &self,
        _app_code: &str,
        _module_code: &str,
    ) -> std::result::Result<bool, DirectoryError> {
        Ok(true)
    }
}

/// In-process directory with a fixed set of active applications and modules
#[derive(Debug, Clone, Default)]
pub struct StaticApplicationDirectory {
    applications: HashMap<String, HashSet<String>>,
}

impl StaticApplicationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active application with its active modules
    pub fn with_application<I, S>(mut self, app_code: impl Into<String>, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applications
            .entry(app_code.into())
            .or_default()
            .extend(modules.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl ApplicationDirectory for StaticApplicationDirectory {
    async fn is_active_application(&self, app_code: &str) -> std::result::Result<bool, DirectoryError> {
        Ok(self.applications.contains_key(app_code))
    }

    async fn is_active_module(
        &self,
        app_code: &str,
        module_code: &str,
    ) -> std::result::Result<bool, DirectoryError> {
        Ok(self
            .applications
            .get(app_code)
            .map_or(false, |modules| modules.contains(module_code)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryEntry {
    #[serde(alias = "active")]
    is_active: bool,
}

/// Directory backed by the application service's REST API
///
/// `GET {base}/applications/{app}` and
/// `GET {base}/applications/{app}/modules/{module}`; a 404 means inactive,
/// otherwise the body's `isActive` flag decides.
#[derive(Debug, Clone)]
pub struct HttpApplicationDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApplicationDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::internal(format!("directory client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch_active(&self, url: String) -> std::result::Result<bool, DirectoryError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("{}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let response = response
            .error_for_status()
            .map_err(|e| DirectoryError::Unavailable(format!("{}: {}", url, e)))?;

        let entry: DirectoryEntry = response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(format!("{}: {}", url, e)))?;
        Ok(entry.is_active)
    }
}

#[async_trait]
impl ApplicationDirectory for HttpApplicationDirectory {
    async fn is_active_application(&self, app_code: &str) -> std::result::Result<bool, DirectoryError> {
        self.fetch_active(format!("{}/applications/{}", self.base_url, app_code))
            .await
    }

    async fn is_active_module(
        &self,
        app_code: &str,
        module_code: &str,
    ) -> std::result::Result<bool, DirectoryError> {
        self.fetch_active(format!(
            "{}/applications/{}/modules/{}",
            self.base_url, app_code, module_code
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreachableDirectory;

    #[async_trait]
    impl ApplicationDirectory for UnreachableDirectory {
        async fn is_active_application(&self, _: &str) -> std::result::Result<bool, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }

        async fn is_active_module(&self, _: &str, _: &str) -> std::result::Result<bool, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }

    fn gate(directory: impl ApplicationDirectory + 'static, policy: DirectoryFailurePolicy) -> DirectoryGate {
        DirectoryGate::new(Arc::new(directory), policy, RegistryMetrics::new().unwrap())
    }

    #[tokio::test]
    async fn test_static_directory_allows_known_module() {
        let dir = StaticApplicationDirectory::new().with_application("BILLING", ["INVOICES"]);
        let gate = gate(dir, DirectoryFailurePolicy::FailOpen);
        assert_eq!(
            gate.check("BILLING", "INVOICES").await.unwrap(),
            DirectoryVerdict::Allowed
        );
    }

    #[tokio::test]
    async fn test_directory_says_no() {
        let dir = StaticApplicationDirectory::new().with_application("BILLING", ["INVOICES"]);
        let gate = gate(dir, DirectoryFailurePolicy::FailOpen);

        assert!(matches!(
            gate.check("HR", "PAYROLL").await.unwrap(),
            DirectoryVerdict::Rejected(_)
        ));
        assert!(matches!(
            gate.check("BILLING", "LEDGER").await.unwrap(),
            DirectoryVerdict::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_fail_open() {
        let gate = gate(UnreachableDirectory, DirectoryFailurePolicy::FailOpen);
        let verdict = gate.check("BILLING", "INVOICES").await.unwrap();
        assert!(matches!(verdict, DirectoryVerdict::FailedOpen(_)));
        assert_eq!(gate.metrics.directory_fail_open_total.get(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_fail_closed() {
        let gate = gate(UnreachableDirectory, DirectoryFailurePolicy::FailClosed);
        let err = gate.check("BILLING", "INVOICES").await.unwrap_err();
        assert!(matches!(err, RegistryError::Internal(_)));
    }

    #[tokio::test]
    async fn test_http_directory_unreachable() {
        // Nothing listens on port 9 (discard) in the test environment
        let dir = HttpApplicationDirectory::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let result = dir.is_active_application("BILLING").await;
        assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "fail-open".parse::<DirectoryFailurePolicy>().unwrap(),
            DirectoryFailurePolicy::FailOpen
        );
        assert_eq!(
            "FAIL-CLOSED".parse::<DirectoryFailurePolicy>().unwrap(),
            DirectoryFailurePolicy::FailClosed
        );
        assert!("maybe".parse::<DirectoryFailurePolicy>().is_err());
    }
}
