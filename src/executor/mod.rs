//! Executor contract and category-based dispatch.
//!
//! Each executor runs one test case against a target environment and returns
//! a uniform [`ExecutionResult`]. Ordinary test failures (failed assertion,
//! unreachable target) are `Ok` results with `success = false`; only internal
//! faults such as malformed case configuration surface as [`ExecutorError`],
//! and the registry converts even those into a failed result so nothing
//! escapes `execute`.

pub mod api;
pub mod assertion;
pub mod business;
pub mod ui;

use crate::model::{SuiteCategory, TestCase, TestEnvironment};
use crate::vars::VariableContext;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use api::ApiExecutor;
pub use business::BusinessExecutor;
pub use ui::UiExecutor;

/// Shared, mutex-guarded per-run variable context. Case workers may run
/// concurrently; the store itself is single-writer-at-a-time.
pub type SharedVars = Arc<Mutex<VariableContext>>;

/// Internal executor fault. Ordinary test failures never take this path.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("test case config is empty")]
    EmptyConfig,
    #[error("invalid test case config: {0}")]
    InvalidConfig(String),
    #[error("no base URL configured for {0} tests")]
    MissingBaseUrl(&'static str),
}

/// Hard dispatch error: no executor can be chosen for the suite's category
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no executor registered for suite category {0}")]
    UnknownCategory(SuiteCategory),
}

/// Uniform result of one executor invocation for one test case.
/// Immutable once returned; serialized as one element of the structured
/// raw-output `results` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ExecutionResult {
    pub fn passed(message: impl Into<String>, execution_time_ms: i64) -> Self {
        Self::base(true, message.into(), execution_time_ms)
    }

    pub fn failed(message: impl Into<String>, execution_time_ms: i64) -> Self {
        let message = message.into();
        Self {
            error_message: Some(message.clone()),
            ..Self::base(false, message, execution_time_ms)
        }
    }

    fn base(success: bool, message: String, execution_time_ms: i64) -> Self {
        Self {
            success,
            message,
            execution_time_ms,
            test_case_id: None,
            test_case_name: None,
            test_type: None,
            error_message: None,
            error_details: None,
            metadata: None,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Tag the result with the case identity and the owning suite's category
    pub fn for_case(mut self, case: &TestCase, category: SuiteCategory) -> Self {
        self.test_case_id = Some(case.id.clone());
        self.test_case_name = Some(case.name.clone());
        self.test_type = Some(category.as_str().to_string());
        self
    }
}

/// Per-case timeout/retry settings read off the case config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseOptions {
    pub timeout_ms: u64,
    pub retries: u32,
}

impl Default for CaseOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retries: 0,
        }
    }
}

impl CaseOptions {
    /// Read `timeout` / `retries` from the case config, falling back to the
    /// defaults on any missing or malformed field.
    pub fn from_config(config: &str) -> Self {
        let defaults = Self::default();
        let Ok(value) = serde_json::from_str::<Value>(config) else {
            return defaults;
        };
        Self {
            timeout_ms: value
                .get("timeout")
                .and_then(Value::as_u64)
                .unwrap_or(defaults.timeout_ms),
            retries: value
                .get("retries")
                .and_then(Value::as_u64)
                .map(|r| r as u32)
                .unwrap_or(defaults.retries),
        }
    }
}

/// Record of one attempt, retained in the final result's metadata so failed
/// earlier attempts stay visible for diagnosis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt: u32,
    pub success: bool,
    pub message: String,
    pub duration_ms: i64,
}

/// A test-type-specific runner. Implementations provide `attempt`; the
/// provided `run` wraps it with per-case timeout enforcement and retries.
#[async_trait]
pub trait Executor: Send + Sync {
    fn category(&self) -> SuiteCategory;

    /// Execute the case once, with no timeout or retry handling
    async fn attempt(
        &self,
        case: &TestCase,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<ExecutionResult, ExecutorError>;

    /// Execute the case, enforcing the declared timeout per attempt and
    /// retrying up to the declared count. The final result reflects only the
    /// last attempt; earlier attempts are kept in the result metadata.
    async fn run(
        &self,
        case: &TestCase,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<ExecutionResult, ExecutorError> {
        let options = CaseOptions::from_config(&case.config);
        let timeout = Duration::from_millis(options.timeout_ms);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for attempt in 0..=options.retries {
            let started = std::time::Instant::now();
            let outcome = match tokio::time::timeout(
                timeout,
                self.attempt(case, environment, vars),
            )
            .await
            {
                Ok(result) => result?,
                // The in-flight call is aborted when the timeout future wins
                Err(_) => ExecutionResult::failed(
                    format!("request timed out after {} ms", options.timeout_ms),
                    started.elapsed().as_millis() as i64,
                ),
            };

            attempts.push(AttemptRecord {
                attempt: attempt + 1,
                success: outcome.success,
                message: outcome.message.clone(),
                duration_ms: outcome.execution_time_ms,
            });

            if outcome.success || attempt == options.retries {
                return Ok(finalize(outcome, case, self.category(), &attempts));
            }

            log::warn!(
                "{} case '{}' attempt {}/{} failed: {}; retrying",
                self.category(),
                case.name,
                attempt + 1,
                options.retries + 1,
                outcome.message
            );
            // Increasing backoff between attempts, as short as it is
            tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
        }
        unreachable!("retry loop always returns on the last attempt")
    }
}

fn finalize(
    outcome: ExecutionResult,
    case: &TestCase,
    category: SuiteCategory,
    attempts: &[AttemptRecord],
) -> ExecutionResult {
    let mut result = outcome.for_case(case, category);
    if attempts.len() > 1 {
        result.metadata = Some(serde_json::json!({ "attempts": attempts }));
    }
    result
}

/// Static map from suite category to executor instance, built once at
/// startup. Dispatch is by the owning suite's category only; an individual
/// case carries no type of its own.
pub struct ExecutorRegistry {
    executors: HashMap<SuiteCategory, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Registry with the three built-in executors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ApiExecutor::new()));
        registry.register(Arc::new(UiExecutor::new()));
        registry.register(Arc::new(BusinessExecutor::new()));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.category(), executor);
    }

    /// Select the executor for a suite category. An unknown category is a
    /// hard configuration error surfaced to the caller.
    pub fn dispatch(&self, category: SuiteCategory) -> Result<Arc<dyn Executor>, DispatchError> {
        self.executors
            .get(&category)
            .cloned()
            .ok_or(DispatchError::UnknownCategory(category))
    }

    /// Run one case through the executor chosen by the suite's category.
    /// Internal executor faults are converted into a failed result here and
    /// never propagate past this call.
    pub async fn execute(
        &self,
        category: SuiteCategory,
        case: &TestCase,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<ExecutionResult, DispatchError> {
        let executor = self.dispatch(category)?;
        let result = match executor.run(case, environment, vars).await {
            Ok(result) => result,
            Err(err) => {
                log::error!("{} executor fault for case '{}': {}", category, case.name, err);
                ExecutionResult::failed(
                    format!("{} execution exception: {}", category, err),
                    0,
                )
                .for_case(case, category)
            }
        };
        Ok(result)
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
