//! API test executor: renders an HTTP request template, issues the call,
//! feeds the response through the declared extractors and assertions.

use super::assertion::{check_all, Assertion, ResponseView};
use super::{ExecutionResult, Executor, ExecutorError, SharedVars};
use crate::model::{SuiteCategory, TestCase, TestEnvironment};
use crate::vars::Extractor;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Request template carried in an API case's config
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCaseConfig {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub extractors: Vec<Extractor>,
}

fn default_method() -> String {
    "GET".to_string()
}

pub struct ApiExecutor {
    client: reqwest::Client,
}

impl ApiExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ApiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ApiExecutor {
    fn category(&self) -> SuiteCategory {
        SuiteCategory::Api
    }

    async fn attempt(
        &self,
        case: &TestCase,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<ExecutionResult, ExecutorError> {
        let started = Instant::now();
        let config = parse_config(&case.config)?;

        // Render request fields through the variable context, then release
        // the lock before any await point
        let (url, headers, body) = {
            let ctx = vars.lock().unwrap();
            let url = ctx.render(&config.url);
            let headers: Vec<(String, String)> = config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), ctx.render(v)))
                .collect();
            let body = config.body.as_ref().map(|b| ctx.render(&body_text(b)));
            (url, headers, body)
        };

        let full_url = resolve_url(environment.api_base_url.as_deref(), &url)?;
        let method = parse_method(&config.method);

        log::info!("API request: {} {}", method, full_url);
        let mut request = self.client.request(method, &full_url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        // An unreachable target is an ordinary test failure, not a fault
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return Ok(ExecutionResult::failed(
                    format!("request failed: {}", err),
                    started.elapsed().as_millis() as i64,
                ))
            }
        };

        let status = response.status().as_u16();
        let response_body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                return Ok(ExecutionResult::failed(
                    format!("failed to read response body: {}", err),
                    started.elapsed().as_millis() as i64,
                ))
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        if !config.extractors.is_empty() {
            vars.lock().unwrap().extract(&response_body, &config.extractors);
        }

        let view = ResponseView {
            status,
            body: response_body,
            elapsed_ms,
        };
        match check_all(&config.assertions, &view) {
            Ok(()) => Ok(ExecutionResult::passed("API test passed", elapsed_ms)),
            Err(description) => Ok(ExecutionResult::failed(description, elapsed_ms)),
        }
    }
}

pub(super) fn parse_config(config: &str) -> Result<ApiCaseConfig, ExecutorError> {
    if config.trim().is_empty() {
        return Err(ExecutorError::EmptyConfig);
    }
    serde_json::from_str(config).map_err(|err| ExecutorError::InvalidConfig(err.to_string()))
}

/// Join a path onto the environment's API base URL. Absolute URLs in the
/// template are used as-is.
pub(super) fn resolve_url(base: Option<&str>, path: &str) -> Result<String, ExecutorError> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(path.to_string());
    }
    let base = base.filter(|b| !b.is_empty()).ok_or(ExecutorError::MissingBaseUrl("API"))?;
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

pub(super) fn parse_method(method: &str) -> Method {
    match method.to_uppercase().as_str() {
        "GET" => Method::GET,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "DELETE" => Method::DELETE,
        "PATCH" => Method::PATCH,
        "HEAD" => Method::HEAD,
        "OPTIONS" => Method::OPTIONS,
        other => {
            log::warn!("unknown HTTP method '{}', defaulting to GET", other);
            Method::GET
        }
    }
}

/// Template text for a request body: strings are used raw so placeholders
/// render naturally, JSON bodies are serialized first
pub(super) fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemGlobalVariableStore;
    use crate::vars::VariableContext;
    use std::sync::{Arc, Mutex};

    #[test]
    fn empty_config_is_an_internal_fault() {
        assert!(matches!(parse_config("  "), Err(ExecutorError::EmptyConfig)));
        assert!(matches!(
            parse_config("{broken"),
            Err(ExecutorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_defaults_method_to_get() {
        let config = parse_config(r#"{"url": "/health"}"#).unwrap();
        assert_eq!(config.method, "GET");
        assert!(config.assertions.is_empty());
        assert!(config.extractors.is_empty());
    }

    #[test]
    fn url_resolution_joins_base_and_path() {
        assert_eq!(
            resolve_url(Some("http://api.local/"), "/users").unwrap(),
            "http://api.local/users"
        );
        assert_eq!(
            resolve_url(Some("http://api.local"), "users").unwrap(),
            "http://api.local/users"
        );
        // Absolute template URLs bypass the base
        assert_eq!(
            resolve_url(None, "https://other.local/x").unwrap(),
            "https://other.local/x"
        );
        assert!(matches!(
            resolve_url(None, "/users"),
            Err(ExecutorError::MissingBaseUrl("API"))
        ));
    }

    #[test]
    fn unknown_method_falls_back_to_get() {
        assert_eq!(parse_method("post"), Method::POST);
        assert_eq!(parse_method("TELEPORT"), Method::GET);
    }

    #[tokio::test]
    async fn unreachable_target_is_an_ordinary_failure() {
        let executor = ApiExecutor::new();
        let case = TestCase {
            id: "c".into(),
            suite_id: "s".into(),
            name: "unreachable".into(),
            description: None,
            // Reserved TEST-NET address; the connection attempt fails fast
            config: r#"{"url": "http://192.0.2.1:9/health", "timeout": 1500}"#.into(),
        };
        let environment = TestEnvironment::default();
        let vars = Arc::new(Mutex::new(VariableContext::new(Arc::new(
            MemGlobalVariableStore::new(),
        ))));

        // run() so the per-case timeout bounds the connection attempt
        let result = executor.run(&case, &environment, &vars).await.unwrap();
        assert!(!result.success);
        assert!(result.message.starts_with("request failed") || result.message.contains("timed out"));
    }
}
