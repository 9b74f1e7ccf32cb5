//! Business-flow executor: a composite sequence of API steps sharing one
//! variable context, run sequentially or in parallel per the case config.
//! Sequential flows stop at the first failed step; parallel flows wait for
//! every step and report the first failure in declared order.

use super::api::{body_text, parse_method, resolve_url};
use super::assertion::{check_all, Assertion, ResponseView};
use super::{ExecutionResult, Executor, ExecutorError, SharedVars};
use crate::model::{SuiteCategory, TestCase, TestEnvironment};
use crate::vars::Extractor;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessCaseConfig {
    /// Seed process variables, rendered before the flow starts
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub steps: Vec<BusinessStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessStep {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
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

impl BusinessStep {
    fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("step {}", index + 1))
    }
}

pub struct BusinessExecutor {
    client: reqwest::Client,
}

impl BusinessExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for BusinessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for BusinessExecutor {
    fn category(&self) -> SuiteCategory {
        SuiteCategory::Business
    }

    async fn attempt(
        &self,
        case: &TestCase,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<ExecutionResult, ExecutorError> {
        let started = Instant::now();
        let config = parse_config(&case.config)?;

        // Seed process variables, rendering references to earlier runs'
        // session/global values
        {
            let mut ctx = vars.lock().unwrap();
            for (name, raw) in &config.variables {
                let rendered = ctx.render(raw);
                ctx.set_local(name, Value::String(rendered));
            }
        }

        let failure = if config.parallel {
            self.run_parallel(&config.steps, environment, vars).await
        } else {
            self.run_sequential(&config.steps, environment, vars).await
        };

        let elapsed_ms = started.elapsed().as_millis() as i64;
        match failure {
            None => Ok(ExecutionResult::passed(
                "business flow passed",
                elapsed_ms,
            )),
            Some(message) => {
                log::warn!("business case '{}': {}", case.name, message);
                Ok(ExecutionResult::failed(message, elapsed_ms))
            }
        }
    }
}

impl BusinessExecutor {
    async fn run_sequential(
        &self,
        steps: &[BusinessStep],
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Option<String> {
        for (index, step) in steps.iter().enumerate() {
            if let Err(message) = self.run_step(step, environment, vars).await {
                return Some(format!("step '{}' failed: {}", step.label(index), message));
            }
        }
        None
    }

    async fn run_parallel(
        &self,
        steps: &[BusinessStep],
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Option<String> {
        let outcomes = futures::future::join_all(
            steps
                .iter()
                .map(|step| self.run_step(step, environment, vars)),
        )
        .await;
        outcomes
            .into_iter()
            .enumerate()
            .find_map(|(index, outcome)| {
                outcome
                    .err()
                    .map(|message| format!("step '{}' failed: {}", steps[index].label(index), message))
            })
    }

    /// Run one step: render, call, extract, assert. `Err` carries the
    /// failure description.
    async fn run_step(
        &self,
        step: &BusinessStep,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<(), String> {
        let started = Instant::now();

        let (url, headers, body) = {
            let ctx = vars.lock().unwrap();
            let url = ctx.render(&step.url);
            let headers: Vec<(String, String)> = step
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), ctx.render(v)))
                .collect();
            let body = step.body.as_ref().map(|b| ctx.render(&body_text(b)));
            (url, headers, body)
        };

        let full_url = resolve_url(environment.api_base_url.as_deref(), &url)
            .map_err(|err| err.to_string())?;
        let method = parse_method(&step.method);
        log::info!("business step request: {} {}", method, full_url);

        let mut request = self.client.request(method, &full_url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| format!("request failed: {}", err))?;
        let status = response.status().as_u16();
        let response_body = response
            .text()
            .await
            .map_err(|err| format!("failed to read response body: {}", err))?;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        if !step.extractors.is_empty() {
            vars.lock().unwrap().extract(&response_body, &step.extractors);
        }

        check_all(
            &step.assertions,
            &ResponseView {
                status,
                body: response_body,
                elapsed_ms,
            },
        )
    }
}

fn parse_config(config: &str) -> Result<BusinessCaseConfig, ExecutorError> {
    if config.trim().is_empty() {
        return Err(ExecutorError::EmptyConfig);
    }
    serde_json::from_str(config).map_err(|err| ExecutorError::InvalidConfig(err.to_string()))
}
