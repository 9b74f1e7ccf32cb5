//! UI test executor: drives a page-step sequence against the environment's
//! UI base URL. Steps share the run's variable context for templating, and
//! the first failing step decides the result message.

use super::api::resolve_url;
use super::{ExecutionResult, Executor, ExecutorError, SharedVars};
use crate::model::{SuiteCategory, TestCase, TestEnvironment};
use crate::vars::Extractor;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiCaseConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<UiStep>,
    /// Run against the last loaded page body once all steps pass
    #[serde(default)]
    pub extractors: Vec<Extractor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiStep {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub action: UiAction,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UiAction {
    /// Load a page; later assertions run against it
    Navigate { path: String },
    /// Last page responded with this status code
    AssertStatus { expected: u16 },
    /// Last page body contains this text
    AssertText { expected: String },
    /// Pause between steps
    Wait { ms: u64 },
}

impl UiStep {
    fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("step {}", index + 1))
    }
}

/// Last loaded page, carried across steps
struct PageState {
    status: u16,
    body: String,
}

pub struct UiExecutor {
    client: reqwest::Client,
}

impl UiExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for UiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for UiExecutor {
    fn category(&self) -> SuiteCategory {
        SuiteCategory::Ui
    }

    async fn attempt(
        &self,
        case: &TestCase,
        environment: &TestEnvironment,
        vars: &SharedVars,
    ) -> Result<ExecutionResult, ExecutorError> {
        let started = Instant::now();
        let config = parse_config(&case.config)?;

        let base_url = {
            let ctx = vars.lock().unwrap();
            config
                .base_url
                .as_ref()
                .map(|raw| ctx.render(raw))
                .filter(|b| !b.is_empty())
                .or_else(|| environment.ui_base_url.clone())
                .ok_or(ExecutorError::MissingBaseUrl("UI"))?
        };

        let mut page: Option<PageState> = None;

        for (index, step) in config.steps.iter().enumerate() {
            if let Err(message) = self.run_step(step, &base_url, vars, &mut page).await {
                let failure = format!("step '{}' failed: {}", step.label(index), message);
                log::warn!("UI case '{}': {}", case.name, failure);
                return Ok(ExecutionResult::failed(
                    failure,
                    started.elapsed().as_millis() as i64,
                ));
            }
        }

        if !config.extractors.is_empty() {
            if let Some(page) = &page {
                vars.lock().unwrap().extract(&page.body, &config.extractors);
            }
        }

        Ok(ExecutionResult::passed(
            "UI test passed",
            started.elapsed().as_millis() as i64,
        ))
    }
}

impl UiExecutor {
    async fn run_step(
        &self,
        step: &UiStep,
        base_url: &str,
        vars: &SharedVars,
        page: &mut Option<PageState>,
    ) -> Result<(), String> {
        match &step.action {
            UiAction::Navigate { path } => {
                let rendered = vars.lock().unwrap().render(path);
                let url = resolve_url(Some(base_url), &rendered)
                    .map_err(|err| err.to_string())?;
                log::info!("UI navigate: {}", url);
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|err| format!("navigation to {} failed: {}", url, err))?;
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .map_err(|err| format!("failed to read page: {}", err))?;
                *page = Some(PageState { status, body });
                Ok(())
            }
            UiAction::AssertStatus { expected } => match page {
                Some(page) if page.status == *expected => Ok(()),
                Some(page) => Err(format!(
                    "expected status {}, got {}",
                    expected, page.status
                )),
                None => Err("no page loaded before assertion".to_string()),
            },
            UiAction::AssertText { expected } => {
                let expected = vars.lock().unwrap().render(expected);
                match page {
                    Some(page) if page.body.contains(&expected) => Ok(()),
                    Some(_) => Err(format!("page does not contain '{}'", expected)),
                    None => Err("no page loaded before assertion".to_string()),
                }
            }
            UiAction::Wait { ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
                Ok(())
            }
        }
    }
}

fn parse_config(config: &str) -> Result<UiCaseConfig, ExecutorError> {
    if config.trim().is_empty() {
        return Err(ExecutorError::EmptyConfig);
    }
    serde_json::from_str(config).map_err(|err| ExecutorError::InvalidConfig(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemGlobalVariableStore;
    use crate::vars::VariableContext;
    use std::sync::{Arc, Mutex};

    fn shared_vars() -> SharedVars {
        Arc::new(Mutex::new(VariableContext::new(Arc::new(
            MemGlobalVariableStore::new(),
        ))))
    }

    #[test]
    fn steps_deserialize_from_case_config() {
        let config: UiCaseConfig = serde_json::from_str(
            r#"{
                "steps": [
                    {"name": "open login", "action": "navigate", "path": "/login"},
                    {"action": "assertStatus", "expected": 200},
                    {"action": "assertText", "expected": "Sign in"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.steps.len(), 3);
        assert!(matches!(config.steps[0].action, UiAction::Navigate { .. }));
        assert_eq!(config.steps[0].label(0), "open login");
        assert_eq!(config.steps[1].label(1), "step 2");
    }

    #[tokio::test]
    async fn missing_base_url_is_an_internal_fault() {
        let executor = UiExecutor::new();
        let case = TestCase {
            id: "c".into(),
            suite_id: "s".into(),
            name: "ui".into(),
            description: None,
            config: r#"{"steps": []}"#.into(),
        };
        let err = executor
            .attempt(&case, &TestEnvironment::default(), &shared_vars())
            .await;
        assert!(matches!(err, Err(ExecutorError::MissingBaseUrl("UI"))));
    }

    #[tokio::test]
    async fn assertion_before_navigation_fails_the_step() {
        let executor = UiExecutor::new();
        let case = TestCase {
            id: "c".into(),
            suite_id: "s".into(),
            name: "ui".into(),
            description: None,
            config: r#"{
                "baseUrl": "http://ui.local",
                "steps": [{"action": "assertStatus", "expected": 200}]
            }"#
            .into(),
        };
        let result = executor
            .attempt(&case, &TestEnvironment::default(), &shared_vars())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("no page loaded"));
    }
}
