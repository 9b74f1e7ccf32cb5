//! Suite runner: dispatches every case of a suite through the executor
//! registry, collects results into a stable structured raw output and
//! produces the run record.
//!
//! Cases may run sequentially or concurrently; the contract only requires
//! that the raw output is complete and stable once all cases have finished.
//! A case-level failure never aborts sibling cases; only an unknown suite
//! category fails the whole dispatch.

pub mod events;

pub use events::{EventEmitter, TestEvent};

use crate::executor::{ExecutionResult, ExecutorRegistry, SharedVars};
use crate::model::{RunRecord, RunStatus, TestCase, TestEnvironment, TestSuite};
use crate::store::GlobalVariableStore;
use crate::vars::VariableContext;
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Execute cases concurrently instead of in declared order
    pub parallel: bool,
}

/// Execute every case of a suite and return the completed run record.
///
/// New raw output is always written in the structured format; the legacy
/// free-text format stays read-compatible in the aggregator only.
pub async fn run_suite(
    suite: &TestSuite,
    cases: &[TestCase],
    environment: &TestEnvironment,
    seed_vars: HashMap<String, Value>,
    globals: Arc<dyn GlobalVariableStore>,
    registry: &ExecutorRegistry,
    options: RunOptions,
    events: &EventEmitter,
) -> Result<RunRecord> {
    // Unknown category is a hard configuration error; fail before any case
    // is started
    registry.dispatch(suite.category)?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let started = Utc::now();
    let clock = std::time::Instant::now();

    // One variable context per run, single-writer-at-a-time even when case
    // workers run in parallel
    let vars: SharedVars = {
        let mut ctx = VariableContext::new(globals);
        ctx.set_environment(&environment.id);
        ctx.set_vars(&seed_vars);
        Arc::new(Mutex::new(ctx))
    };

    events.emit(TestEvent::RunStarted {
        run_id: run_id.clone(),
        suite_name: suite.name.clone(),
        case_count: cases.len(),
    });
    log::info!(
        "run {} started: suite '{}' ({} cases, {})",
        run_id,
        suite.name,
        cases.len(),
        if options.parallel { "parallel" } else { "sequential" }
    );

    let results: Vec<ExecutionResult> = if options.parallel {
        futures::future::join_all(cases.iter().enumerate().map(|(index, case)| {
            run_case(&run_id, index, case, suite, environment, &vars, registry, events)
        }))
        .await
        .into_iter()
        .collect::<Result<_>>()?
    } else {
        let mut results = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            results.push(
                run_case(&run_id, index, case, suite, environment, &vars, registry, events)
                    .await?,
            );
        }
        results
    };

    let passed = results.iter().filter(|r| r.success).count() as u32;
    let failed = results.len() as u32 - passed;
    let status = if failed == 0 {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };

    let raw_output = serde_json::to_string(&serde_json::json!({ "results": results }))?;
    let record = RunRecord {
        id: run_id.clone(),
        suite_id: suite.id.clone(),
        suite_name: Some(suite.name.clone()),
        environment_id: Some(environment.id.clone()),
        status,
        start_time: Some(started),
        end_time: Some(Utc::now()),
        raw_output: Some(raw_output),
    };

    events.emit(TestEvent::RunFinished {
        run_id,
        status,
        passed,
        failed,
        duration_ms: clock.elapsed().as_millis() as u64,
    });
    log::info!(
        "run {} finished: {:?}, {} passed, {} failed",
        record.id,
        status,
        passed,
        failed
    );

    Ok(record)
}

#[allow(clippy::too_many_arguments)]
async fn run_case(
    run_id: &str,
    index: usize,
    case: &TestCase,
    suite: &TestSuite,
    environment: &TestEnvironment,
    vars: &SharedVars,
    registry: &ExecutorRegistry,
    events: &EventEmitter,
) -> Result<ExecutionResult> {
    events.emit(TestEvent::CaseStarted {
        run_id: run_id.to_string(),
        index,
        case_name: case.name.clone(),
    });

    let result = registry
        .execute(suite.category, case, environment, vars)
        .await?;

    events.emit(TestEvent::CaseFinished {
        run_id: run_id.to_string(),
        index,
        case_name: case.name.clone(),
        success: result.success,
        duration_ms: result.execution_time_ms,
        message: result.message.clone(),
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Executor, ExecutorError};
    use crate::model::SuiteCategory;
    use crate::report;
    use crate::store::MemGlobalVariableStore;
    use async_trait::async_trait;

    /// Passes or fails depending on the case config, no I/O involved
    struct ScriptedExecutor;

    #[async_trait]
    impl Executor for ScriptedExecutor {
        fn category(&self) -> SuiteCategory {
            SuiteCategory::Api
        }

        async fn attempt(
            &self,
            case: &TestCase,
            _environment: &TestEnvironment,
            vars: &SharedVars,
        ) -> Result<ExecutionResult, ExecutorError> {
            // Exercise the shared context the way a real executor would
            let rendered = vars.lock().unwrap().render(&case.config);
            if rendered.contains("fail") {
                Ok(ExecutionResult::failed("scripted failure", 20))
            } else {
                Ok(ExecutionResult::passed(rendered, 10))
            }
        }
    }

    fn fixture(configs: &[&str]) -> (TestSuite, Vec<TestCase>, TestEnvironment) {
        let suite = TestSuite {
            id: "suite-1".into(),
            name: "checkout".into(),
            description: None,
            category: SuiteCategory::Api,
            case_ids: Vec::new(),
        };
        let cases = configs
            .iter()
            .enumerate()
            .map(|(i, config)| TestCase {
                id: format!("case-{i}"),
                suite_id: suite.id.clone(),
                name: format!("case {i}"),
                description: None,
                config: (*config).to_string(),
            })
            .collect();
        let environment = TestEnvironment {
            id: "env-001".into(),
            name: "test".into(),
            ..Default::default()
        };
        (suite, cases, environment)
    }

    fn registry() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(ScriptedExecutor));
        registry
    }

    #[tokio::test]
    async fn run_produces_structured_raw_output() {
        let (suite, cases, environment) = fixture(&["ok one", "this will fail"]);
        let record = run_suite(
            &suite,
            &cases,
            &environment,
            HashMap::new(),
            Arc::new(MemGlobalVariableStore::new()),
            &registry(),
            RunOptions::default(),
            &EventEmitter::new(),
        )
        .await
        .unwrap();

        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.start_time.is_some() && record.end_time.is_some());

        // The raw output round-trips through the aggregator
        let parsed = report::generate_report(&record);
        assert_eq!(parsed.summary.total_tests, 2);
        assert_eq!(parsed.summary.passed_tests, 1);
        assert_eq!(parsed.summary.failed_tests, 1);
        assert_eq!(parsed.details[1].test_case_name, "case 1");
    }

    #[tokio::test]
    async fn case_failure_does_not_abort_siblings() {
        let (suite, cases, environment) = fixture(&["fail", "ok", "ok"]);
        let record = run_suite(
            &suite,
            &cases,
            &environment,
            HashMap::new(),
            Arc::new(MemGlobalVariableStore::new()),
            &registry(),
            RunOptions { parallel: true },
            &EventEmitter::new(),
        )
        .await
        .unwrap();

        let parsed = report::generate_report(&record);
        assert_eq!(parsed.summary.total_tests, 3);
        assert_eq!(parsed.summary.passed_tests, 2);
    }

    #[tokio::test]
    async fn seed_variables_reach_the_executors() {
        let (suite, cases, environment) = fixture(&["user=${user}"]);
        let mut seed = HashMap::new();
        seed.insert("user".to_string(), Value::String("alice".into()));

        let record = run_suite(
            &suite,
            &cases,
            &environment,
            seed,
            Arc::new(MemGlobalVariableStore::new()),
            &registry(),
            RunOptions::default(),
            &EventEmitter::new(),
        )
        .await
        .unwrap();

        let parsed = report::generate_report(&record);
        assert_eq!(parsed.details[0].message.as_deref(), Some("user=alice"));
    }

    #[tokio::test]
    async fn unknown_category_fails_the_whole_dispatch() {
        let (mut suite, cases, environment) = fixture(&["ok"]);
        suite.category = SuiteCategory::Ui;

        let err = run_suite(
            &suite,
            &cases,
            &environment,
            HashMap::new(),
            Arc::new(MemGlobalVariableStore::new()),
            &registry(),
            RunOptions::default(),
            &EventEmitter::new(),
        )
        .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn events_trace_the_run() {
        let (suite, cases, environment) = fixture(&["ok", "fail"]);
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        run_suite(
            &suite,
            &cases,
            &environment,
            HashMap::new(),
            Arc::new(MemGlobalVariableStore::new()),
            &registry(),
            RunOptions::default(),
            &emitter,
        )
        .await
        .unwrap();

        let mut started = 0;
        let mut case_finished = 0;
        let mut run_finished = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                TestEvent::CaseStarted { .. } => started += 1,
                TestEvent::CaseFinished { .. } => case_finished += 1,
                TestEvent::RunFinished { passed, failed, .. } => {
                    run_finished += 1;
                    assert_eq!(passed, 1);
                    assert_eq!(failed, 1);
                }
                TestEvent::RunStarted { .. } => {}
            }
        }
        assert_eq!(started, 2);
        assert_eq!(case_finished, 2);
        assert_eq!(run_finished, 1);
    }
}
