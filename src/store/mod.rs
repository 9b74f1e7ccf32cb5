//! Key-addressed store interfaces for the entities the engine consumes.
//!
//! Persistence itself is an external collaborator; the engine only needs
//! lookup and listing. The `Mem*` implementations back the CLI and tests.

use crate::model::{GlobalVariable, RunRecord, RunStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate variable '{name}' in environment '{environment_id}'")]
    DuplicateVariable { name: String, environment_id: String },
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Accessor for persisted global variables, unique by (name, environment id)
pub trait GlobalVariableStore: Send + Sync {
    fn find_by_name(&self, name: &str, environment_id: &str) -> Option<GlobalVariable>;
    fn list_by_environment(&self, environment_id: &str) -> Vec<GlobalVariable>;
    fn save(&self, variable: GlobalVariable) -> Result<GlobalVariable, StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Accessor for recorded suite runs
pub trait RunStore: Send + Sync {
    fn get(&self, id: &str) -> Option<RunRecord>;
    fn list_by_suite(&self, suite_id: &str) -> Vec<RunRecord>;
    fn list_by_status(&self, status: RunStatus) -> Vec<RunRecord>;
    fn save(&self, run: RunRecord);
}

/// In-memory global variable store
#[derive(Default)]
pub struct MemGlobalVariableStore {
    variables: RwLock<Vec<GlobalVariable>>,
}

impl MemGlobalVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience seeding used by the CLI and tests
    pub fn seed(&self, name: &str, value: serde_json::Value, environment_id: &str) {
        let now = Utc::now();
        let _ = self.save(GlobalVariable {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            value,
            environment_id: environment_id.to_string(),
            encrypted: false,
            description: None,
            created_at: now,
            updated_at: now,
        });
    }
}

impl GlobalVariableStore for MemGlobalVariableStore {
    fn find_by_name(&self, name: &str, environment_id: &str) -> Option<GlobalVariable> {
        self.variables
            .read()
            .unwrap()
            .iter()
            .find(|v| v.name == name && v.environment_id == environment_id)
            .cloned()
    }

    fn list_by_environment(&self, environment_id: &str) -> Vec<GlobalVariable> {
        self.variables
            .read()
            .unwrap()
            .iter()
            .filter(|v| v.environment_id == environment_id)
            .cloned()
            .collect()
    }

    fn save(&self, variable: GlobalVariable) -> Result<GlobalVariable, StoreError> {
        let mut vars = self.variables.write().unwrap();
        if let Some(existing) = vars
            .iter_mut()
            .find(|v| v.name == variable.name && v.environment_id == variable.environment_id)
        {
            // Same id updates in place; a different id is a uniqueness violation
            if existing.id != variable.id {
                return Err(StoreError::DuplicateVariable {
                    name: variable.name,
                    environment_id: variable.environment_id,
                });
            }
            existing.value = variable.value.clone();
            existing.encrypted = variable.encrypted;
            existing.description = variable.description.clone();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        vars.push(variable.clone());
        Ok(variable)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut vars = self.variables.write().unwrap();
        let before = vars.len();
        vars.retain(|v| v.id != id);
        if vars.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// In-memory run record store
#[derive(Default)]
pub struct MemRunStore {
    runs: RwLock<HashMap<String, RunRecord>>,
}

impl MemRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemRunStore {
    fn get(&self, id: &str) -> Option<RunRecord> {
        self.runs.read().unwrap().get(id).cloned()
    }

    fn list_by_suite(&self, suite_id: &str) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = self
            .runs
            .read()
            .unwrap()
            .values()
            .filter(|r| r.suite_id == suite_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.start_time);
        runs
    }

    fn list_by_status(&self, status: RunStatus) -> Vec<RunRecord> {
        self.runs
            .read()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    fn save(&self, run: RunRecord) {
        self.runs.write().unwrap().insert(run.id.clone(), run);
    }
}
