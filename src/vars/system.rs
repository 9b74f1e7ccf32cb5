//! System variables, computed fresh on every read and never stored.

use chrono::Local;
use rand::Rng;
use serde_json::Value;

/// Resolve one of the fixed system variable names. Returns `None` for
/// anything outside the enumerated table.
pub fn lookup(name: &str) -> Option<Value> {
    match name.to_lowercase().as_str() {
        "timestamp" | "datetime" => {
            Some(Value::String(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()))
        }
        "date" => Some(Value::String(Local::now().format("%Y-%m-%d").to_string())),
        "time" => Some(Value::String(Local::now().format("%H:%M:%S").to_string())),
        "unix_timestamp" => Some(Value::from(Local::now().timestamp())),
        "random_int" => Some(Value::from(rand::thread_rng().gen_range(0..10_000))),
        "random_string" => {
            let suffix: String = rand::thread_rng()
                .sample_iter(rand::distributions::Alphanumeric)
                .take(8)
                .map(char::from)
                .collect();
            Some(Value::String(format!("random_{}", suffix)))
        }
        "uuid" => Some(Value::String(uuid::Uuid::new_v4().to_string())),
        _ => None,
    }
}
