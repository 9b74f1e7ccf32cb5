//! Declarative response assertions shared by the executors.
//!
//! Every declared assertion must pass for a case to be marked successful.
//! Evaluation short-circuits: the first failing assertion's description
//! becomes the result message and the remaining assertions are not evaluated,
//! so failure messages stay deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an assertion gets to look at after a call completes
#[derive(Debug, Clone)]
pub struct ResponseView {
    pub status: u16,
    pub body: String,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Assertion {
    /// HTTP status code equals `expected`
    StatusCode {
        expected: u16,
        #[serde(default)]
        description: Option<String>,
    },
    /// Value at a dot-separated path in the JSON body equals `expected`
    JsonPath {
        path: String,
        expected: Value,
        #[serde(default)]
        description: Option<String>,
    },
    /// Body contains the literal text `expected`
    BodyContains {
        expected: String,
        #[serde(default)]
        description: Option<String>,
    },
    /// Call finished within `maxMs` milliseconds
    ResponseTime {
        #[serde(rename = "maxMs")]
        max_ms: i64,
        #[serde(default)]
        description: Option<String>,
    },
}

impl Assertion {
    /// Check one assertion; `Err` carries the failure description
    pub fn check(&self, response: &ResponseView) -> Result<(), String> {
        match self {
            Assertion::StatusCode { expected, description } => {
                if response.status == *expected {
                    Ok(())
                } else {
                    Err(describe(description, || {
                        format!(
                            "status code assertion failed: expected {}, got {}",
                            expected, response.status
                        )
                    }))
                }
            }
            Assertion::JsonPath { path, expected, description } => {
                let actual = serde_json::from_str::<Value>(&response.body)
                    .ok()
                    .and_then(|root| walk(&root, path).cloned());
                match actual {
                    Some(value) if &value == expected => Ok(()),
                    Some(value) => Err(describe(description, || {
                        format!(
                            "json path assertion failed at '{}': expected {}, got {}",
                            path, expected, value
                        )
                    })),
                    None => Err(describe(description, || {
                        format!("json path assertion failed: '{}' not present", path)
                    })),
                }
            }
            Assertion::BodyContains { expected, description } => {
                if response.body.contains(expected) {
                    Ok(())
                } else {
                    Err(describe(description, || {
                        format!("body does not contain '{}'", expected)
                    }))
                }
            }
            Assertion::ResponseTime { max_ms, description } => {
                if response.elapsed_ms <= *max_ms {
                    Ok(())
                } else {
                    Err(describe(description, || {
                        format!(
                            "response time assertion failed: {} ms exceeds {} ms",
                            response.elapsed_ms, max_ms
                        )
                    }))
                }
            }
        }
    }
}

/// Evaluate assertions in declared order, stopping at the first failure
pub fn check_all(assertions: &[Assertion], response: &ResponseView) -> Result<(), String> {
    for assertion in assertions {
        assertion.check(response)?;
    }
    Ok(())
}

fn describe(description: &Option<String>, fallback: impl FnOnce() -> String) -> String {
    description.clone().unwrap_or_else(fallback)
}

fn walk<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.strip_prefix('$').unwrap_or(path);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    let mut current = root;
    for segment in trimmed.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str, elapsed_ms: i64) -> ResponseView {
        ResponseView {
            status,
            body: body.to_string(),
            elapsed_ms,
        }
    }

    #[test]
    fn status_code_assertion() {
        let a = Assertion::StatusCode {
            expected: 200,
            description: None,
        };
        assert!(a.check(&response(200, "", 1)).is_ok());
        let err = a.check(&response(500, "", 1)).unwrap_err();
        assert!(err.contains("expected 200, got 500"));
    }

    #[test]
    fn json_path_assertion() {
        let a = Assertion::JsonPath {
            path: "data.status".into(),
            expected: json!("ok"),
            description: None,
        };
        assert!(a.check(&response(200, r#"{"data":{"status":"ok"}}"#, 1)).is_ok());
        assert!(a.check(&response(200, r#"{"data":{"status":"bad"}}"#, 1)).is_err());
        assert!(a.check(&response(200, "not json", 1)).is_err());
    }

    #[test]
    fn first_failure_short_circuits() {
        let assertions = vec![
            Assertion::StatusCode {
                expected: 200,
                description: Some("first".into()),
            },
            Assertion::BodyContains {
                expected: "hello".into(),
                description: Some("second".into()),
            },
        ];
        // Both would fail; the first one's description wins
        let err = check_all(&assertions, &response(500, "", 1)).unwrap_err();
        assert_eq!(err, "first");
    }

    #[test]
    fn empty_assertion_list_passes() {
        assert!(check_all(&[], &response(500, "", 1)).is_ok());
    }

    #[test]
    fn response_time_ceiling() {
        let a = Assertion::ResponseTime {
            max_ms: 100,
            description: None,
        };
        assert!(a.check(&response(200, "", 100)).is_ok());
        assert!(a.check(&response(200, "", 101)).is_err());
    }

    #[test]
    fn assertions_deserialize_from_case_config() {
        let parsed: Vec<Assertion> = serde_json::from_str(
            r#"[
                {"type":"statusCode","expected":201},
                {"type":"jsonPath","path":"$.id","expected":7},
                {"type":"bodyContains","expected":"created"},
                {"type":"responseTime","maxMs":2000}
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 4);
    }
}
