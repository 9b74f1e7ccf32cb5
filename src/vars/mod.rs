//! Layered variable resolution for request templating.
//!
//! Resolution precedence is Local > Session > Global > System, first match
//! wins. Local and session variables live only for the duration of a run
//! context; globals are persisted per environment; system variables are
//! computed fresh on every read.

pub mod extract;
pub mod system;

use crate::store::GlobalVariableStore;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub use extract::Extractor;

/// Which scopes a `clear` call empties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Local,
    Session,
    All,
}

/// Default environment used when a run does not pick one explicitly
pub const DEFAULT_ENVIRONMENT_ID: &str = "env-001";

// Ordinary placeholders: ${name}, where name may contain dotted segments.
// System placeholders: ${__name}, the `__` prefix stripped before lookup.
fn ordinary_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+(?:\.\w+)*)\}").unwrap())
}

fn system_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{__([^}]+)\}").unwrap())
}

/// Per-run variable context owning the local and session maps plus a handle
/// to the persisted-global accessor.
///
/// The context is passed explicitly into render/extract calls; the runner
/// wraps it in a mutex when case workers run concurrently.
pub struct VariableContext {
    locals: HashMap<String, Value>,
    session: HashMap<String, Value>,
    environment_id: String,
    globals: Arc<dyn GlobalVariableStore>,
}

impl VariableContext {
    pub fn new(globals: Arc<dyn GlobalVariableStore>) -> Self {
        Self {
            locals: HashMap::new(),
            session: HashMap::new(),
            environment_id: DEFAULT_ENVIRONMENT_ID.to_string(),
            globals,
        }
    }

    /// Switch the environment used for global lookups
    pub fn set_environment(&mut self, environment_id: &str) {
        log::info!("variable context now targets environment {}", environment_id);
        self.environment_id = environment_id.to_string();
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    /// Set a run-scoped variable. Redefinition overwrites silently.
    pub fn set_local(&mut self, name: &str, value: Value) {
        log::debug!("set local variable {} = {}", name, value);
        self.locals.insert(name.to_string(), value);
    }

    /// Set a session-scoped variable. Redefinition overwrites silently.
    pub fn set_session(&mut self, name: &str, value: Value) {
        log::debug!("set session variable {} = {}", name, value);
        self.session.insert(name.to_string(), value);
    }

    /// Seed several local variables at once
    pub fn set_vars(&mut self, vars: &HashMap<String, Value>) {
        for (name, value) in vars {
            self.set_local(name, value.clone());
        }
    }

    /// Resolve a name through the precedence chain
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.locals.get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.session.get(name) {
            return Some(value.clone());
        }
        if let Some(global) = self.globals.find_by_name(name, &self.environment_id) {
            return Some(global.value);
        }
        system::lookup(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a name from the local and session maps
    pub fn remove(&mut self, name: &str) -> bool {
        let from_local = self.locals.remove(name).is_some();
        let from_session = self.session.remove(name).is_some();
        from_local || from_session
    }

    /// Substitute placeholders in `text`.
    ///
    /// Ordinary `${name}` placeholders are resolved first, then system
    /// `${__name}` placeholders, each in a single left-to-right pass. A name
    /// that resolves to nothing is left as the literal placeholder text and
    /// logged as a resolution miss.
    pub fn render(&self, text: &str) -> String {
        if text.is_empty() {
            return text.to_string();
        }

        let pass_one = ordinary_pattern().replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            // System syntax also matches the ordinary pattern; leave it for
            // the second pass without counting a miss.
            if name.starts_with("__") {
                return caps[0].to_string();
            }
            match self.get(name) {
                Some(value) => value_to_string(&value),
                None => {
                    log::warn!("variable not found: {}", name);
                    caps[0].to_string()
                }
            }
        });

        system_pattern()
            .replace_all(&pass_one, |caps: &regex::Captures| {
                let name = &caps[1];
                match system::lookup(name) {
                    Some(value) => value_to_string(&value),
                    None => {
                        log::warn!("system variable not found: {}", name);
                        caps[0].to_string()
                    }
                }
            })
            .to_string()
    }

    /// Run the declared extractors against a response body, storing each
    /// extracted value as a local variable. See [`extract`].
    pub fn extract(&mut self, response_body: &str, extractors: &[Extractor]) {
        extract::extract_into(self, response_body, extractors);
    }

    pub fn clear(&mut self, scope: ClearScope) {
        match scope {
            ClearScope::Local => self.locals.clear(),
            ClearScope::Session => self.session.clear(),
            ClearScope::All => {
                self.locals.clear();
                self.session.clear();
            }
        }
        log::debug!("cleared variable scope {:?}", scope);
    }

    /// Snapshot of the local map, for diagnostics
    pub fn locals_snapshot(&self) -> HashMap<String, Value> {
        self.locals.clone()
    }

    /// Snapshot of the session map, for diagnostics
    pub fn session_snapshot(&self) -> HashMap<String, Value> {
        self.session.clone()
    }
}

/// String form used when a value is spliced into a template
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemGlobalVariableStore;
    use serde_json::json;

    fn context() -> (Arc<MemGlobalVariableStore>, VariableContext) {
        let store = Arc::new(MemGlobalVariableStore::new());
        let ctx = VariableContext::new(store.clone());
        (store, ctx)
    }

    #[test]
    fn local_wins_over_session_and_global() {
        let (store, mut ctx) = context();
        store.seed("user", json!("global-user"), DEFAULT_ENVIRONMENT_ID);
        assert_eq!(ctx.get("user"), Some(json!("global-user")));

        ctx.set_session("user", json!("session-user"));
        assert_eq!(ctx.get("user"), Some(json!("session-user")));

        ctx.set_local("user", json!("local-user"));
        assert_eq!(ctx.get("user"), Some(json!("local-user")));
    }

    #[test]
    fn global_lookup_follows_active_environment() {
        let (store, mut ctx) = context();
        store.seed("host", json!("staging.example.com"), DEFAULT_ENVIRONMENT_ID);
        store.seed("host", json!("prod.example.com"), "env-prod");

        assert_eq!(ctx.get("host"), Some(json!("staging.example.com")));
        ctx.set_environment("env-prod");
        assert_eq!(ctx.get("host"), Some(json!("prod.example.com")));
    }

    #[test]
    fn redefinition_overwrites_without_error() {
        let (_, mut ctx) = context();
        ctx.set_local("n", json!(1));
        ctx.set_local("n", json!(2));
        assert_eq!(ctx.get("n"), Some(json!(2)));
    }

    #[test]
    fn render_substitutes_resolved_names() {
        let (_, mut ctx) = context();
        ctx.set_local("id", json!(42));
        ctx.set_local("name", json!("alice"));
        assert_eq!(ctx.render("/users/${id}?name=${name}"), "/users/42?name=alice");
    }

    #[test]
    fn render_leaves_unresolved_placeholders_verbatim() {
        let (_, ctx) = context();
        let text = "value is ${missing} end";
        let once = ctx.render(text);
        assert_eq!(once, text);
        // Idempotent on unresolved names
        assert_eq!(ctx.render(&once), once);
    }

    #[test]
    fn render_supports_dotted_names() {
        let (_, mut ctx) = context();
        ctx.set_local("user.id", json!("u-7"));
        assert_eq!(ctx.render("${user.id}"), "u-7");
    }

    #[test]
    fn render_resolves_system_placeholders() {
        let (_, ctx) = context();
        let out = ctx.render("id=${__uuid}");
        assert!(out.starts_with("id="));
        assert!(!out.contains("${__uuid}"));
        // UUID v4 textual form
        assert_eq!(out.len(), "id=".len() + 36);
    }

    #[test]
    fn render_leaves_unknown_system_placeholders() {
        let (_, ctx) = context();
        assert_eq!(ctx.render("${__no_such_thing}"), "${__no_such_thing}");
    }

    #[test]
    fn clear_scopes_independently() {
        let (_, mut ctx) = context();
        ctx.set_local("a", json!(1));
        ctx.set_session("b", json!(2));

        ctx.clear(ClearScope::Local);
        assert_eq!(ctx.get("a"), None);
        assert_eq!(ctx.get("b"), Some(json!(2)));

        ctx.set_local("a", json!(1));
        ctx.clear(ClearScope::All);
        assert_eq!(ctx.get("a"), None);
        assert_eq!(ctx.get("b"), None);
    }

    #[test]
    fn remove_clears_local_and_session_entries() {
        let (_, mut ctx) = context();
        ctx.set_local("x", json!(1));
        ctx.set_session("x", json!(2));
        assert!(ctx.remove("x"));
        assert_eq!(ctx.get("x"), None);
        assert!(!ctx.remove("x"));
    }
}
