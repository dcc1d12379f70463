//! Declarative specs built from JSON.
//!
//! Code registers named functions, promises, commands and predicates; a
//! JSON description then refers to them by name:
//!
//! ```json
//! [
//!   {"run": "validate"},
//!   {"if": "is_new", "then": {"run": "insert"}, "else": {"run": "update"}},
//!   [{"event": "audit", "values": {"level": "info"}}, "notify"]
//! ]
//! ```
//!
//! | JSON | spec |
//! |---|---|
//! | string | [`Spec::Event`] |
//! | array | [`Spec::Parallel`] |
//! | `{"event", "values"?, "target"?, "require_catch"?}` | [`Spec::Event`] |
//! | `{"run"}` | the registered spec |
//! | `{"if", "then"?, "else"?}` | [`Spec::Conditional`] |
//!
//! `if` takes a registered predicate name, a boolean literal, or
//! `{"truthy": key}`.

use super::spec::{ConditionalSpec, EventSpec, Predicate, Spec};
use crate::errors::SpecError;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Named specs and predicates a JSON description can refer to.
#[derive(Debug, Default)]
pub struct SpecRegistry {
    specs: RwLock<HashMap<String, Spec>>,
    predicates: RwLock<HashMap<String, Predicate>>,
}

impl SpecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spec under `name` for `{"run": name}`.
    pub fn register(&self, name: impl Into<String>, spec: impl Into<Spec>) {
        let name = name.into();
        debug!(%name, "Registering spec");
        self.specs.write().insert(name, spec.into());
    }

    /// Registers a predicate under `name` for `{"if": name}`.
    pub fn register_predicate(&self, name: impl Into<String>, predicate: Predicate) {
        self.predicates.write().insert(name.into(), predicate);
    }

    /// Returns true if a spec is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.read().contains_key(name)
    }

    /// Lists registered spec names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds one spec.
    pub fn build(&self, value: &Value) -> Result<Spec, SpecError> {
        match value {
            Value::String(event_type) => Ok(Spec::event(event_type.as_str())),
            Value::Array(items) => Ok(Spec::Parallel(self.build_each(items)?)),
            Value::Object(map) => self.build_object(map),
            other => Err(SpecError::unsupported(other)),
        }
    }

    /// Builds a thread's executor list. A single spec becomes a list of one.
    pub fn build_list(&self, value: &Value) -> Result<Vec<Spec>, SpecError> {
        match value {
            Value::Array(items) => self.build_each(items),
            other => Ok(vec![self.build(other)?]),
        }
    }

    /// Parses `json` and builds a thread's executor list.
    pub fn build_str(&self, json: &str) -> Result<Vec<Spec>, SpecError> {
        let value: Value = serde_json::from_str(json).map_err(|e| SpecError::malformed(e.to_string()))?;
        self.build_list(&value)
    }

    fn build_each(&self, items: &[Value]) -> Result<Vec<Spec>, SpecError> {
        items.iter().map(|item| self.build(item)).collect()
    }

    fn build_object(&self, map: &Map<String, Value>) -> Result<Spec, SpecError> {
        if let Some(name) = map.get("run") {
            let name = name
                .as_str()
                .ok_or_else(|| SpecError::malformed("'run' must be a string"))?;
            return self
                .specs
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| SpecError::unknown(name));
        }

        if let Some(event_type) = map.get("event") {
            return build_event(event_type, map);
        }

        if let Some(test) = map.get("if") {
            let mut conditional = ConditionalSpec::new(self.build_predicate(test)?);
            if let Some(then) = map.get("then") {
                conditional = conditional.then(self.build(then)?);
            }
            if let Some(otherwise) = map.get("else") {
                conditional = conditional.otherwise(self.build(otherwise)?);
            }
            return Ok(conditional.into());
        }

        Err(SpecError::UnsupportedExecutee {
            shape: format!("object with keys [{}]", map.keys().cloned().collect::<Vec<_>>().join(", ")),
        })
    }

    fn build_predicate(&self, test: &Value) -> Result<Predicate, SpecError> {
        match test {
            Value::Bool(b) => Ok(Predicate::constant(*b)),
            Value::String(name) => self
                .predicates
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| SpecError::unknown(name.as_str())),
            Value::Object(map) => match map.get("truthy").and_then(Value::as_str) {
                Some(key) => Ok(Predicate::truthy(key)),
                None => Err(SpecError::malformed("'if' object must be {\"truthy\": key}")),
            },
            other => Err(SpecError::unsupported(other)),
        }
    }
}

fn build_event(event_type: &Value, map: &Map<String, Value>) -> Result<Spec, SpecError> {
    let event_type = event_type
        .as_str()
        .ok_or_else(|| SpecError::malformed("'event' must be a string"))?;
    let mut spec = EventSpec::new(event_type);

    match map.get("values") {
        None => {}
        Some(Value::Object(values)) => {
            for (key, value) in values {
                spec = spec.with_value(key.clone(), value.clone());
            }
        }
        Some(_) => return Err(SpecError::malformed("'values' must be an object")),
    }
    if let Some(target) = map.get("target").and_then(Value::as_str) {
        spec = spec.with_target(target);
    }
    if map.get("require_catch").and_then(Value::as_bool) == Some(true) {
        spec = spec.require_catch();
    }
    Ok(spec.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutorKind;
    use crate::executors::FunctionSpec;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> SpecRegistry {
        let registry = SpecRegistry::new();
        registry.register("insert", FunctionSpec::new("insert", &[], |_| Ok(())));
        registry.register_predicate("is_new", Predicate::new("is_new", &["id"], |args| Ok(args.value("id").is_none())));
        registry
    }

    #[test]
    fn test_shapes() {
        let specs = registry()
            .build_list(&json!([
                "saved",
                {"run": "insert"},
                {"if": "is_new", "then": {"run": "insert"}},
                [{"event": "audit", "values": {"level": "info"}}, "notify"],
            ]))
            .unwrap();

        let kinds: Vec<ExecutorKind> = specs.iter().map(Spec::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ExecutorKind::Event,
                ExecutorKind::Function,
                ExecutorKind::Conditional,
                ExecutorKind::Parallel,
            ]
        );
    }

    #[test]
    fn test_event_values() {
        let spec = registry()
            .build(&json!({"event": "audit", "values": {"level": "info"}, "require_catch": true}))
            .unwrap();

        let Spec::Event(event) = spec else {
            panic!("expected an event spec");
        };
        assert_eq!(event.values().get("level"), Some(&json!("info")));
        assert!(event.requires_catch());
    }

    #[test]
    fn test_unsupported_names_type() {
        let err = registry().build(&json!(42)).unwrap_err();
        assert_eq!(err, SpecError::UnsupportedExecutee { shape: "number".to_string() });

        let err = registry().build(&json!({"bogus": 1})).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(registry().build(&json!({"run": "nope"})).unwrap_err(), SpecError::unknown("nope"));
        assert_eq!(registry().build(&json!({"if": "nope"})).unwrap_err(), SpecError::unknown("nope"));
    }

    #[test]
    fn test_build_str_rejects_bad_json() {
        assert!(matches!(registry().build_str("[").unwrap_err(), SpecError::Malformed { .. }));
        assert_eq!(registry().build_str("\"saved\"").unwrap().len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = registry();
        registry.register("archive", Spec::event("archived"));
        assert_eq!(registry.names(), vec!["archive".to_string(), "insert".to_string()]);
        assert!(registry.contains("insert"));
    }
}
