//! The schema registry boundary.
//!
//! `Schema(methodName)` is treated as an opaque, externally-owned catalogue:
//! the coordinator and the IO-rendering client on the operator side are the
//! actual source of truth for what a given method name's props/state/returns
//! look like. This crate cannot depend on that catalogue, so it defines the
//! shape of the boundary and ships a permissive default that is enough to
//! exercise the render loop end to end. A real deployment supplies its own
//! [`SchemaRegistry`] via `HostConfig::with_schema_registry`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// An opaque symbol identifying a component kind (e.g. `INPUT_TEXT`,
/// `SELECT_TABLE`). The set is closed and shared with the coordinator, but
/// is not a closed Rust enum here: new method names can be registered
/// without recompiling this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodName(Cow<'static, str>);

impl MethodName {
    /// Build a method name from a `'static` string literal.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Build a method name from an owned string (e.g. parsed off the wire).
    #[must_use]
    pub fn owned(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pure mapping from an arbitrary input value to a canonical value or a
/// validation error message.
pub type Validator = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// The three validators associated with one method name.
#[derive(Clone)]
pub struct Schema {
    pub props: Validator,
    pub state: Validator,
    pub returns: Validator,
}

impl Schema {
    /// A schema whose three validators pass every value through unchanged.
    #[must_use]
    pub fn permissive() -> Self {
        let pass: Validator = Arc::new(|v: &Value| Ok(v.clone()));
        Self {
            props: pass.clone(),
            state: pass.clone(),
            returns: pass,
        }
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema").finish_non_exhaustive()
    }
}

/// Looks up the `{props, state, returns}` validator triple for a method
/// name.
pub trait SchemaRegistry: Send + Sync {
    fn lookup(&self, method: &MethodName) -> Option<&Schema>;
}

/// An in-memory registry keyed by method name.
#[derive(Default)]
pub struct MapRegistry {
    schemas: HashMap<MethodName, Schema>,
}

impl MapRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, method: MethodName, schema: Schema) -> Self {
        self.schemas.insert(method, schema);
        self
    }
}

impl SchemaRegistry for MapRegistry {
    fn lookup(&self, method: &MethodName) -> Option<&Schema> {
        self.schemas.get(method)
    }
}

/// The `io` namespace method names enumerated in the component catalogue.
/// The validation content of each schema is out of scope; this list only
/// ensures the namespace is fully constructible against the default
/// registry.
pub const IO_METHOD_NAMES: &[&str] = &[
    "GROUP",
    "CONFIRM",
    "SEARCH",
    "INPUT_TEXT",
    "INPUT_BOOLEAN",
    "INPUT_NUMBER",
    "INPUT_EMAIL",
    "INPUT_RICH_TEXT",
    "SELECT_SINGLE",
    "SELECT_MULTIPLE",
    "SELECT_TABLE",
    "DISPLAY_HEADING",
    "DISPLAY_MARKDOWN",
    "DISPLAY_LINK",
    "DISPLAY_OBJECT",
    "DISPLAY_TABLE",
    "EXPERIMENTAL_SPREADSHEET",
    "EXPERIMENTAL_DATE",
    "EXPERIMENTAL_TIME",
    "EXPERIMENTAL_DATETIME",
    "EXPERIMENTAL_INPUT_FILE",
];

/// A permissive registry covering every method name in [`IO_METHOD_NAMES`],
/// enough to drive the render loop end to end without a real coordinator
/// catalogue.
#[must_use]
pub fn default_registry() -> MapRegistry {
    IO_METHOD_NAMES
        .iter()
        .fold(MapRegistry::new(), |reg, name| {
            reg.with(MethodName::new(name), Schema::permissive())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_io_method() {
        let registry = default_registry();
        for name in IO_METHOD_NAMES {
            assert!(registry.lookup(&MethodName::new(name)).is_some(), "missing {name}");
        }
    }

    #[test]
    fn permissive_schema_passes_values_through() {
        let schema = Schema::permissive();
        let value = serde_json::json!({ "a": 1 });
        assert_eq!((schema.props)(&value).unwrap(), value);
    }

    #[test]
    fn unknown_method_is_absent() {
        let registry = default_registry();
        assert!(registry.lookup(&MethodName::owned("NOT_REAL")).is_none());
    }
}
