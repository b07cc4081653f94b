//! Reference table for `[name] value` definitions and `*[name]` uses.

use crate::error::Error;
use crate::value::Value;
use std::collections::HashMap;

/// Named values visible to one decode call.
///
/// The parser fills the table in document order, so a name only resolves
/// after its definition has been read. Resolution hands out a copy; later
/// redefinitions do not affect values already resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    entries: HashMap<String, Value>,
}

impl References {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any earlier binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    /// Value currently bound to `name`. A name bound to null is undefined.
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).filter(|value| !value.is_null())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for References {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut references = References::new();
        for (name, value) in iter {
            references.define(name, value);
        }
        references
    }
}

/// Seed a table from a decoded map, e.g. a references file.
impl TryFrom<Value> for References {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(map) => Ok(map.into_iter().collect()),
            other => Err(Error::InvalidReferences(other.type_name())),
        }
    }
}
