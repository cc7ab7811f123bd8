//! Value environment: the live mapping from identifier to value.

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
};

use crate::value::Value;

/// Identifier to value mapping that dependency expressions are evaluated against.
///
/// Every write bumps [`version`](Self::version), which the
/// [`Resolver`](crate::resolve::Resolver) uses to decide whether its cached
/// resolution is still current.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    /// Lowercased identifier to the first identifier inserted with that spelling.
    folded: HashMap<String, String>,
    /// Labels of every choice option, resolvable as bare words.
    labels: HashSet<String>,
    version: u64,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Lookup used by expressions.
    ///
    /// Tries the exact identifier, then a case-insensitive match, then a
    /// choice label, which evaluates to itself as a string.
    pub fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        if let Some(value) = self.values.get(name) {
            return Some(Cow::Borrowed(value));
        }
        if let Some(value) = self
            .folded
            .get(&name.to_lowercase())
            .and_then(|canonical| self.values.get(canonical))
        {
            return Some(Cow::Borrowed(value));
        }
        if self.labels.contains(name) {
            return Some(Cow::Owned(Value::Str(name.to_string())));
        }
        None
    }

    /// Set `name`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        self.folded
            .entry(name.to_lowercase())
            .or_insert_with(|| name.clone());
        self.version += 1;
        self.values.insert(name, value.into())
    }

    /// Make choice labels resolvable as bare words.
    pub fn register_labels<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self.version += 1;
    }

    /// Monotonic write counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut env = Environment::new();
        for (name, value) in iter {
            env.insert(name, value);
        }
        env
    }
}
