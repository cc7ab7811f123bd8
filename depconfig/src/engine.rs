//! The configuration engine.
//!
//! [`Engine`] owns an ingested [`Forest`], the live [`Environment`] and a
//! [`Resolver`] cache. Every write goes through the engine, is validated
//! against the option's declared type, and is followed by a re-resolution
//! before the call returns.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::{
    data::{DocumentLoader, Forest, NodeId, schema},
    env::Environment,
    error::{Diagnostic, DiagnosticKind, EngineError, EvalError, IngestError},
    resolve::{NodeState, Resolution, Resolver},
    value::Value,
};

/// One row of [`Engine::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    /// Current value; groups have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub visible: bool,
    pub enabled: bool,
}

/// Live configuration over an option forest.
#[derive(Debug, Clone)]
pub struct Engine {
    forest: Forest,
    env: Environment,
    resolver: Resolver,
}

impl Engine {
    /// Wrap an ingested forest, with every option at its default.
    pub fn new(forest: Forest) -> Self {
        let env = forest.default_environment();
        let mut engine = Self {
            forest,
            env,
            resolver: Resolver::new(),
        };
        engine.refresh();
        engine
    }

    /// Ingest `roots` through `loader` and resolve the initial state.
    pub fn ingest<L>(loader: &mut L, roots: &[&str]) -> Result<Self, IngestError>
    where
        L: DocumentLoader + ?Sized,
    {
        Ok(Self::new(schema::ingest(loader, roots)?))
    }

    /// Build from already parsed schema documents; includes refer to document names.
    pub fn from_documents(documents: &[Json]) -> Result<Self, IngestError> {
        Ok(Self::new(schema::ingest_documents(documents)?))
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Latest resolution.
    pub fn resolution(&self) -> &Resolution {
        self.resolver.current()
    }

    /// Diagnostics of the latest resolution.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.resolution().diagnostics()
    }

    fn refresh(&mut self) {
        self.resolver.resolve(&self.forest, &self.env);
    }

    /// Current value of an option or context variable.
    pub fn get_value(&self, name: &str) -> Result<&Value, EvalError> {
        self.env
            .get(name)
            .ok_or_else(|| EvalError::UnknownReference {
                name: name.to_string(),
            })
    }

    /// Visibility of a node, `None` for unknown names.
    pub fn state(&self, name: &str) -> Option<NodeState> {
        self.forest.get(name).map(|id| self.resolution().state(id))
    }

    fn option_id(&self, name: &str) -> Result<NodeId, EngineError> {
        self.forest
            .get(name)
            .ok_or_else(|| EngineError::UnknownOption {
                name: name.to_string(),
            })
    }

    /// Set an option's value.
    ///
    /// Booleans also accept `0`/`1`; choices accept a label, a [`Value::Choice`]
    /// or an index. External and currently disabled options are rejected.
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> Result<(), EngineError> {
        let value: Value = value.into();
        let id = self.option_id(name)?;
        let node = self.forest.node(id);
        let path = self.forest.path(id);

        if node.is_group() {
            return Err(EngineError::TypeMismatch {
                path,
                expected: "no value (group)".into(),
                actual: value.type_name().into(),
            });
        }
        if node.external {
            return Err(EngineError::ReadOnly {
                name: node.name.clone(),
            });
        }
        if !self.resolver.current().is_enabled(id) {
            return Err(EngineError::Disabled {
                name: node.name.clone(),
            });
        }

        let value = node
            .option_type
            .coerce(value)
            .map_err(|m| m.into_engine(&path))?;
        debug!("set {path} = {value}");
        self.env.insert(node.name.clone(), value);
        self.refresh();
        Ok(())
    }

    /// Set an option from user-typed text, parsed by its declared type.
    pub fn set_text(&mut self, name: &str, text: &str) -> Result<(), EngineError> {
        let id = self.option_id(name)?;
        let value = self
            .forest
            .node(id)
            .option_type
            .parse_text(text)
            .map_err(|m| m.into_engine(&self.forest.path(id)))?;
        self.set_value(name, value)
    }

    /// Provide a value from the host application.
    ///
    /// `name` is either an `external` option or a context variable unknown to
    /// the schema. Injecting into any other declared node is rejected, also
    /// when the names differ only in case.
    pub fn inject(&mut self, name: &str, value: impl Into<Value>) -> Result<(), EngineError> {
        let value: Value = value.into();
        match self.forest.get_ignore_case(name) {
            Some(id) => {
                let node = self.forest.node(id);
                if !node.external {
                    return Err(EngineError::Duplicate {
                        name: node.name.clone(),
                    });
                }
                let value = node
                    .option_type
                    .coerce(value)
                    .map_err(|m| m.into_engine(&self.forest.path(id)))?;
                debug!("external {} = {value}", node.name);
                self.env.insert(node.name.clone(), value);
            }
            None => {
                debug!("context {name} = {value}");
                self.env.insert(name, value);
            }
        }
        self.refresh();
        Ok(())
    }

    /// Like [`Engine::inject`], but an external option's text is parsed by
    /// its declared type. Context variables receive the text as a string.
    pub fn inject_text(&mut self, name: &str, text: &str) -> Result<(), EngineError> {
        if let Some(id) = self.forest.get_ignore_case(name)
            && self.forest.node(id).external
        {
            let value = self
                .forest
                .node(id)
                .option_type
                .parse_text(text)
                .map_err(|m| m.into_engine(&self.forest.path(id)))?;
            return self.inject(name, value);
        }
        self.inject(name, text)
    }

    /// Every node in declaration order with its value and state.
    pub fn snapshot(&self) -> IndexMap<String, SnapshotEntry> {
        let resolution = self.resolution();
        self.forest
            .iter()
            .map(|(id, node)| {
                let state = resolution.state(id);
                let entry = SnapshotEntry {
                    value: self.env.get(&node.name).filter(|_| !node.is_group()).cloned(),
                    visible: state.visible,
                    enabled: state.enabled,
                };
                (node.name.clone(), entry)
            })
            .collect()
    }

    /// Flat mapping of visible options to their values, in declaration order.
    ///
    /// Hidden options keep their values in memory but are not exported.
    pub fn export(&self) -> Map<String, Json> {
        let resolution = self.resolution();
        self.forest
            .iter()
            .filter(|(id, node)| !node.is_group() && resolution.is_visible(*id))
            .filter_map(|(_, node)| {
                self.env
                    .get(&node.name)
                    .map(|value| (node.name.clone(), value.as_json()))
            })
            .collect()
    }

    /// Apply a stored configuration.
    ///
    /// Entries are validated one by one; an invalid entry resets the option
    /// to its default. Null entries and external options are skipped. The
    /// returned diagnostics describe every rejected entry.
    pub fn load_config(&mut self, config: &Map<String, Json>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (key, raw) in config {
            if raw.is_null() {
                continue;
            }
            let Some(id) = self.forest.get(key) else {
                warn!("ignoring `{key}`: not declared by the schema");
                diagnostics.push(Diagnostic {
                    option: key.clone(),
                    kind: DiagnosticKind::UnknownKey,
                });
                continue;
            };
            let node = self.forest.node(id);
            if node.external {
                debug!("ignoring stored value of external option `{key}`");
                continue;
            }
            match node.option_type.value_from_json(raw) {
                Ok(value) => {
                    self.env.insert(key.clone(), value);
                }
                Err(mismatch) => {
                    let diagnostic = Diagnostic {
                        option: key.clone(),
                        kind: mismatch.into_diagnostic(),
                    };
                    warn!("{diagnostic}");
                    if let Some(default) = &node.default {
                        self.env.insert(key.clone(), default.clone());
                    }
                    diagnostics.push(diagnostic);
                }
            }
        }
        self.refresh();
        diagnostics
    }

    /// Identifiers referenced by any dependency, hidden nodes included, that
    /// neither the schema nor an injected context variable provides.
    pub fn dangling_references(&self) -> Vec<Diagnostic> {
        let mut found = Vec::new();
        for (_, node) in self.forest.iter() {
            let Some(dependency) = &node.dependency else {
                continue;
            };
            for name in dependency.references() {
                if self.env.lookup(name).is_none() {
                    found.push(Diagnostic {
                        option: node.name.clone(),
                        kind: DiagnosticKind::Eval(EvalError::UnknownReference {
                            name: name.to_string(),
                        }),
                    });
                }
            }
        }
        found
    }

    /// Nodes whose name contains `query` (case-insensitive), preceded by
    /// their enclosing groups, in declaration order.
    pub fn search(&self, query: &str, include_hidden: bool) -> Vec<NodeId> {
        let needle = query.to_lowercase();
        let resolution = self.resolution();
        let mut hits = BTreeSet::new();
        for (id, node) in self.forest.iter() {
            if !include_hidden && !resolution.is_visible(id) {
                continue;
            }
            if !node.name.to_lowercase().contains(&needle) {
                continue;
            }
            hits.insert(id);
            let mut cursor = node.parent;
            while let Some(parent) = cursor {
                hits.insert(parent);
                cursor = self.forest.parent(parent);
            }
        }
        hits.into_iter().collect()
    }
}
