//! Visibility and availability resolution.
//!
//! A node is *satisfied* when it has no dependency or its dependency evaluates
//! truthy. Unsatisfied nodes are hidden, and so is everything below an
//! unsatisfied group; those descendants are not evaluated at all. A visible
//! node is enabled unless it is external.

use serde::Serialize;

use crate::{
    data::{Forest, NodeId},
    env::Environment,
    error::{Diagnostic, DiagnosticKind},
    expr::evaluate_condition,
};

/// Effective state of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeState {
    pub visible: bool,
    pub enabled: bool,
}

/// Result of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    states: Vec<NodeState>,
    diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// State of `id`; nodes outside the resolved forest read as hidden.
    pub fn state(&self, id: NodeId) -> NodeState {
        self.states.get(id.index()).copied().unwrap_or_default()
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.state(id).visible
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.state(id).enabled
    }

    /// Evaluation faults, one per failing dependency, in declaration order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Resolve every node of `forest` against `env`.
pub fn resolve(forest: &Forest, env: &Environment) -> Resolution {
    let mut resolution = Resolution {
        states: vec![NodeState::default(); forest.len()],
        diagnostics: Vec::new(),
    };
    for &root in forest.roots() {
        visit(forest, env, root, &mut resolution);
    }
    resolution
}

fn visit(forest: &Forest, env: &Environment, id: NodeId, out: &mut Resolution) {
    let node = forest.node(id);
    let satisfied = match &node.dependency {
        None => true,
        Some(expr) => match evaluate_condition(expr, env) {
            Ok(satisfied) => satisfied,
            Err(err) => {
                warn!("dependency of `{}` cannot be evaluated: {err}", node.name);
                out.diagnostics.push(Diagnostic {
                    option: node.name.clone(),
                    kind: DiagnosticKind::Eval(err),
                });
                false
            }
        },
    };
    if !satisfied {
        return;
    }

    out.states[id.index()] = NodeState {
        visible: true,
        enabled: !node.external,
    };
    for &child in &node.children {
        visit(forest, env, child, out);
    }
}

/// Caches the latest [`Resolution`] keyed by the environment version.
///
/// Any write to the environment bumps its version, so the next call to
/// [`resolve`](Self::resolve) recomputes everything.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    resolution: Resolution,
    version: Option<u64>,
    passes: usize,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolution for the current state of `env`, recomputed only if stale.
    pub fn resolve(&mut self, forest: &Forest, env: &Environment) -> &Resolution {
        if self.version != Some(env.version()) {
            trace!("resolving {} nodes at version {}", forest.len(), env.version());
            self.resolution = resolve(forest, env);
            self.version = Some(env.version());
            self.passes += 1;
        }
        &self.resolution
    }

    /// Last computed resolution.
    pub fn current(&self) -> &Resolution {
        &self.resolution
    }

    /// Number of full passes computed so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn invalidate(&mut self) {
        self.version = None;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{data::ingest_documents, error::EvalError, value::Value};

    fn setup(options: serde_json::Value) -> (Forest, Environment) {
        let forest = ingest_documents(&[json!({ "name": "test", "options": options })]).unwrap();
        let env = forest.default_environment();
        (forest, env)
    }

    fn state(forest: &Forest, res: &Resolution, name: &str) -> (bool, bool) {
        let s = res.state(forest.get(name).unwrap());
        (s.visible, s.enabled)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (forest, mut env) = setup(json!([
            {"name": "A", "type": "bool", "default": true},
            {"name": "B", "type": "int", "default": 0, "dependencies": ["A", "!C"]},
            {"name": "C", "type": "bool", "default": false, "dependencies": ["A"]}
        ]));

        let res = resolve(&forest, &env);
        assert_eq!(state(&forest, &res, "A"), (true, true));
        assert_eq!(state(&forest, &res, "B"), (true, true));
        assert_eq!(state(&forest, &res, "C"), (true, true));
        assert!(res.diagnostics().is_empty());

        env.insert("C", true);
        let res = resolve(&forest, &env);
        assert_eq!(state(&forest, &res, "B"), (false, false));
        assert_eq!(state(&forest, &res, "C"), (true, true));
    }

    #[test]
    fn test_hidden_group_hides_descendants_without_evaluating() {
        let (forest, env) = setup(json!([
            {"name": "A", "type": "bool", "default": false},
            {"name": "G", "type": "group", "dependencies": "A", "options": [
                {"name": "INNER", "type": "group", "options": [
                    {"name": "X", "type": "int", "dependencies": "MISSING > 1"}
                ]},
                {"name": "Y", "type": "bool"}
            ]}
        ]));
        let res = resolve(&forest, &env);
        for name in ["G", "INNER", "X", "Y"] {
            assert_eq!(state(&forest, &res, name), (false, false), "{name}");
        }
        assert!(res.diagnostics().is_empty());
    }

    #[test]
    fn test_visible_group_cascades_children() {
        let (forest, env) = setup(json!([
            {"name": "A", "type": "bool", "default": true},
            {"name": "G", "type": "group", "dependencies": "A", "options": [
                {"name": "X", "type": "int", "dependencies": "A == 0"},
                {"name": "Y", "type": "bool"}
            ]}
        ]));
        let res = resolve(&forest, &env);
        assert_eq!(state(&forest, &res, "G"), (true, true));
        assert_eq!(state(&forest, &res, "X"), (false, false));
        assert_eq!(state(&forest, &res, "Y"), (true, true));
    }

    #[test]
    fn test_unknown_reference_is_one_diagnostic() {
        let (forest, env) = setup(json!([
            {"name": "A", "type": "bool", "dependencies": "NOPE"},
            {"name": "B", "type": "bool"}
        ]));
        let res = resolve(&forest, &env);
        assert_eq!(state(&forest, &res, "A"), (false, false));
        assert_eq!(state(&forest, &res, "B"), (true, true));
        assert_eq!(res.diagnostics().len(), 1);
        assert_eq!(res.diagnostics()[0].option, "A");
        assert_eq!(
            res.diagnostics()[0].eval_error(),
            Some(&EvalError::UnknownReference {
                name: "NOPE".into()
            })
        );
    }

    #[test]
    fn test_group_name_is_not_a_value() {
        let (forest, env) = setup(json!([
            {"name": "G", "type": "group", "options": []},
            {"name": "A", "type": "bool", "dependencies": "G"}
        ]));
        let res = resolve(&forest, &env);
        assert!(!res.is_visible(forest.get("A").unwrap()));
        assert!(matches!(
            res.diagnostics()[0].eval_error(),
            Some(EvalError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_division_by_zero_hides_option() {
        let (forest, env) = setup(json!([
            {"name": "X", "type": "int", "default": 4},
            {"name": "Y", "type": "bool", "dependencies": "X/0>1"}
        ]));
        let res = resolve(&forest, &env);
        assert_eq!(state(&forest, &res, "Y"), (false, false));
        assert_eq!(res.diagnostics().len(), 1);
        assert!(matches!(
            res.diagnostics()[0].eval_error(),
            Some(EvalError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_external_is_visible_but_disabled() {
        let (forest, env) = setup(json!([
            {"name": "CC", "type": "string", "external": true, "default": "gcc"},
            {"name": "LTO", "type": "bool", "dependencies": "CC == 'clang'"}
        ]));
        let res = resolve(&forest, &env);
        assert_eq!(state(&forest, &res, "CC"), (true, false));
        assert_eq!(state(&forest, &res, "LTO"), (false, false));
    }

    #[test]
    fn test_choice_labels_in_dependencies() {
        let (forest, mut env) = setup(json!([
            {"name": "LOG_LEVEL", "type": "multiple_choice", "choices": ["INFO", "DEBUG"]},
            {"name": "VERBOSE", "type": "bool", "dependencies": "LOG_LEVEL==DEBUG"},
            {"name": "QUIET", "type": "bool", "dependencies": "log_level=INFO"}
        ]));
        let res = resolve(&forest, &env);
        assert!(!res.is_visible(forest.get("VERBOSE").unwrap()));
        assert!(res.is_visible(forest.get("QUIET").unwrap()));

        env.insert(
            "LOG_LEVEL",
            Value::Choice {
                index: 1,
                label: "DEBUG".into(),
            },
        );
        let res = resolve(&forest, &env);
        assert!(res.is_visible(forest.get("VERBOSE").unwrap()));
        assert!(!res.is_visible(forest.get("QUIET").unwrap()));
        assert!(res.diagnostics().is_empty());
    }

    #[test]
    fn test_resolver_reuses_until_write() {
        let (forest, mut env) = setup(json!([
            {"name": "A", "type": "bool", "default": true},
            {"name": "B", "type": "bool", "dependencies": "A"}
        ]));
        let mut resolver = Resolver::new();
        assert!(resolver.resolve(&forest, &env).is_visible(forest.get("B").unwrap()));
        resolver.resolve(&forest, &env);
        assert_eq!(resolver.passes(), 1);

        env.insert("A", false);
        assert!(!resolver.resolve(&forest, &env).is_visible(forest.get("B").unwrap()));
        assert_eq!(resolver.passes(), 2);

        resolver.invalidate();
        resolver.resolve(&forest, &env);
        assert_eq!(resolver.passes(), 3);
        assert!(!resolver.current().is_visible(forest.get("B").unwrap()));
    }
}
