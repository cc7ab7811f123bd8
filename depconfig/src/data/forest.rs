use indexmap::IndexMap;

use super::option::{NodeId, OptionNode};
use crate::{env::Environment, error::IngestError};

/// Merged option tree stored as an arena.
///
/// Nodes are pushed in declaration pre-order, so iterating the arena visits a
/// group before its children and siblings in the order they were declared.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    name: String,
    nodes: Vec<OptionNode>,
    roots: Vec<NodeId>,
    index: IndexMap<String, NodeId>,
    /// Lowercased identifier to the first node declared under it.
    folded: IndexMap<String, NodeId>,
}

impl Forest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Title taken from the first schema document.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by identifier.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Look up a node the way expressions resolve identifiers: exact match
    /// first, then case-insensitive.
    pub fn get_ignore_case(&self, name: &str) -> Option<NodeId> {
        self.get(name).or_else(|| self.folded.get(&name.to_lowercase()).copied())
    }

    pub fn find(&self, name: &str) -> Option<&OptionNode> {
        self.get(name).map(|id| self.node(id))
    }

    pub fn node(&self, id: NodeId) -> &OptionNode {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// All nodes in declaration pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &OptionNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i), node))
    }

    /// Dot separated path from the outermost group, e.g. `NETWORK.PORT`.
    pub fn path(&self, id: NodeId) -> String {
        let mut names = vec![self.node(id).name.as_str()];
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            names.push(&self.node(parent).name);
            cursor = self.parent(parent);
        }
        names.reverse();
        names.join(".")
    }

    /// Number of enclosing groups.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.parent(parent);
        }
        depth
    }

    /// Append a node under its `parent`, assigning its sibling position.
    pub(crate) fn push(&mut self, mut node: OptionNode) -> Result<NodeId, IngestError> {
        if let Some(existing) = self.get(&node.name) {
            return Err(IngestError::DuplicateIdentifier {
                name: node.name,
                first: self.node(existing).document.clone(),
                second: node.document,
            });
        }

        let id = NodeId(self.nodes.len());
        let siblings = match node.parent {
            Some(parent) => &mut self.nodes[parent.0].children,
            None => &mut self.roots,
        };
        node.position = siblings.len();
        siblings.push(id);

        self.index.insert(node.name.clone(), id);
        self.folded.entry(node.name.to_lowercase()).or_insert(id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Environment holding every option's default.
    pub fn default_environment(&self) -> Environment {
        let mut env = Environment::new();
        for (_, node) in self.iter() {
            if let Some(default) = &node.default {
                env.insert(node.name.clone(), default.clone());
            }
            if !node.option_type.choices().is_empty() {
                env.register_labels(node.option_type.choices().iter().cloned());
            }
        }
        env
    }
}
