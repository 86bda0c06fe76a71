//! Stylesheet tree.
//!
//! Nodes live in an [`indextree::Arena`]; every node has at most one parent
//! and the order of a parent's children is document order. Removing a node
//! only detaches it, so ids held elsewhere (mixin templates, `original`
//! back-references) stay valid for the rest of the run.

use std::collections::HashMap;

use indextree::Arena;
pub use indextree::NodeId;

use crate::error::{Location, Span};
use crate::value::Value;

pub type Variables = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Rule {
        selector: String,
    },
    AtRule {
        name: String,
        params: String,
        /// Whether the at-rule owns a `{ ... }` block, even an empty one.
        block: bool,
    },
    Declaration {
        prop: String,
        value: String,
        important: bool,
    },
    Comment {
        text: String,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
    /// Lazily created on the first variable write.
    pub variables: Option<Variables>,
    /// For mixin expansions, the `@include` that produced this clone.
    pub original: Option<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            location: Location::default(),
            variables: None,
            original: None,
        }
    }

    pub fn rule(selector: impl Into<String>) -> Self {
        Self::new(NodeKind::Rule {
            selector: selector.into(),
        })
    }

    pub fn at_rule(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self::new(NodeKind::AtRule {
            name: name.into(),
            params: params.into(),
            block: true,
        })
    }

    pub fn declaration(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(NodeKind::Declaration {
            prop: prop.into(),
            value: value.into(),
            important: false,
        })
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn is_rule(&self) -> bool {
        matches!(self.kind, NodeKind::Rule { .. })
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, NodeKind::Declaration { .. })
    }

    /// The lowercased at-rule name, if this is an at-rule.
    pub fn at_rule_name(&self) -> Option<String> {
        match &self.kind {
            NodeKind::AtRule { name, .. } => Some(name.to_ascii_lowercase()),
            _ => None,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Rule { selector } => Some(selector),
            _ => None,
        }
    }

    pub fn params(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::AtRule { params, .. } => Some(params),
            _ => None,
        }
    }

    pub fn prop(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Declaration { prop, .. } => Some(prop),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Declaration { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Stylesheet {
    arena: Arena<Node>,
    root: NodeId,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Stylesheet {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(Node::new(NodeKind::Root));
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena[id].get()
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.arena[id].get_mut()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Allocate a detached node.
    pub fn create(&mut self, node: Node) -> NodeId {
        self.arena.new_node(node)
    }

    /// Allocate a detached root used to hold a parsed fragment.
    pub fn create_fragment(&mut self) -> NodeId {
        self.create(Node::new(NodeKind::Root))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.parent(id).is_some()
    }

    /// Whether `id` is reachable from the stylesheet root.
    pub fn in_tree(&self, id: NodeId) -> bool {
        id.ancestors(&self.arena).any(|ancestor| ancestor == self.root)
    }

    /// A snapshot of the children of `id`, safe to iterate while mutating.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        id.children(&self.arena).collect()
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_some()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].next_sibling()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].previous_sibling()
    }

    /// `id` itself, then each ancestor up to its root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena)
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        id.descendants(&self.arena).collect()
    }

    /// Append `child` (detaching it first if needed) as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.append(child, &mut self.arena);
    }

    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        node.detach(&mut self.arena);
        anchor.insert_before(node, &mut self.arena);
    }

    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        node.detach(&mut self.arena);
        anchor.insert_after(node, &mut self.arena);
    }

    /// Insert every node of `nodes` before `anchor`, keeping their order.
    pub fn insert_all_before(&mut self, anchor: NodeId, nodes: &[NodeId]) {
        for &node in nodes {
            self.insert_before(anchor, node);
        }
    }

    /// Move the children of `from` in front of `anchor`, returning them.
    pub fn move_children_before(&mut self, from: NodeId, anchor: NodeId) -> Vec<NodeId> {
        let children = self.children(from);
        self.insert_all_before(anchor, &children);
        children
    }

    /// Detach `id` from its parent. The node stays alive in the arena.
    pub fn remove(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// Detach every child of `id`.
    pub fn remove_all(&mut self, id: NodeId) {
        for child in self.children(id) {
            self.remove(child);
        }
    }

    /// Put `nodes` where `id` was and detach `id`.
    pub fn replace_with(&mut self, id: NodeId, nodes: &[NodeId]) {
        self.insert_all_before(id, nodes);
        self.remove(id);
    }

    /// Deep copy of `id` and its subtree. The copy is detached; variables and
    /// back-references are copied along with each node.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.node(id).clone();
        let clone = self.create(copy);
        for child in self.children(id) {
            let child_clone = self.deep_clone(child);
            clone.append(child_clone, &mut self.arena);
        }
        clone
    }

    /// Copy of `id` without its children.
    pub fn shallow_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.node(id).clone();
        self.create(copy)
    }

    /// Build a detached declaration carrying over `source`'s location.
    pub fn clone_declaration(&mut self, source: NodeId, prop: &str, value: &str) -> NodeId {
        let mut node = self.node(source).clone();
        if let NodeKind::Declaration {
            prop: p, value: v, ..
        } = &mut node.kind
        {
            *p = prop.to_string();
            *v = value.to_string();
        }
        node.variables = None;
        self.create(node)
    }

    pub fn set_selector(&mut self, id: NodeId, selector: String) {
        if let NodeKind::Rule { selector: s } = &mut self.node_mut(id).kind {
            *s = selector;
        }
    }

    pub fn set_params(&mut self, id: NodeId, params: String) {
        if let NodeKind::AtRule { params: p, .. } = &mut self.node_mut(id).kind {
            *p = params;
        }
    }

    pub fn set_prop(&mut self, id: NodeId, prop: String) {
        if let NodeKind::Declaration { prop: p, .. } = &mut self.node_mut(id).kind {
            *p = prop;
        }
    }

    pub fn set_value(&mut self, id: NodeId, value: String) {
        if let NodeKind::Declaration { value: v, .. } = &mut self.node_mut(id).kind {
            *v = value;
        }
    }

    /// All attached declarations, in document order.
    pub fn declarations(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.node(id).is_declaration())
            .collect()
    }

    /// All attached rules, in document order.
    pub fn rules(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.node(id).is_rule())
            .collect()
    }

    /// The closest ancestor (excluding `id`) that is a rule.
    pub fn closest_rule(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .skip(1)
            .find(|&ancestor| self.node(ancestor).is_rule())
    }

    /// Location of a node, for diagnostics.
    pub fn location(&self, id: NodeId) -> Location {
        self.node(id).location.clone()
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).location.span
    }
}
