//! Lexical variable scopes.
//!
//! Every node can own a variables map. A lookup walks from the query node up
//! through its parents and stops at the first binding; the host fallback is
//! consulted only when no node binds the name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{NodeId, Stylesheet};
use crate::value::Value;

/// Host callback for variables that are not bound in the tree.
pub type VariableCallback =
    Arc<dyn Fn(&str, &Stylesheet, Option<NodeId>) -> Option<Value> + Send + Sync>;

/// Where to look for variables the stylesheet does not define.
#[derive(Clone, Default)]
pub enum VariableSource {
    #[default]
    None,
    Map(HashMap<String, Value>),
    Callback(VariableCallback),
}

impl fmt::Debug for VariableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl VariableSource {
    fn lookup(&self, name: &str, sheet: &Stylesheet, node: Option<NodeId>) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Map(map) => map.get(name).cloned(),
            Self::Callback(callback) => callback(name, sheet, node),
        }
    }
}

static DEFAULT_FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+!default$").expect("valid !default regex"));

#[derive(Debug, Clone, Default)]
pub struct Scope {
    fallback: VariableSource,
}

impl Scope {
    pub fn new(fallback: VariableSource) -> Self {
        Self { fallback }
    }

    /// The nearest binding of `name` visible from `from`, or the host fallback.
    pub fn get(&self, sheet: &Stylesheet, name: &str, from: Option<NodeId>) -> Option<Value> {
        if let Some(start) = from {
            for id in sheet.ancestors(start) {
                let bound = sheet
                    .node(id)
                    .variables
                    .as_ref()
                    .and_then(|variables| variables.get(name));
                if let Some(value) = bound {
                    return Some(value.clone());
                }
            }
        }
        self.fallback.lookup(name, sheet, from)
    }

    /// Bind `name` on `node`. A scalar ending in `!default` is only written
    /// when nothing visible from `node` binds the name yet; the flag itself is
    /// never stored.
    pub fn set(&self, sheet: &mut Stylesheet, node: NodeId, name: &str, value: Value) {
        let value = match value {
            Value::Scalar(text) if DEFAULT_FLAG.is_match(&text) => {
                if self.get(sheet, name, Some(node)).is_some() {
                    return;
                }
                Value::Scalar(DEFAULT_FLAG.replace(&text, "").into_owned())
            }
            other => other,
        };
        sheet
            .node_mut(node)
            .variables
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), value);
    }

    /// Drop `node`'s own binding of `name`, revealing any shadowed one.
    pub fn remove(&self, sheet: &mut Stylesheet, node: NodeId, name: &str) -> Option<Value> {
        sheet
            .node_mut(node)
            .variables
            .as_mut()
            .and_then(|variables| variables.remove(name))
    }
}
