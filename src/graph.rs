//! Arena-backed value graph.
//!
//! Parsed documents live in one arena of nodes addressed by `NodeId`
//! handles. Structural links are edges (`NodeId`s inside `Array`/`Object`
//! nodes), so dereferencing is an edge rewrite and the same node can be
//! shared by many parents — including cyclically, which tree-shaped value
//! types cannot express.
//!
//! Object keys keep document order (`IndexMap`), so exports are stable.

use indexmap::IndexMap;

use crate::error::{RefError, RefResult};
use crate::pointer::Pointer;

/// Handle to a node in a [`ValueGraph`]. Only meaningful for the graph that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One node of the value graph.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Raw passthrough content of a document no parser claimed.
    Bytes(Vec<u8>),
    Array(Vec<NodeId>),
    Object(IndexMap<String, NodeId>),
}

/// Arena of value nodes. One per resolve/dereference/bundle operation.
#[derive(Debug, Default)]
pub struct ValueGraph {
    nodes: Vec<ValueNode>,
}

impl ValueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: ValueNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &ValueNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ValueNode {
        &mut self.nodes[id.0]
    }

    /// Overwrite a node in place, keeping its identity. Used when the node
    /// being substituted is itself a traversal root and edge rewriting in a
    /// parent is not possible.
    pub fn replace(&mut self, id: NodeId, node: ValueNode) {
        self.nodes[id.0] = node;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -----------------------------------------------------------------------
    // Import / export
    // -----------------------------------------------------------------------

    /// Import a `serde_json::Value` tree, returning the root node.
    pub fn import_json(&mut self, value: serde_json::Value) -> NodeId {
        let node = match value {
            serde_json::Value::Null => ValueNode::Null,
            serde_json::Value::Bool(b) => ValueNode::Bool(b),
            serde_json::Value::Number(n) => ValueNode::Number(n),
            serde_json::Value::String(s) => ValueNode::String(s),
            serde_json::Value::Array(items) => {
                let ids = items.into_iter().map(|v| self.import_json(v)).collect();
                ValueNode::Array(ids)
            }
            serde_json::Value::Object(map) => {
                let mut entries = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    let id = self.import_json(v);
                    entries.insert(k, id);
                }
                ValueNode::Object(entries)
            }
        };
        self.push(node)
    }

    /// Export a subtree to `serde_json::Value`.
    ///
    /// Fails with `CyclicValue` if the subtree contains a cycle (possible
    /// after dereferencing a self-referential document). `Bytes` nodes export
    /// as arrays of byte values, mirroring how opaque buffers serialize in
    /// the original tooling.
    pub fn to_json(&self, root: NodeId) -> RefResult<serde_json::Value> {
        let mut on_stack = vec![false; self.nodes.len()];
        self.to_json_inner(root, &Pointer::root(), &mut on_stack)
    }

    fn to_json_inner(
        &self,
        id: NodeId,
        path: &Pointer,
        on_stack: &mut [bool],
    ) -> RefResult<serde_json::Value> {
        if on_stack[id.0] {
            return Err(RefError::CyclicValue {
                path: path.to_string(),
            });
        }
        let value = match self.node(id) {
            ValueNode::Null => serde_json::Value::Null,
            ValueNode::Bool(b) => serde_json::Value::Bool(*b),
            ValueNode::Number(n) => serde_json::Value::Number(n.clone()),
            ValueNode::String(s) => serde_json::Value::String(s.clone()),
            ValueNode::Bytes(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
            ),
            ValueNode::Array(items) => {
                on_stack[id.0] = true;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.to_json_inner(*item, &path.child(i.to_string()), on_stack)?);
                }
                on_stack[id.0] = false;
                serde_json::Value::Array(out)
            }
            ValueNode::Object(entries) => {
                on_stack[id.0] = true;
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (key, child) in entries {
                    out.insert(
                        key.clone(),
                        self.to_json_inner(*child, &path.child(key.clone()), on_stack)?,
                    );
                }
                on_stack[id.0] = false;
                serde_json::Value::Object(out)
            }
        };
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Pointer nodes and pointer walking
    // -----------------------------------------------------------------------

    /// If `id` is a pointer node (a mapping carrying a `$ref` key whose value
    /// is a string), return the reference string.
    pub fn ref_target(&self, id: NodeId) -> Option<&str> {
        let ValueNode::Object(entries) = self.node(id) else {
            return None;
        };
        let target = entries.get("$ref")?;
        match self.node(*target) {
            ValueNode::String(s) => Some(s),
            _ => None,
        }
    }

    /// Walk a pointer path from `root`, following object keys and array
    /// indices. `None` when any token does not exist.
    pub fn walk_pointer(&self, root: NodeId, pointer: &Pointer) -> Option<NodeId> {
        let mut current = root;
        for token in pointer.tokens() {
            current = match self.node(current) {
                ValueNode::Object(entries) => *entries.get(token.as_str())?,
                ValueNode::Array(items) => {
                    let index: usize = token.parse().ok()?;
                    *items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}
