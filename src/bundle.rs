//! Bundle engine: merge every reachable document into one self-contained
//! value while preserving pointer indirection.
//!
//! Internal pointers (targets inside the root document) stay internal, only
//! path-normalized to `#/...` form. External pointers are rewritten: the
//! target subtree is inlined exactly once under
//! `#/components/x-inlined/<key>` and every pointer to that
//! location+pointer-path is redirected there. Unlike dereferencing, no
//! pointer is expanded in place — cyclic reference graphs bundle without
//! growth because a slot is registered before its content is walked.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::cache::RefCache;
use crate::error::{RefError, RefResult};
use crate::graph::{NodeId, ValueGraph, ValueNode};
use crate::location::Location;
use crate::pointer::Pointer;

/// Synthetic container path for inlined external documents. Lives in the
/// OpenAPI extension namespace so it cannot shadow user content under the
/// reserved `components` keys.
const CONTAINER_KEY: &str = "x-inlined";

/// Bundle the value graph rooted at `root`, in place.
pub(crate) fn run(
    graph: &mut ValueGraph,
    cache: &RefCache,
    root: NodeId,
    root_location: &Location,
) -> RefResult<()> {
    let mut pass = Bundler {
        graph,
        cache,
        root_location,
        container: IndexMap::new(),
        key_sources: HashMap::new(),
        slots: HashMap::new(),
        visited: HashSet::new(),
    };

    // The root may itself be a pointer node. Rewrite it in place like any
    // other reference; the container attaches next to the rewritten `$ref`.
    match pass.graph.ref_target(root).map(str::to_string) {
        Some(reference) => {
            pass.visited.insert(root);
            pass.bundle_ref(root, &reference, root_location)?;
        }
        None => pass.walk(root, root_location)?,
    }
    let container = pass.container;
    if container.is_empty() {
        return Ok(());
    }
    attach_container(graph, root, root_location, container)
}

struct Bundler<'a> {
    graph: &'a mut ValueGraph,
    cache: &'a RefCache,
    root_location: &'a Location,
    /// Inlined slots in first-use order, keyed by synthetic bundle key.
    container: IndexMap<String, NodeId>,
    /// Conflict detection: key → the location that claimed it.
    key_sources: HashMap<String, Location>,
    /// location+pointer → assigned key. Repeated references collapse here.
    slots: HashMap<Location, String>,
    visited: HashSet<NodeId>,
}

impl Bundler<'_> {
    fn walk(&mut self, id: NodeId, base: &Location) -> RefResult<()> {
        if !self.visited.insert(id) {
            return Ok(());
        }

        let children: Vec<NodeId> = match self.graph.node(id) {
            ValueNode::Object(entries) => entries.values().copied().collect(),
            ValueNode::Array(items) => items.clone(),
            _ => return Ok(()),
        };

        for child in children {
            match self.graph.ref_target(child).map(str::to_string) {
                Some(reference) => {
                    // A pointer node reachable through overlapping inlined
                    // slots is rewritten once; re-resolving the rewritten
                    // string would misfire.
                    if !self.visited.insert(child) {
                        continue;
                    }
                    self.bundle_ref(child, &reference, base)?;
                }
                None => self.walk(child, base)?,
            }
        }
        Ok(())
    }

    /// Rewrite one pointer node in place: internal targets keep their
    /// indirection with a normalized path, external targets are inlined and
    /// the pointer is redirected to the slot.
    fn bundle_ref(&mut self, id: NodeId, reference: &str, base: &Location) -> RefResult<()> {
        let location = Location::resolve(reference, base)?;
        let rewritten = if location.document() == *self.root_location {
            location.pointer().as_fragment()
        } else {
            let key = self.inline(&location)?;
            Pointer::from_tokens(["components", CONTAINER_KEY, key.as_str()]).as_fragment()
        };
        self.rewrite_ref(id, rewritten);
        Ok(())
    }

    /// Place the target of an external reference into the container, once,
    /// and return its slot key.
    fn inline(&mut self, location: &Location) -> RefResult<String> {
        if let Some(key) = self.slots.get(location) {
            return Ok(key.clone());
        }

        let key = self.bundle_key(location);
        if let Some(first) = self.key_sources.get(&key) {
            return Err(RefError::BundleConflict {
                key,
                first: first.to_string(),
                second: location.to_string(),
            });
        }

        // Register the slot before walking its content: a cycle back to this
        // location rewrites to the slot instead of recursing.
        self.slots.insert(location.clone(), key.clone());
        self.key_sources.insert(key.clone(), location.clone());

        let document = self.cache.get(location).ok_or_else(|| RefError::Resolution {
            pointer: location.pointer().to_string(),
            location: location.display_path(),
        })?;
        let target = self
            .graph
            .walk_pointer(document.root, location.pointer())
            .ok_or_else(|| RefError::Resolution {
                pointer: location.pointer().to_string(),
                location: document.location.display_path(),
            })?;

        debug!(target = %location, key = %key, "inlining external document");
        self.container.insert(key.clone(), target);
        self.walk(target, &document.location)?;
        Ok(key)
    }

    /// Replace the `$ref` string of a pointer node.
    fn rewrite_ref(&mut self, ref_node: NodeId, reference: String) {
        let value_id = match self.graph.node(ref_node) {
            ValueNode::Object(entries) => entries.get("$ref").copied(),
            _ => None,
        };
        if let Some(value_id) = value_id {
            self.graph.replace(value_id, ValueNode::String(reference));
        }
    }

    /// Deterministic key for an external target: the location rendered
    /// relative to the root document where possible, then sanitized, with
    /// pointer tokens appended after `-` separators. The separator must
    /// survive the fragment renderer unescaped; targets that still collide
    /// are a `BundleConflict`.
    fn bundle_key(&self, location: &Location) -> String {
        let relative = self.root_location.url().make_relative(location.url());
        let base = match relative {
            Some(rel) if !rel.is_empty() => rel,
            _ => location.display_path(),
        };
        let mut key = sanitize(&base);
        for token in location.pointer().tokens() {
            key.push('-');
            key.push_str(&sanitize(token));
        }
        key
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Insert the inlined slots under `components/x-inlined` on the root object.
fn attach_container(
    graph: &mut ValueGraph,
    root: NodeId,
    root_location: &Location,
    container: IndexMap<String, NodeId>,
) -> RefResult<()> {
    let not_attachable = || RefError::Resolution {
        pointer: format!("/components/{CONTAINER_KEY}"),
        location: root_location.display_path(),
    };

    let components = {
        let ValueNode::Object(entries) = graph.node(root) else {
            return Err(not_attachable());
        };
        entries.get("components").copied()
    };

    let components = match components {
        Some(id) => {
            if !matches!(graph.node(id), ValueNode::Object(_)) {
                return Err(not_attachable());
            }
            id
        }
        None => {
            let id = graph.push(ValueNode::Object(IndexMap::new()));
            let ValueNode::Object(entries) = graph.node_mut(root) else {
                return Err(not_attachable());
            };
            entries.insert("components".to_string(), id);
            id
        }
    };

    let slot_object = graph.push(ValueNode::Object(container));
    let ValueNode::Object(entries) = graph.node_mut(components) else {
        return Err(not_attachable());
    };
    entries.insert(CONTAINER_KEY.to_string(), slot_object);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_chars() {
        assert_eq!(sanitize("files/text.txt"), "files_text.txt");
        assert_eq!(sanitize("a b#c"), "a_b_c");
        assert_eq!(sanitize("name-v1_2.json"), "name-v1_2.json");
    }
}
