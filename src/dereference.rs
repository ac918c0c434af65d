//! Dereference engine: replace every pointer node with a structural link to
//! the value it designates.
//!
//! Runs over an already-populated cache and rewrites edges in the arena, in
//! place — the substituted target is linked, never copied, so repeated
//! references alias one node and self-referential documents produce genuine
//! cycles instead of unbounded expansion. Cycle safety comes from a
//! per-operation "currently resolving" set keyed by target location +
//! pointer path: a target already being resolved higher in the call stack is
//! linked to directly, because in-place substitution means the raw target
//! node *is* the eventual output.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::cache::RefCache;
use crate::error::{RefError, RefResult};
use crate::graph::{NodeId, ValueGraph, ValueNode};
use crate::location::Location;

/// Dereference the value graph rooted at `root`, in place. The root node's
/// identity is preserved: callers holding `root` observe the substituted
/// graph through the same handle.
pub(crate) fn run(
    graph: &mut ValueGraph,
    cache: &RefCache,
    root: NodeId,
    root_location: &Location,
) -> RefResult<()> {
    let mut pass = Dereferencer {
        graph,
        cache,
        resolved: HashMap::new(),
        resolving: HashMap::new(),
        done: HashSet::new(),
    };

    // A root that is itself a pointer node has no parent edge to rewrite;
    // its contents are overwritten in place to keep the handle stable.
    if let Some(reference) = pass.graph.ref_target(root).map(str::to_string) {
        let (target, _) = pass.resolve_ref(&reference, root_location)?;
        let node = pass.graph.node(target).clone();
        pass.graph.replace(root, node);
        pass.done.insert(root);
        return Ok(());
    }

    pass.substitute(root, root_location)
}

enum Edge {
    Key(String, NodeId),
    Index(usize, NodeId),
}

struct Dereferencer<'a> {
    graph: &'a mut ValueGraph,
    cache: &'a RefCache,
    /// Fully substituted targets: location+pointer → (node, owning document).
    resolved: HashMap<Location, (NodeId, Location)>,
    /// Targets being substituted higher in the current call stack.
    resolving: HashMap<Location, NodeId>,
    /// Nodes whose outgoing edges have been rewritten already. Shared and
    /// cyclic nodes are visited exactly once.
    done: HashSet<NodeId>,
}

impl Dereferencer<'_> {
    /// Rewrite every pointer-node edge under `id`. `base` is the location of
    /// the document containing these nodes; references resolve against it.
    fn substitute(&mut self, id: NodeId, base: &Location) -> RefResult<()> {
        if !self.done.insert(id) {
            return Ok(());
        }

        let edges: Vec<Edge> = match self.graph.node(id) {
            ValueNode::Object(entries) => entries
                .iter()
                .map(|(k, v)| Edge::Key(k.clone(), *v))
                .collect(),
            ValueNode::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| Edge::Index(i, *v))
                .collect(),
            _ => return Ok(()),
        };

        for edge in edges {
            let child = match &edge {
                Edge::Key(_, child) | Edge::Index(_, child) => *child,
            };
            match self.graph.ref_target(child).map(str::to_string) {
                Some(reference) => {
                    let (target, _) = self.resolve_ref(&reference, base)?;
                    match (self.graph.node_mut(id), edge) {
                        (ValueNode::Object(entries), Edge::Key(key, _)) => {
                            entries.insert(key, target);
                        }
                        (ValueNode::Array(items), Edge::Index(index, _)) => {
                            items[index] = target;
                        }
                        _ => {}
                    }
                }
                None => self.substitute(child, base)?,
            }
        }
        Ok(())
    }

    /// Resolve a reference string to the node it designates, substituting
    /// inside the target first. Returns the node and the location of the
    /// document that owns it.
    fn resolve_ref(&mut self, reference: &str, base: &Location) -> RefResult<(NodeId, Location)> {
        let location = Location::resolve(reference, base)?;

        if let Some((node, owner)) = self.resolved.get(&location) {
            return Ok((*node, owner.clone()));
        }
        if let Some(placeholder) = self.resolving.get(&location) {
            // Cycle: the raw target node is mid-substitution; linking to it
            // is exactly the aliasing the output needs.
            debug!(target = %location, "cyclic $ref, linking to in-progress target");
            return Ok((*placeholder, location.document()));
        }

        let document = self.cache.get(&location).ok_or_else(|| RefError::Resolution {
            pointer: location.pointer().to_string(),
            location: location.display_path(),
        })?;

        // Walk the pointer path, resolving any intermediate pointer node the
        // path crosses before stepping into it.
        let mut current = document.root;
        let mut owner = document.location.clone();
        for token in location.pointer().tokens() {
            if let Some(inner) = self.graph.ref_target(current).map(str::to_string) {
                let (node, node_owner) = self.resolve_ref(&inner, &owner)?;
                current = node;
                owner = node_owner;
            }
            let next = match self.graph.node(current) {
                ValueNode::Object(entries) => entries.get(token.as_str()).copied(),
                ValueNode::Array(items) => {
                    token.parse::<usize>().ok().and_then(|i| items.get(i).copied())
                }
                _ => None,
            };
            current = next.ok_or_else(|| RefError::Resolution {
                pointer: location.pointer().to_string(),
                location: document.location.display_path(),
            })?;
        }

        self.resolving.insert(location.clone(), current);
        let outcome = if let Some(next) = self.graph.ref_target(current).map(str::to_string) {
            // Pointer chain: collapse to the final target.
            self.resolve_ref(&next, &owner)
        } else {
            self.substitute(current, &owner).map(|()| (current, owner))
        };
        self.resolving.remove(&location);

        let (node, node_owner) = outcome?;
        self.resolved
            .insert(location, (node, node_owner.clone()));
        Ok((node, node_owner))
    }
}
