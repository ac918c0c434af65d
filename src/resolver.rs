//! `RefResolver`: the caller-facing engine.
//!
//! Owns the reader/parser stacks and exposes the four operations:
//!
//! - `parse` — load and parse the root document only; referenced documents
//!   are not eagerly loaded (`paths()` afterwards is exactly the root).
//! - `resolve` — depth-first discovery of every reachable document. Sibling
//!   references of a document load concurrently; the cache's single-flight
//!   contract keeps each document read and parsed at most once. Pointer
//!   nodes are left untouched.
//! - `dereference` — discovery, then in-place substitution of every pointer
//!   node with a structural link to its target.
//! - `bundle` — discovery, then inline every external target once and
//!   rewrite pointers to internal form.
//!
//! Each call runs against a fresh cache and value graph scoped to that
//! operation. On failure the operation's partial cache is dropped, never
//! exposed; on success the populated state is kept on the resolver for
//! introspection (`refs()`, `graph()`, `root()`).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::{try_join_all, BoxFuture};
use tracing::{debug, info};

use crate::bundle;
use crate::cache::{Document, RefCache};
use crate::dereference;
use crate::error::{RefError, RefResult};
use crate::graph::{NodeId, ValueGraph, ValueNode};
use crate::location::Location;
use crate::parser::ParserRegistry;
use crate::reader::ReaderRegistry;

/// Reader/parser stacks for a resolver. Push custom strategies onto the
/// registries, or start from `empty()` ones to replace the defaults.
pub struct ResolverOptions {
    pub readers: ReaderRegistry,
    pub parsers: ParserRegistry,
}

impl ResolverOptions {
    /// Filesystem + HTTP readers, YAML/JSON/text parser chain with bytes
    /// passthrough for unclaimed content.
    pub fn standard() -> RefResult<Self> {
        Ok(Self {
            readers: ReaderRegistry::standard()?,
            parsers: ParserRegistry::standard(),
        })
    }
}

/// Reference resolution engine. See the module docs for the operations.
pub struct RefResolver {
    readers: ReaderRegistry,
    parsers: ParserRegistry,
    state: Option<OpState>,
}

/// Result of one successful operation.
struct OpState {
    graph: ValueGraph,
    cache: RefCache,
    root: NodeId,
    location: Location,
}

impl RefResolver {
    /// Resolver with the standard reader and parser stacks.
    pub fn new() -> RefResult<Self> {
        Ok(Self::with_options(ResolverOptions::standard()?))
    }

    pub fn with_options(options: ResolverOptions) -> Self {
        Self {
            readers: options.readers,
            parsers: options.parsers,
            state: None,
        }
    }

    /// Load and parse the root document. No referenced document is loaded.
    pub async fn parse(&mut self, input: &str) -> RefResult<NodeId> {
        self.state = None;
        let location = Location::from_input(input)?;
        info!(root = %location, "parse");

        let ctx = OpContext::new(&self.readers, &self.parsers);
        let document = ctx.load(&location).await?;
        let root = document.root;
        self.state = Some(ctx.commit(root, document.location.clone()));
        Ok(root)
    }

    /// Discover and load every document reachable from the root. Pointer
    /// nodes remain in the value graph; the cache is fully populated.
    pub async fn resolve(&mut self, input: &str) -> RefResult<NodeId> {
        self.state = None;
        let location = Location::from_input(input)?;
        info!(root = %location, "resolve");

        let ctx = OpContext::new(&self.readers, &self.parsers);
        let document = ctx.load(&location).await?;
        ctx.discover(Arc::clone(&document)).await?;
        let root = document.root;
        self.state = Some(ctx.commit(root, document.location.clone()));
        Ok(root)
    }

    /// Resolve, then replace every pointer node with a structural link to
    /// its target. Returns the same root handle the plain parse produced.
    pub async fn dereference(&mut self, input: &str) -> RefResult<NodeId> {
        self.state = None;
        let location = Location::from_input(input)?;
        info!(root = %location, "dereference");

        let ctx = OpContext::new(&self.readers, &self.parsers);
        let document = ctx.load(&location).await?;
        ctx.discover(Arc::clone(&document)).await?;
        let mut state = ctx.commit(document.root, document.location.clone());
        dereference::run(&mut state.graph, &state.cache, state.root, &state.location)?;
        let root = state.root;
        self.state = Some(state);
        Ok(root)
    }

    /// Resolve, then produce a single self-contained document: external
    /// targets inlined once under `#/components/x-inlined/…`, pointers
    /// rewritten to internal form.
    pub async fn bundle(&mut self, input: &str) -> RefResult<NodeId> {
        self.state = None;
        let location = Location::from_input(input)?;
        info!(root = %location, "bundle");

        let ctx = OpContext::new(&self.readers, &self.parsers);
        let document = ctx.load(&location).await?;
        ctx.discover(Arc::clone(&document)).await?;
        let mut state = ctx.commit(document.root, document.location.clone());
        bundle::run(&mut state.graph, &state.cache, state.root, &state.location)?;
        let root = state.root;
        self.state = Some(state);
        Ok(root)
    }

    /// The reference cache of the last successful operation.
    pub fn refs(&self) -> Option<&RefCache> {
        self.state.as_ref().map(|s| &s.cache)
    }

    /// The value graph of the last successful operation.
    pub fn graph(&self) -> Option<&ValueGraph> {
        self.state.as_ref().map(|s| &s.graph)
    }

    /// Root node of the last successful operation.
    pub fn root(&self) -> Option<NodeId> {
        self.state.as_ref().map(|s| s.root)
    }

    /// Canonical location of the root document.
    pub fn root_location(&self) -> Option<&Location> {
        self.state.as_ref().map(|s| &s.location)
    }

    /// Export the current root value as a JSON tree. Fails with `NoDocument`
    /// before any successful operation, and with `CyclicValue` if
    /// dereferencing produced a cyclic graph.
    pub fn value(&self) -> RefResult<serde_json::Value> {
        let state = self.state.as_ref().ok_or(RefError::NoDocument)?;
        state.graph.to_json(state.root)
    }
}

// ---------------------------------------------------------------------------
// OpContext — per-operation load/discovery state
// ---------------------------------------------------------------------------

struct OpContext<'a> {
    readers: &'a ReaderRegistry,
    parsers: &'a ParserRegistry,
    graph: Mutex<ValueGraph>,
    cache: RefCache,
    /// Documents whose traversal has started, including those still on the
    /// call stack. Distinct from "fully loaded" (the cache): a circular
    /// document reference must not be re-entered even while its own
    /// traversal is in progress.
    in_traversal: Mutex<HashSet<Location>>,
}

impl<'a> OpContext<'a> {
    fn new(readers: &'a ReaderRegistry, parsers: &'a ParserRegistry) -> Self {
        Self {
            readers,
            parsers,
            graph: Mutex::new(ValueGraph::new()),
            cache: RefCache::new(),
            in_traversal: Mutex::new(HashSet::new()),
        }
    }

    /// Read + parse a document through the cache (single-flight, idempotent).
    async fn load(&self, location: &Location) -> RefResult<Arc<Document>> {
        self.cache
            .get_or_load(location, || async {
                let key = location.document();
                let bytes = self.readers.read(&key).await?;
                let root = {
                    let mut graph = self.graph.lock().expect("value graph poisoned");
                    self.parsers.parse(&key, &bytes, &mut graph)?
                };
                Ok(Document {
                    content_type: key.extension(),
                    location: key,
                    bytes,
                    root,
                })
            })
            .await
    }

    /// Depth-first discovery of every document reachable from `document`.
    /// Sibling references load concurrently; each branch finishes traversing
    /// its newly loaded document before returning.
    fn discover(&self, document: Arc<Document>) -> BoxFuture<'_, RefResult<()>> {
        Box::pin(async move {
            {
                let mut in_traversal = self.in_traversal.lock().expect("traversal set poisoned");
                if !in_traversal.insert(document.location.clone()) {
                    return Ok(());
                }
            }

            let references = {
                let graph = self.graph.lock().expect("value graph poisoned");
                collect_refs(&graph, document.root)
            };
            if references.is_empty() {
                return Ok(());
            }
            debug!(document = %document.location, count = references.len(), "discovered references");

            let branches = references.into_iter().map(|reference| {
                let base = document.location.clone();
                async move {
                    let target = Location::resolve(&reference, &base)?;
                    let child = self.load(&target).await?;
                    self.discover(child).await
                }
            });
            try_join_all(branches).await?;
            Ok(())
        })
    }

    fn commit(self, root: NodeId, location: Location) -> OpState {
        OpState {
            graph: self.graph.into_inner().expect("value graph poisoned"),
            cache: self.cache,
            root,
            location,
        }
    }
}

/// All reference strings in a parsed (tree-shaped) subtree, in document
/// order. Duplicates are kept; the cache deduplicates loads.
fn collect_refs(graph: &ValueGraph, root: NodeId) -> Vec<String> {
    let mut out = Vec::new();
    visit(graph, root, &mut out);
    return out;

    fn visit(graph: &ValueGraph, id: NodeId, out: &mut Vec<String>) {
        match graph.node(id) {
            ValueNode::Object(entries) => {
                if let Some(reference) = graph.ref_target(id) {
                    out.push(reference.to_string());
                }
                for child in entries.values() {
                    visit(graph, *child, out);
                }
            }
            ValueNode::Array(items) => {
                for child in items {
                    visit(graph, *child, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_fixture(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    #[tokio::test]
    async fn test_parse_loads_only_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = write_fixture(
            dir.path(),
            "root.yaml",
            "info:\n  title: Test\npaths:\n  /x:\n    $ref: other.yaml\n",
        );
        write_fixture(dir.path(), "other.yaml", "get: {}\n");

        let mut resolver = RefResolver::new().expect("resolver");
        resolver
            .parse(root.to_str().expect("utf8 path"))
            .await
            .expect("parse");

        let paths = resolver.refs().expect("refs").paths();
        assert_eq!(paths, vec![root.display().to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_discovers_transitively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = write_fixture(dir.path(), "root.yaml", "a:\n  $ref: mid.yaml\n");
        write_fixture(dir.path(), "mid.yaml", "b:\n  $ref: leaf.yaml#/x\n");
        write_fixture(dir.path(), "leaf.yaml", "x: 42\n");

        let mut resolver = RefResolver::new().expect("resolver");
        resolver
            .resolve(root.to_str().expect("utf8 path"))
            .await
            .expect("resolve");

        let paths = resolver.refs().expect("refs").paths();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("root.yaml"));
        assert!(paths[1].ends_with("mid.yaml"));
        assert!(paths[2].ends_with("leaf.yaml"));

        // Pointer nodes are untouched by resolve.
        let value = resolver.value().expect("export");
        assert_eq!(value["a"], json!({"$ref": "mid.yaml"}));
    }

    #[tokio::test]
    async fn test_duplicate_references_load_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = write_fixture(
            dir.path(),
            "root.yaml",
            "a:\n  $ref: shared.yaml\nb:\n  $ref: shared.yaml\nc:\n  $ref: shared.yaml#/k\n",
        );
        write_fixture(dir.path(), "shared.yaml", "k: v\n");

        let mut resolver = RefResolver::new().expect("resolver");
        resolver
            .resolve(root.to_str().expect("utf8 path"))
            .await
            .expect("resolve");

        let paths = resolver.refs().expect("refs").paths();
        assert_eq!(paths.len(), 2, "shared.yaml must appear exactly once");
    }

    #[tokio::test]
    async fn test_missing_reference_fails_with_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = write_fixture(dir.path(), "root.yaml", "a:\n  $ref: missing.yaml\n");

        let mut resolver = RefResolver::new().expect("resolver");
        let err = resolver
            .resolve(root.to_str().expect("utf8 path"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, RefError::Read { .. }));

        // No partial cache is observable after a failed operation.
        assert!(resolver.refs().is_none());
    }

    #[test]
    fn test_value_before_any_operation_is_no_document() {
        let resolver = RefResolver::new().expect("resolver");
        let err = resolver.value().expect_err("no state yet");
        assert!(matches!(err, RefError::NoDocument));
        assert_eq!(
            err.to_string(),
            "no document loaded; run parse, resolve, dereference, or bundle first"
        );
    }

    #[tokio::test]
    async fn test_circular_document_references_terminate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = write_fixture(dir.path(), "a.yaml", "to_b:\n  $ref: b.yaml\n");
        write_fixture(dir.path(), "b.yaml", "to_a:\n  $ref: a.yaml\n");

        let mut resolver = RefResolver::new().expect("resolver");
        resolver
            .resolve(root.to_str().expect("utf8 path"))
            .await
            .expect("resolve");
        assert_eq!(resolver.refs().expect("refs").paths().len(), 2);
    }
}
