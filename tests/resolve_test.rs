//! Discovery contracts: at-most-once loading under concurrent branches,
//! first-discovery ordering, and pluggable reader/parser stacks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use refgraph::reader::FileReader;
use refgraph::{
    ContentParser, DocumentReader, Location, Parsed, ParserRegistry, ReaderRegistry, RefResolver,
    RefResult, ResolverOptions, ValueNode,
};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    path.display().to_string()
}

/// Filesystem reader that counts how many reads actually hit the disk.
struct CountingReader {
    inner: FileReader,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentReader for CountingReader {
    fn supports(&self, location: &Location) -> bool {
        self.inner.supports(location)
    }

    async fn read(&self, location: &Location) -> RefResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(location).await
    }
}

fn counting_resolver(reads: Arc<AtomicUsize>) -> RefResolver {
    let mut readers = ReaderRegistry::empty();
    readers.push(Box::new(CountingReader {
        inner: FileReader,
        reads,
    }));
    RefResolver::with_options(ResolverOptions {
        readers,
        parsers: ParserRegistry::standard(),
    })
}

#[tokio::test]
async fn each_document_is_read_exactly_once() {
    let dir = TempDir::new().expect("tempdir");
    // Ten sibling references to the same document discover it concurrently.
    let mut body = String::new();
    for i in 0..10 {
        body.push_str(&format!("p{i}:\n  $ref: shared.yaml\n"));
    }
    let root_path = write(&dir, "root.yaml", &body);
    write(&dir, "shared.yaml", "k: v\n");

    let reads = Arc::new(AtomicUsize::new(0));
    let mut resolver = counting_resolver(Arc::clone(&reads));
    resolver.resolve(&root_path).await.expect("resolve");

    assert_eq!(reads.load(Ordering::SeqCst), 2, "root + shared, nothing twice");

    let paths = resolver.refs().expect("refs").paths();
    assert_eq!(paths.len(), 2);
    let unique: std::collections::HashSet<_> = paths.iter().collect();
    assert_eq!(unique.len(), paths.len(), "paths() has no duplicates");
}

#[tokio::test]
async fn paths_order_follows_first_discovery() {
    let dir = TempDir::new().expect("tempdir");
    let root_path = write(
        &dir,
        "root.yaml",
        concat!(
            "a:\n",
            "  $ref: third.yaml\n",
            "b:\n",
            "  $ref: fourth.yaml\n",
            "c:\n",
            "  $ref: third.yaml\n",
        ),
    );
    write(&dir, "third.yaml", "x: 1\n");
    write(&dir, "fourth.yaml", "y: 2\n");

    let mut resolver = RefResolver::new().expect("resolver");
    resolver.resolve(&root_path).await.expect("resolve");

    let paths = resolver.refs().expect("refs").paths();
    assert_eq!(paths.len(), 3);
    assert!(paths[0].ends_with("root.yaml"));
    assert!(paths[1].ends_with("third.yaml"), "document order wins");
    assert!(paths[2].ends_with("fourth.yaml"));
}

#[tokio::test]
async fn no_reader_for_scheme_fails_the_operation() {
    let dir = TempDir::new().expect("tempdir");
    let root_path = write(&dir, "root.yaml", "a:\n  $ref: https://example.invalid/defs.yaml\n");

    // File-only reader stack: the https reference has no reader.
    let mut readers = ReaderRegistry::empty();
    readers.push(Box::new(FileReader));
    let mut resolver = RefResolver::with_options(ResolverOptions {
        readers,
        parsers: ParserRegistry::standard(),
    });

    let err = resolver.resolve(&root_path).await.expect_err("must fail");
    assert!(err.to_string().contains("no reader matched"));
    assert!(resolver.refs().is_none());
}

/// Parser that claims `.props` files holding `key=value` lines.
struct PropsParser;

impl ContentParser for PropsParser {
    fn try_parse(
        &self,
        location: &Location,
        bytes: &[u8],
        graph: &mut refgraph::ValueGraph,
    ) -> RefResult<Parsed> {
        if location.extension().as_deref() != Some("props") {
            return Ok(Parsed::NotApplicable);
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|e| refgraph::RefError::Parse {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
        let mut entries = serde_json::Map::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let (k, v) = line.split_once('=').ok_or_else(|| refgraph::RefError::Parse {
                location: location.to_string(),
                reason: format!("bad line {line:?}"),
            })?;
            entries.insert(k.trim().to_string(), serde_json::json!(v.trim()));
        }
        Ok(Parsed::Node(
            graph.import_json(serde_json::Value::Object(entries)),
        ))
    }
}

#[tokio::test]
async fn custom_parser_participates_in_dispatch() {
    let dir = TempDir::new().expect("tempdir");
    let root_path = write(&dir, "root.yaml", "cfg:\n  $ref: app.props\n");
    write(&dir, "app.props", "name = demo\nport = 8080\n");

    let mut parsers = ParserRegistry::standard();
    parsers.push(Box::new(PropsParser));
    let mut resolver = RefResolver::with_options(ResolverOptions {
        readers: ReaderRegistry::standard().expect("readers"),
        parsers,
    });

    resolver.dereference(&root_path).await.expect("dereference");
    assert_eq!(
        resolver.value().expect("export")["cfg"],
        serde_json::json!({"name": "demo", "port": "8080"})
    );
}

#[tokio::test]
async fn unclaimed_extension_passes_through_as_bytes() {
    let dir = TempDir::new().expect("tempdir");
    let root_path = write(&dir, "root.yaml", "blob:\n  $ref: data.props\n");
    write(&dir, "data.props", "whatever");

    // Without the custom parser, .props is unclaimed and passes through.
    let mut resolver = RefResolver::new().expect("resolver");
    let root = resolver.dereference(&root_path).await.expect("dereference");
    let graph = resolver.graph().expect("graph");
    let blob = graph
        .walk_pointer(root, &refgraph::Pointer::from_tokens(["blob"]))
        .expect("blob");
    assert_eq!(graph.node(blob), &ValueNode::Bytes(b"whatever".to_vec()));
}
