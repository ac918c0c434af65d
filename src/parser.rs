//! Content parsers: turn raw bytes into value-graph nodes.
//!
//! Each parser may claim content (by extension or sniffing) and produce a
//! structured node, or signal "not applicable" — a sentinel distinct from
//! error. The registry tries parsers in priority order and guarantees
//! exactly one terminal outcome: a parsed node, or the raw bytes unchanged
//! (passthrough). Passthrough is what lets the rest of the engine treat an
//! opaque blob (binary image, empty file, arbitrary markup) like any other
//! document: downstream consumers receive the bytes as the value.

use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::graph::{NodeId, ValueGraph, ValueNode};
use crate::location::Location;

/// Outcome of one parser's attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    /// The parser claimed the content and produced this node.
    Node(NodeId),
    /// The parser does not claim this content. Not an error.
    NotApplicable,
}

/// Strategy that may turn raw bytes into a value node.
pub trait ContentParser: Send + Sync {
    /// Attempt to parse. Returns `NotApplicable` when the content is not
    /// claimed; returns `Err` only when the content was claimed and parsing
    /// then failed irrecoverably.
    fn try_parse(
        &self,
        location: &Location,
        bytes: &[u8],
        graph: &mut ValueGraph,
    ) -> RefResult<Parsed>;
}

// ---------------------------------------------------------------------------
// YamlParser — .yaml / .yml / .json (YAML is a JSON superset)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct YamlParser;

impl ContentParser for YamlParser {
    fn try_parse(
        &self,
        location: &Location,
        bytes: &[u8],
        graph: &mut ValueGraph,
    ) -> RefResult<Parsed> {
        match location.extension().as_deref() {
            Some("yaml" | "yml" | "json") => {}
            _ => return Ok(Parsed::NotApplicable),
        }
        // An empty .yaml file is a valid document whose value is null.
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Parsed::Node(graph.push(ValueNode::Null)));
        }
        let value: serde_json::Value =
            serde_yaml::from_slice(bytes).map_err(|e| RefError::parse(location, e))?;
        Ok(Parsed::Node(graph.import_json(value)))
    }
}

// ---------------------------------------------------------------------------
// JsonParser — sniffed JSON for locations without a claimed extension
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct JsonParser;

impl ContentParser for JsonParser {
    fn try_parse(
        &self,
        location: &Location,
        bytes: &[u8],
        graph: &mut ValueGraph,
    ) -> RefResult<Parsed> {
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        if !matches!(first, Some(b'{') | Some(b'[')) {
            return Ok(Parsed::NotApplicable);
        }
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| RefError::parse(location, e))?;
        Ok(Parsed::Node(graph.import_json(value)))
    }
}

// ---------------------------------------------------------------------------
// TextParser — known text extensions, UTF-8 only
// ---------------------------------------------------------------------------

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "htm", "html", "md", "xml", "js", "min", "css", "csv",
];

#[derive(Debug, Default)]
pub struct TextParser;

impl ContentParser for TextParser {
    fn try_parse(
        &self,
        location: &Location,
        bytes: &[u8],
        graph: &mut ValueGraph,
    ) -> RefResult<Parsed> {
        let claimed = location
            .extension()
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()));
        if !claimed {
            return Ok(Parsed::NotApplicable);
        }
        // Content that is not valid UTF-8 falls through to passthrough
        // rather than erroring: the extension was a hint, not a claim on
        // the encoding.
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(Parsed::Node(graph.push(ValueNode::String(text.to_string())))),
            Err(_) => Ok(Parsed::NotApplicable),
        }
    }
}

// ---------------------------------------------------------------------------
// BinaryParser — explicit passthrough
// ---------------------------------------------------------------------------

/// Claims everything and yields the raw bytes. The registry already falls
/// back to passthrough when nothing claims, so this is only useful as an
/// explicit cutoff in a custom chain (parsers behind it never run).
#[derive(Debug, Default)]
pub struct BinaryParser;

impl ContentParser for BinaryParser {
    fn try_parse(
        &self,
        _location: &Location,
        bytes: &[u8],
        graph: &mut ValueGraph,
    ) -> RefResult<Parsed> {
        Ok(Parsed::Node(graph.push(ValueNode::Bytes(bytes.to_vec()))))
    }
}

// ---------------------------------------------------------------------------
// ParserRegistry
// ---------------------------------------------------------------------------

/// Ordered collection of parsers. Structured-data parsers come before
/// generic text before binary passthrough.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn ContentParser>>,
}

impl ParserRegistry {
    /// Default chain: YAML/JSON by extension, sniffed JSON, text. Unclaimed
    /// content hits the registry's passthrough, so parsers pushed onto the
    /// standard chain still get their turn.
    pub fn standard() -> Self {
        Self {
            parsers: vec![
                Box::new(YamlParser),
                Box::new(JsonParser),
                Box::new(TextParser),
            ],
        }
    }

    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Append a parser at the lowest priority.
    pub fn push(&mut self, parser: Box<dyn ContentParser>) {
        self.parsers.push(parser);
    }

    /// Parse bytes through the chain. Exactly one terminal outcome: the
    /// first claiming parser's node, or — when nothing claims — the raw
    /// bytes as a passthrough node.
    pub fn parse(
        &self,
        location: &Location,
        bytes: &[u8],
        graph: &mut ValueGraph,
    ) -> RefResult<NodeId> {
        for parser in &self.parsers {
            match parser.try_parse(location, bytes, graph)? {
                Parsed::Node(id) => return Ok(id),
                Parsed::NotApplicable => continue,
            }
        }
        debug!(location = %location, "no parser claimed content, passing bytes through");
        Ok(graph.push(ValueNode::Bytes(bytes.to_vec())))
    }
}
