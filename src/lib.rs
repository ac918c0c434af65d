//! refgraph - $ref resolution engine for OpenAPI / JSON Schema documents
//!
//! This crate resolves, dereferences, and bundles the document graph built
//! from `$ref` pointers in a structured API description. A root document may
//! reference other documents (of arbitrary content type) or internal nodes
//! by pointer; referenced documents may recursively reference further
//! documents, including cycles back to already-visited ones.
//!
//! ## Architecture
//! All operations flow through one pipeline:
//! Location Resolver -> Reader Registry -> Parser Registry -> Reference
//! Graph Cache -> Traversal / Dereference / Bundle passes over an
//! arena-backed value graph.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refgraph::RefResolver;
//!
//! # async fn example() -> Result<(), refgraph::RefError> {
//! let mut resolver = RefResolver::new()?;
//! let root = resolver.dereference("specs/petstore.yaml").await?;
//! println!("loaded: {:?}", resolver.refs().map(|r| r.paths()));
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Canonical locations and JSON pointers
pub mod location;
pub mod pointer;

// Arena-backed value graph
pub mod graph;

// Pluggable content acquisition and parsing
pub mod parser;
pub mod reader;

// Reference graph cache ($refs)
pub mod cache;

// Resolution engine and its two transform passes
mod bundle;
mod dereference;
pub mod resolver;

// Public re-exports for the common path
pub use cache::{Document, RefCache};
pub use error::{RefError, RefResult};
pub use graph::{NodeId, ValueGraph, ValueNode};
pub use location::Location;
pub use parser::{ContentParser, Parsed, ParserRegistry};
pub use pointer::Pointer;
pub use reader::{DocumentReader, ReaderRegistry};
pub use resolver::{RefResolver, ResolverOptions};
