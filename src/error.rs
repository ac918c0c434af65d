//! Typed error model for the reference engine.
//!
//! Every failure of a resolve/dereference/bundle operation maps to exactly
//! one `RefError` variant, each carrying the offending location or reference
//! string so callers get one actionable terminal failure. Propagation policy:
//! any error during discovery or loading aborts the whole operation — no
//! partial cache or partial value graph is ever returned.
//!
//! ## Rules
//!
//! - `thiserror` for enum derivation — no manual `Display` impls.
//! - No `.unwrap()` in this module.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type RefResult<T> = Result<T, RefError>;

/// All failure modes of the reference engine.
#[derive(Error, Debug)]
pub enum RefError {
    /// The reference string is empty or malformed.
    #[error("invalid $ref {reference:?} in {document}")]
    InvalidReference { reference: String, document: String },

    /// No reader matched the location, or the matched reader's I/O failed.
    #[error("failed to read {location}: {reason}")]
    Read { location: String, reason: String },

    /// A parser claimed the content and then failed irrecoverably.
    ///
    /// Distinct from "not applicable", which is not an error — an unclaimed
    /// document passes through as raw bytes.
    #[error("failed to parse {location}: {reason}")]
    Parse { location: String, reason: String },

    /// A pointer path does not exist within its target document.
    #[error("pointer {pointer:?} does not exist in {location}")]
    Resolution { pointer: String, location: String },

    /// Two distinct external locations collided under one synthetic
    /// bundle key.
    #[error("bundle key {key:?} maps both {first} and {second}")]
    BundleConflict {
        key: String,
        first: String,
        second: String,
    },

    /// Attempt to export a cyclic value graph (post-dereference) to a tree
    /// format that cannot express cycles.
    #[error("value graph contains a cycle at {path}")]
    CyclicValue { path: String },

    /// An accessor was called before any operation succeeded.
    #[error("no document loaded; run parse, resolve, dereference, or bundle first")]
    NoDocument,
}

impl RefError {
    /// Wrap an I/O or transport failure with the location it occurred at.
    pub fn read(location: impl ToString, reason: impl ToString) -> Self {
        RefError::Read {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a parser failure with the location it occurred at.
    pub fn parse(location: impl ToString, reason: impl ToString) -> Self {
        RefError::Parse {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// All variants must be constructible and produce a non-empty message.
    #[test]
    fn test_all_variants_constructible() {
        let variants: Vec<RefError> = vec![
            RefError::InvalidReference {
                reference: "".into(),
                document: "root.yaml".into(),
            },
            RefError::read("files/missing", "No such file or directory"),
            RefError::parse("bad.json", "expected value at line 1"),
            RefError::Resolution {
                pointer: "/definitions/pet".into(),
                location: "defs.yaml".into(),
            },
            RefError::BundleConflict {
                key: "a_b".into(),
                first: "a/b".into(),
                second: "a-b".into(),
            },
            RefError::CyclicValue {
                path: "/definitions/node".into(),
            },
            RefError::NoDocument,
        ];

        for v in &variants {
            assert!(!v.to_string().is_empty(), "Display must be non-empty: {v:?}");
        }
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = RefError::read("file:///specs/pets.yaml", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("pets.yaml"));
        assert!(msg.contains("connection refused"));

        let err = RefError::Resolution {
            pointer: "/paths/~1pets".into(),
            location: "file:///specs/root.yaml".into(),
        };
        assert!(err.to_string().contains("/paths/~1pets"));
    }
}
