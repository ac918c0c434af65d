//! Canonical document locations and reference resolution.
//!
//! A `Location` is the normalized absolute identity of a document (a `file`,
//! `http`, or `https` URL) plus an optional JSON pointer into it. Two
//! locations are equal iff their normalized URL and pointer path are equal;
//! the cache keys on the document part alone (`Location::document`).

use std::path::Path;

use url::Url;

use crate::error::{RefError, RefResult};
use crate::pointer::Pointer;

/// Canonical absolute identifier for a document plus an optional pointer
/// path addressing a subtree within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    url: Url,
    pointer: Pointer,
}

impl Location {
    /// Build a location from a filesystem path, normalizing it to an
    /// absolute `file://` URL. The file does not need to exist yet.
    pub fn from_path(path: impl AsRef<Path>) -> RefResult<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path)
            .map_err(|e| RefError::read(path.display(), e.to_string()))?;
        let url = Url::from_file_path(&absolute).map_err(|_| {
            RefError::read(absolute.display(), "path is not representable as a file URL")
        })?;
        Ok(Self {
            url,
            pointer: Pointer::root(),
        })
    }

    /// Build a location from user input: an `http(s)` URL, a `file` URL, or
    /// a filesystem path.
    pub fn from_input(input: &str) -> RefResult<Self> {
        if input.is_empty() {
            return Err(RefError::InvalidReference {
                reference: input.to_string(),
                document: "<input>".to_string(),
            });
        }
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => Ok(Self {
                url,
                pointer: Pointer::root(),
            }),
            _ => Self::from_path(input),
        }
    }

    /// Resolve a reference string against the location of the document that
    /// contains it.
    ///
    /// The reference splits on the first `#` into a document part and a
    /// pointer part, parsed independently. An empty document part (a purely
    /// internal `#/...` pointer) resolves against the *containing* document
    /// — including when that document was itself externally loaded. A
    /// non-empty document part follows standard relative-resolution rules
    /// (`.`, `..`, absolute overrides).
    pub fn resolve(reference: &str, base: &Location) -> RefResult<Self> {
        let invalid = || RefError::InvalidReference {
            reference: reference.to_string(),
            document: base.to_string(),
        };

        if reference.is_empty() {
            return Err(invalid());
        }

        let (doc_part, fragment) = match reference.split_once('#') {
            Some((doc, frag)) => (doc, frag),
            None => (reference, ""),
        };
        let pointer = Pointer::parse(fragment).map_err(|_| invalid())?;

        let url = if doc_part.is_empty() {
            base.url.clone()
        } else {
            base.url.join(doc_part).map_err(|_| invalid())?
        };

        Ok(Self { url, pointer })
    }

    /// The document-level identity: same URL, root pointer. Cache key.
    pub fn document(&self) -> Self {
        Self {
            url: self.url.clone(),
            pointer: Pointer::root(),
        }
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The last path segment, used for extension-based parser dispatch.
    pub fn filename(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or("")
    }

    /// Lowercased extension of the last path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.filename();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Human-facing rendering: plain absolute path for `file` locations,
    /// full URL otherwise. This is what `RefCache::paths()` reports.
    pub fn display_path(&self) -> String {
        if self.url.scheme() == "file" {
            if let Ok(path) = self.url.to_file_path() {
                return path.display().to_string();
            }
        }
        self.url.to_string()
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.pointer.is_root() {
            write!(f, "{}", self.display_path())
        } else {
            write!(f, "{}#{}", self.display_path(), self.pointer)
        }
    }
}
