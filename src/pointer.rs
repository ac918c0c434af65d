//! JSON pointer handling (RFC 6901 subset).
//!
//! A pointer is an ordered sequence of string tokens addressing a subtree
//! within one document. Tokens are stored unescaped; `~1` and `~0` escapes
//! are applied only at parse/render boundaries. Array indexing interprets a
//! token as a decimal index when the addressed node is an array.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered pointer path into a document. Empty = the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    /// The document-root pointer.
    pub fn root() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the fragment part of a reference (the text after `#`).
    ///
    /// Accepts `""`, `"/"`, and `"/a/b~1c"` forms. A non-empty fragment that
    /// does not start with `/` is malformed.
    pub fn parse(fragment: &str) -> Result<Self, String> {
        if fragment.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = fragment.strip_prefix('/') else {
            return Err(format!("pointer must start with '/': {fragment:?}"));
        };
        if rest.is_empty() {
            // "#/" addresses the root as well.
            return Ok(Self::root());
        }
        let tokens = rest.split('/').map(unescape_token).collect();
        Ok(Self { tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// A new pointer with one more token appended.
    pub fn child(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        Self { tokens }
    }

    /// Render as a `#/a/b` fragment suitable for a `$ref` string.
    pub fn as_fragment(&self) -> String {
        let mut out = String::from("#");
        for token in &self.tokens {
            out.push('/');
            out.push_str(&escape_token(token));
        }
        out
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tokens.is_empty() {
            return write!(f, "/");
        }
        for token in &self.tokens {
            write!(f, "/{}", escape_token(token))?;
        }
        Ok(())
    }
}

/// Apply RFC 6901 escapes: `~` → `~0`, `/` → `~1`.
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Undo RFC 6901 escapes. Order matters: `~1` before `~0`.
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
