//! Content readers: produce raw bytes for a canonical location.
//!
//! Each reader declares which locations it supports; the registry tries them
//! in fixed priority order and uses the first match. Reader failures (and
//! "no reader matched") surface as `RefError::Read` and are fatal for the
//! enclosing operation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::location::Location;

/// Strategy that can fetch the raw bytes of a document.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Whether this reader can handle the location (by scheme, typically).
    fn supports(&self, location: &Location) -> bool;

    /// Fetch the document's raw bytes. May suspend on I/O.
    async fn read(&self, location: &Location) -> RefResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// FileReader — `file` scheme
// ---------------------------------------------------------------------------

/// Reads `file://` locations from the local filesystem.
#[derive(Debug, Default)]
pub struct FileReader;

#[async_trait]
impl DocumentReader for FileReader {
    fn supports(&self, location: &Location) -> bool {
        location.url().scheme() == "file"
    }

    async fn read(&self, location: &Location) -> RefResult<Vec<u8>> {
        let path = location
            .url()
            .to_file_path()
            .map_err(|_| RefError::read(location, "not a valid file path"))?;
        debug!(path = %path.display(), "reading file");
        tokio::fs::read(&path)
            .await
            .map_err(|e| RefError::read(location, e))
    }
}

// ---------------------------------------------------------------------------
// HttpReader — `http` / `https` schemes
// ---------------------------------------------------------------------------

/// Fetches `http(s)` locations. Carries its own request timeout; the core
/// engine mandates none.
pub struct HttpReader {
    http: reqwest::Client,
}

impl HttpReader {
    pub fn new() -> RefResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RefError::read("<http client>", e))?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DocumentReader for HttpReader {
    fn supports(&self, location: &Location) -> bool {
        matches!(location.url().scheme(), "http" | "https")
    }

    async fn read(&self, location: &Location) -> RefResult<Vec<u8>> {
        debug!(url = %location.url(), "fetching over http");
        let response = self
            .http
            .get(location.url().clone())
            .send()
            .await
            .map_err(|e| RefError::read(location, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefError::read(location, format!("HTTP status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RefError::read(location, e))?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// ReaderRegistry
// ---------------------------------------------------------------------------

/// Ordered collection of readers; first supporting reader wins.
pub struct ReaderRegistry {
    readers: Vec<Box<dyn DocumentReader>>,
}

impl ReaderRegistry {
    /// Default stack: filesystem, then HTTP.
    pub fn standard() -> RefResult<Self> {
        Ok(Self {
            readers: vec![Box::new(FileReader), Box::new(HttpReader::new()?)],
        })
    }

    /// An empty registry, for callers assembling a custom stack.
    pub fn empty() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    /// Append a reader at the lowest priority.
    pub fn push(&mut self, reader: Box<dyn DocumentReader>) {
        self.readers.push(reader);
    }

    /// Fetch bytes via the first reader whose predicate matches.
    pub async fn read(&self, location: &Location) -> RefResult<Vec<u8>> {
        for reader in &self.readers {
            if reader.supports(location) {
                return reader.read(location).await;
            }
        }
        Err(RefError::read(location, "no reader matched this location"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader(Vec<u8>);

    #[async_trait]
    impl DocumentReader for FixedReader {
        fn supports(&self, location: &Location) -> bool {
            location.url().scheme() == "file"
        }

        async fn read(&self, _location: &Location) -> RefResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_priority_order_first_match_wins() {
        let mut registry = ReaderRegistry::empty();
        registry.push(Box::new(FixedReader(b"first".to_vec())));
        registry.push(Box::new(FixedReader(b"second".to_vec())));

        let loc = Location::from_input("file:///specs/root.yaml").expect("loc");
        assert_eq!(registry.read(&loc).await.expect("read"), b"first");
    }

    #[tokio::test]
    async fn test_no_reader_matched() {
        let registry = ReaderRegistry::empty();
        let loc = Location::from_input("file:///specs/root.yaml").expect("loc");
        let err = registry.read(&loc).await.expect_err("must fail");
        assert!(matches!(err, RefError::Read { .. }));
        assert!(err.to_string().contains("no reader matched"));
    }

    #[tokio::test]
    async fn test_file_reader_missing_file() {
        let loc = Location::from_input("file:///definitely/not/here.yaml").expect("loc");
        let err = FileReader.read(&loc).await.expect_err("must fail");
        assert!(matches!(err, RefError::Read { .. }));
    }

    #[tokio::test]
    async fn test_file_reader_reads_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.yaml");
        std::fs::write(&path, b"openapi: 3.0.0\n").expect("write");

        let loc = Location::from_path(&path).expect("loc");
        assert!(FileReader.supports(&loc));
        let bytes = FileReader.read(&loc).await.expect("read");
        assert_eq!(bytes, b"openapi: 3.0.0\n");
    }
}
