//! In-memory binary objects and the references handed out for them.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Assembled recording bytes tagged with their MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    mime_type: String,
    data: Vec<u8>,
}

impl Blob {
    /// Concatenate `chunks` in order.
    pub fn assemble(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        let mut data = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reference to a blob held by a [`BlobStore`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owns blobs until their reference is released.
#[derive(Debug, Default)]
pub struct BlobStore {
    next_id: u64,
    blobs: HashMap<BlobUrl, Blob>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_ref(&mut self, blob: Blob) -> BlobUrl {
        self.next_id += 1;
        let url = BlobUrl(format!("blob:live-detect/{}", self.next_id));
        self.blobs.insert(url.clone(), blob);
        url
    }

    /// Drop the blob behind `url`. Returns `false` for unknown references.
    pub fn release(&mut self, url: &BlobUrl) -> bool {
        self.blobs.remove(url).is_some()
    }

    pub fn get(&self, url: &BlobUrl) -> Option<&Blob> {
        self.blobs.get(url)
    }

    /// Write the blob behind `url` to `path`.
    pub fn save(&self, url: &BlobUrl, path: &Path) -> Result<()> {
        let blob = self
            .get(url)
            .ok_or_else(|| anyhow!("{} was released", url))?;
        std::fs::write(path, blob.bytes())
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_chunks_in_order() {
        let blob = Blob::assemble(vec![vec![1, 2], vec![], vec![3]], "video/mp4");
        assert_eq!(blob.bytes(), &[1, 2, 3]);
        assert_eq!(blob.mime_type(), "video/mp4");
    }

    #[test]
    fn released_refs_are_gone() {
        let mut store = BlobStore::new();
        let first = store.create_ref(Blob::assemble(vec![vec![1]], "video/mp4"));
        let second = store.create_ref(Blob::assemble(Vec::new(), "video/mp4"));
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);

        assert!(store.release(&first));
        assert!(!store.release(&first));
        assert!(store.get(&first).is_none());
        assert!(store.get(&second).is_some_and(Blob::is_empty));
    }
}
