//! Content lookup by content identifier.
//!
//! Text blobs live under a root directory as `<cid>.txt`. Identifiers are
//! restricted to `[A-Za-z0-9_-]` so that a lookup can never leave the root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::error::DetailsError;

/// Default content root, relative to the working directory.
pub const DEFAULT_CONTENT_ROOT: &str = "data";

/// A directory of text blobs addressed by content identifier.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_ROOT)
    }
}

impl ContentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the blob for every cid, in order.
    ///
    /// All identifiers are checked before anything is read. Every missing
    /// blob is reported in a single [`DetailsError::NotFound`].
    pub fn get_details<S: AsRef<str>>(&self, cids: &[S]) -> Result<Vec<String>, DetailsError> {
        for cid in cids {
            validate_cid(cid.as_ref())?;
        }

        let mut details = Vec::with_capacity(cids.len());
        let mut missing = Vec::new();
        for cid in cids {
            let cid = cid.as_ref();
            match fs::read_to_string(self.root.join(format!("{cid}.txt"))) {
                Ok(text) => details.push(text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => missing.push(cid.to_string()),
                Err(e) => {
                    return Err(DetailsError::Io {
                        cid: cid.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }

        if missing.is_empty() {
            Ok(details)
        } else {
            Err(DetailsError::NotFound(missing))
        }
    }
}

fn validate_cid(cid: &str) -> Result<(), DetailsError> {
    let valid = !cid.is_empty()
        && cid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DetailsError::InvalidCid(cid.to_string()))
    }
}

impl Engine {
    /// Reads the text blobs for `cids` from the engine's content store.
    #[tracing::instrument(skip(self, cids), fields(cids = cids.len()))]
    pub fn get_details<S: AsRef<str>>(&self, cids: &[S]) -> Result<Vec<String>, DetailsError> {
        self.content.get_details(cids).map_err(|e| {
            tracing::debug!(error = %e, "content lookup failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_content_root() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "vectorbase_test_content_{}_{}",
            std::process::id(),
            id
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_reads_in_order() {
        let root = temp_content_root();
        fs::write(root.join("a1.txt"), "first").unwrap();
        fs::write(root.join("b-2.txt"), "second").unwrap();

        let store = ContentStore::new(&root);
        assert_eq!(
            store.get_details(&["b-2", "a1"]).unwrap(),
            vec!["second".to_string(), "first".to_string()]
        );

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_cids_reported_together() {
        let root = temp_content_root();
        fs::write(root.join("a1.txt"), "first").unwrap();

        let err = ContentStore::new(&root)
            .get_details(&["x", "a1", "y"])
            .unwrap_err();
        assert!(matches!(
            err,
            DetailsError::NotFound(ref missing) if missing == &["x".to_string(), "y".to_string()]
        ));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_rejects_path_escapes() {
        let store = ContentStore::new(temp_content_root());
        for cid in ["../secret", "a/b", "", "a.txt", "a b"] {
            assert!(
                matches!(store.get_details(&[cid]), Err(DetailsError::InvalidCid(_))),
                "{cid:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_request() {
        let store = ContentStore::new(temp_content_root());
        let none: [&str; 0] = [];
        assert!(store.get_details(&none).unwrap().is_empty());
    }
}
