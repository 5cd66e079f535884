// Seen-item store: the durable dedup boundary.
//
// A JSON array of item ids on disk. The set only grows: ids are never
// removed, and adding an id twice is a no-op. Saving replaces the whole file
// (written to a sibling temp file, then renamed over the original), so a
// crash mid-save leaves the previous round's state intact.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access seen-item store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("seen-item store at {path} is not a JSON list of ids: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Ordered, duplicate-free set of item ids already notified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenStore {
    ids: Vec<String>,
    index: HashSet<String>,
}

impl SeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the store at `path`. A missing file is an empty store; unreadable
    /// or malformed content is an error the caller may choose to tolerate.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let ids: Vec<String> =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(ids.into_iter().collect())
    }

    /// Like `load`, but any failure yields an empty store. The error is
    /// handed back so the caller can report it.
    pub fn load_or_empty(path: &Path) -> (Self, Option<StoreError>) {
        match Self::load(path) {
            Ok(store) => (store, None),
            Err(e) => (Self::new(), Some(e)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record `id`. Returns `false` if it was already present.
    pub fn add(&mut self, id: &str) -> bool {
        if self.index.contains(id) {
            return false;
        }
        self.index.insert(id.to_string());
        self.ids.push(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Replace the file at `path` with the full current set.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.ids).map_err(|e| io_err(e.into()))?;

        let tmp = temp_path(path);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for SeenStore {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut store = SeenStore::new();
        for id in iter {
            let id: String = id.into();
            store.add(&id);
        }
        store
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "seen".into());
    name.push(".tmp");
    path.with_file_name(name)
}
