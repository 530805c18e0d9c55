//! JSONL document store: one file per collection, one line per document.
//!
//! Every document write is lock-scoped: acquire `<file>.lock`, load the
//! collection, replace the document, write a sibling temp file, rename it
//! over the original and sync the directory. Readers never observe a
//! half-written collection.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::lock::{FileLockGuard, lock_path_for};
use super::{Collection, DocumentStore, Filter, StoreError, document_id};
use crate::id::EntityId;

const WRITER_LOCK_NAME: &str = "writer";

/// Errors reading or rewriting a collection file.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("{path}: {reason}")]
    Corrupt { path: String, reason: &'static str },

    #[error("{collection} line {line}: {message}")]
    Parse {
        collection: &'static str,
        line: usize,
        message: String,
    },

    #[error("{collection} line {line}: document `{id}` appears more than once")]
    DuplicateId {
        collection: &'static str,
        line: usize,
        id: String,
    },

    #[error("{collection}: cannot encode document: {message}")]
    Encode {
        collection: &'static str,
        message: String,
    },
}

fn io_error(path: &Path, err: std::io::Error) -> JsonlError {
    JsonlError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// One collection's backing file.
struct CollectionFile {
    collection: Collection,
    path: PathBuf,
}

impl CollectionFile {
    /// Documents keyed by id. A missing file is an empty collection; blank
    /// lines are ignored.
    fn load(&self) -> Result<BTreeMap<String, Value>, JsonlError> {
        let name = self.collection.as_str();
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(io_error(&self.path, err)),
        };
        let corrupt = |reason| JsonlError::Corrupt {
            path: self.path.display().to_string(),
            reason,
        };
        if bytes.contains(&0) {
            return Err(corrupt("contains NUL byte(s)"));
        }
        let text = String::from_utf8(bytes).map_err(|_| corrupt("is not valid UTF-8"))?;

        let mut documents = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let document: Value = serde_json::from_str(raw).map_err(|e| JsonlError::Parse {
                collection: name,
                line,
                message: e.to_string(),
            })?;
            let id = document
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| JsonlError::Parse {
                    collection: name,
                    line,
                    message: "missing string `id` field".to_string(),
                })?;
            if documents.contains_key(&id) {
                return Err(JsonlError::DuplicateId {
                    collection: name,
                    line,
                    id,
                });
            }
            documents.insert(id, document);
        }
        Ok(documents)
    }

    /// Atomically replace the file with `documents`, in key order.
    fn replace(&self, documents: &BTreeMap<String, Value>) -> Result<(), JsonlError> {
        let mut body = String::new();
        for document in documents.values() {
            let line = serde_json::to_string(document).map_err(|e| JsonlError::Encode {
                collection: self.collection.as_str(),
                message: e.to_string(),
            })?;
            body.push_str(&line);
            body.push('\n');
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(
            ".{}.jsonl.{}.tmp",
            self.collection.as_str(),
            std::process::id()
        ));
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(body.as_bytes())?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&self.path, err));
        }

        File::open(dir)
            .and_then(|handle| handle.sync_all())
            .map_err(|e| io_error(dir, e))
    }
}

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    root: PathBuf,
}

impl JsonlStore {
    /// Open (or lazily create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.jsonl", collection.as_str()))
    }

    pub fn writer_lock_path(&self) -> PathBuf {
        lock_path_for(&self.root.join(WRITER_LOCK_NAME))
    }

    fn file(&self, collection: Collection) -> CollectionFile {
        CollectionFile {
            collection,
            path: self.collection_path(collection),
        }
    }

    /// Lock-scoped load → mutate → atomic rewrite of one collection file.
    fn mutate<T>(
        &self,
        collection: Collection,
        mutator: impl FnOnce(&mut BTreeMap<String, Value>) -> (T, bool),
    ) -> Result<T, StoreError> {
        let file = self.file(collection);
        let _guard = FileLockGuard::acquire(lock_path_for(&file.path))?;
        let mut documents = file.load()?;
        let (value, changed) = mutator(&mut documents);
        if changed {
            file.replace(&documents)?;
        }
        Ok(value)
    }
}

impl DocumentStore for JsonlStore {
    type WriteGuard<'a> = FileLockGuard;

    fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .file(collection)
            .load()?
            .into_values()
            .filter(|doc| filter.matches(doc))
            .collect())
    }

    fn upsert(
        &self,
        collection: Collection,
        id: &EntityId,
        document: Value,
    ) -> Result<(), StoreError> {
        let key = id.to_string();
        if document_id(collection, &document)? != key {
            return Err(StoreError::Malformed {
                collection: collection.as_str(),
                message: format!("document id does not match upsert key {key}"),
            });
        }
        self.mutate(collection, |documents| {
            documents.insert(key, document);
            ((), true)
        })
    }

    fn remove(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError> {
        let key = id.to_string();
        self.mutate(collection, |documents| {
            let existed = documents.remove(&key).is_some();
            (existed, existed)
        })
    }

    fn lock_writes(&self) -> Result<Self::WriteGuard<'_>, StoreError> {
        FileLockGuard::acquire(self.writer_lock_path())
    }
}
