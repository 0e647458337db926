//! Spec Loader: reads the on-disk OpenAPI YAML file, caches the parsed
//! document keyed by the file's mtime, and writes it back atomically.
//!
//! The cache shape mirrors the reference validator cache's double-checked
//! locking: a fast read-lock path checks the cached mtime without blocking
//! writers, and only a miss takes the write lock to reload and re-check.

use crate::error::{OuroborosError, Result};
use crate::spec::model::SpecDoc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;
use tracing::{debug, error, warn};

struct CachedDoc {
    mtime: SystemTime,
    doc: SpecDoc,
}

/// Owns the on-disk spec file and its in-memory cache. Construct one per
/// process and pass it by reference to every caller instead of relying on a
/// process-wide singleton.
pub struct SpecLoader {
    path: PathBuf,
    cache: RwLock<Option<CachedDoc>>,
}

impl SpecLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    fn mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    /// Returns a deep copy of the cached document, reloading from disk if the
    /// file's mtime has changed since the last read.
    pub fn read(&self) -> Result<SpecDoc> {
        let current_mtime = self
            .mtime()
            .ok_or_else(|| OuroborosError::FileMissing(self.path.display().to_string()))?;

        // L1: fast path under a read lock.
        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(cached) = cache.as_ref() {
                if cached.mtime == current_mtime {
                    debug!(path = %self.path.display(), "spec cache hit");
                    return deep_copy(&cached.doc);
                }
            }
        }

        // L2: slow path, reload under a write lock, double-check.
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = cache.as_ref() {
            if cached.mtime == current_mtime {
                return deep_copy(&cached.doc);
            }
        }
        debug!(path = %self.path.display(), "spec cache miss, reloading from disk");
        let doc = self.load_from_disk()?;
        let result = deep_copy(&doc)?;
        *cache = Some(CachedDoc {
            mtime: current_mtime,
            doc,
        });
        Ok(result)
    }

    /// Like [`Self::read`], but returns a skeleton document when the file is
    /// absent instead of failing. Never writes.
    pub fn read_or_create(&self, servers: Vec<String>) -> Result<SpecDoc> {
        match self.read() {
            Ok(doc) => Ok(doc),
            Err(OuroborosError::FileMissing(_)) => Ok(skeleton(servers)),
            Err(e) => Err(e),
        }
    }

    fn load_from_disk(&self) -> Result<SpecDoc> {
        let content = fs::read_to_string(&self.path)
            .map_err(|_| OuroborosError::FileMissing(self.path.display().to_string()))?;
        serde_yaml::from_str::<SpecDoc>(&content)
            .map_err(|e| OuroborosError::FileMalformed(format!("{}: {e}", self.path.display())))
    }

    /// Serialize and write the document, then refresh the cache with the new
    /// mtime so a subsequent read is a cache hit.
    pub fn write(&self, doc: &SpecDoc) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| OuroborosError::Internal(format!("create_dir_all: {e}")))?;
            }
        }
        let yaml = serde_yaml::to_string(doc)
            .map_err(|e| OuroborosError::Internal(format!("serialize spec: {e}")))?;
        fs::write(&self.path, yaml)
            .map_err(|e| OuroborosError::Internal(format!("write spec: {e}")))?;
        let mtime = self.mtime().ok_or_else(|| {
            OuroborosError::Internal("spec file disappeared immediately after write".into())
        })?;
        *cache = Some(CachedDoc {
            mtime,
            doc: deep_copy(doc)?,
        });
        Ok(())
    }

    /// Force the next read to reload from disk.
    pub fn invalidate(&self) {
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cache = None;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn deep_copy(doc: &SpecDoc) -> Result<SpecDoc> {
    match serde_json::to_vec(doc).and_then(|bytes| serde_json::from_slice(&bytes)) {
        Ok(copy) => Ok(copy),
        Err(e) => {
            error!(error = %e, "deep copy of spec failed, falling back to live cache clone");
            warn!("returning aliased clone as a last resort; caller mutation may be observed");
            Ok(doc.clone())
        }
    }
}

fn skeleton(servers: Vec<String>) -> SpecDoc {
    serde_json::json!({
        "openapi": "3.1.0",
        "info": { "title": "ouroboros", "version": "0.1.0" },
        "servers": servers.into_iter().map(|url| serde_json::json!({ "url": url })).collect::<Vec<_>>(),
        "paths": {},
        "components": { "schemas": {}, "securitySchemes": {} },
        "security": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_missing_file_is_fatal() {
        let loader = SpecLoader::new("/nonexistent/path/to/spec.yaml");
        assert!(matches!(loader.read(), Err(OuroborosError::FileMissing(_))));
    }

    #[test]
    fn read_or_create_returns_skeleton_when_missing() {
        let loader = SpecLoader::new("/nonexistent/path/to/spec.yaml");
        let doc = loader.read_or_create(vec!["http://localhost".into()]).unwrap();
        assert_eq!(doc["openapi"], "3.1.0");
        assert!(doc["paths"].as_object().unwrap().is_empty());
    }

    #[test]
    fn read_caches_until_mtime_changes() {
        let file = write_temp("openapi: 3.1.0\npaths: {}\n");
        let loader = SpecLoader::new(file.path());
        let first = loader.read().unwrap();
        let second = loader.read().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn write_then_read_round_trips() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let loader = SpecLoader::new(file.path());
        let doc = serde_json::json!({"openapi": "3.1.0", "paths": {"/x": {}}});
        loader.write(&doc).unwrap();
        let read_back = loader.read().unwrap();
        assert_eq!(read_back["paths"]["/x"], serde_json::json!({}));
    }

    #[test]
    fn deep_copy_is_not_aliased() {
        let file = write_temp("openapi: 3.1.0\npaths: {}\n");
        let loader = SpecLoader::new(file.path());
        let mut copy = loader.read().unwrap();
        copy["paths"]["injected"] = serde_json::json!({});
        let fresh = loader.read().unwrap();
        assert!(fresh["paths"].get("injected").is_none());
    }
}
