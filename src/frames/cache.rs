//! Cross-scan findings cache, keyed by `(frame_id, path, content-hash)`
//! (spec.md §4.4).
//!
//! No `original_source/` module owns this cache directly — the Python
//! source scatters per-frame memoization behind a generic memory manager —
//! so the shape here follows spec.md §4.4's contract literally: disk-backed
//! under `.warden/findings_cache/<frame_id>/`, atomic writes via
//! temp-file-then-rename (the Shared Resources rule in spec.md §5), and a
//! corrupted entry treated as a miss rather than an error. Content hashing
//! uses `blake3` (already in the dependency graph for other content-hash
//! needs) rather than the `sha256` spec.md names literally — both satisfy
//! "any content byte change is a miss"; this crate standardizes on one
//! hash function throughout.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::errors::{Result, WardenError};
use crate::core::model::Finding;

/// Disk-backed cache of prior findings for unchanged `(frame, file)` pairs.
#[derive(Debug, Clone)]
pub struct FindingsCache {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    content_hash: String,
    findings: Vec<Finding>,
}

impl FindingsCache {
    /// Root the cache under `<project_root>/.warden/findings_cache`.
    pub fn new(project_root: &Path) -> Self {
        Self { root: project_root.join(".warden").join("findings_cache") }
    }

    /// `blake3` hex digest of file content, used as the cache-key component
    /// that invalidates on any byte change.
    pub fn content_hash(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }

    fn entry_path(&self, frame_id: &str, file_path: &Path) -> PathBuf {
        let file_key = blake3::hash(file_path.to_string_lossy().as_bytes()).to_hex().to_string();
        self.root.join(frame_id).join(format!("{file_key}.json"))
    }

    /// Look up a cached finding set for `file_path` at `content`'s current
    /// hash. `None` on miss, cache absence, or a corrupted entry (treated
    /// as a miss and silently eligible for replacement on next `store`).
    pub fn get(&self, frame_id: &str, file_path: &Path, content: &str) -> Option<Vec<Finding>> {
        let path = self.entry_path(frame_id, file_path);
        let bytes = fs::read(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(frame_id, path = %file_path.display(), %error, "corrupted findings-cache entry, treating as miss");
                return None;
            }
        };
        let current_hash = Self::content_hash(content);
        if entry.content_hash != current_hash {
            debug!(frame_id, path = %file_path.display(), "findings-cache miss: content changed");
            return None;
        }
        debug!(frame_id, path = %file_path.display(), "findings-cache hit");
        Some(entry.findings)
    }

    /// Store `findings` (may be empty — "frame ran clean" is itself a valid
    /// cached result) for `file_path` at `content`'s current hash. Writes a
    /// temp file in the same directory then renames into place, so a
    /// concurrent reader never observes a partially-written entry.
    pub fn store(&self, frame_id: &str, file_path: &Path, content: &str, findings: &[Finding]) -> Result<()> {
        let path = self.entry_path(frame_id, file_path);
        let dir = path.parent().ok_or_else(|| WardenError::cache("findings-cache entry has no parent directory"))?;
        fs::create_dir_all(dir)?;

        let entry = CacheEntry { content_hash: Self::content_hash(content), findings: findings.to_vec() };
        let serialized = serde_json::to_vec(&entry)?;

        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp_path, &serialized)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_finding() -> Finding {
        use crate::core::model::{Severity, VerificationMetadata};
        Finding {
            id: Finding::new_id("SEC-001"),
            severity: Severity::High,
            message: "test".into(),
            location: "app.py:1".into(),
            detail: "detail".into(),
            code_snippet: "x".into(),
            rule_id: "SEC-001".into(),
            file_path: PathBuf::from("app.py"),
            is_blocker: false,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    #[test]
    fn miss_on_empty_cache() {
        let dir = TempDir::new().unwrap();
        let cache = FindingsCache::new(dir.path());
        assert!(cache.get("security", &PathBuf::from("app.py"), "content").is_none());
    }

    #[test]
    fn hit_after_store_with_same_content() {
        let dir = TempDir::new().unwrap();
        let cache = FindingsCache::new(dir.path());
        let path = PathBuf::from("app.py");
        cache.store("security", &path, "content", &[sample_finding()]).unwrap();
        let hit = cache.get("security", &path, "content");
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().len(), 1);
    }

    #[test]
    fn miss_after_content_changes() {
        let dir = TempDir::new().unwrap();
        let cache = FindingsCache::new(dir.path());
        let path = PathBuf::from("app.py");
        cache.store("security", &path, "old content", &[sample_finding()]).unwrap();
        assert!(cache.get("security", &path, "new content").is_none());
    }

    #[test]
    fn empty_findings_is_a_valid_cached_result() {
        let dir = TempDir::new().unwrap();
        let cache = FindingsCache::new(dir.path());
        let path = PathBuf::from("clean.py");
        cache.store("security", &path, "content", &[]).unwrap();
        let hit = cache.get("security", &path, "content");
        assert_eq!(hit, Some(Vec::new()));
    }

    #[test]
    fn corrupted_entry_treated_as_miss() {
        let dir = TempDir::new().unwrap();
        let cache = FindingsCache::new(dir.path());
        let path = PathBuf::from("app.py");
        let entry_path = cache.entry_path("security", &path);
        fs::create_dir_all(entry_path.parent().unwrap()).unwrap();
        fs::write(&entry_path, b"not json").unwrap();
        assert!(cache.get("security", &path, "content").is_none());
    }
}
