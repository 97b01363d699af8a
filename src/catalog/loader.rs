//! Catalog providers
//!
//! The pool is loaded once before a session starts and never changes while
//! it runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::catalog::candidate::Candidate;
use crate::error::CatalogError;

/// Supplies the full pool of candidates
pub trait CatalogProvider: Send + Sync {
    fn list_all(&self) -> Vec<Candidate>;
}

/// Fixed in-memory pool
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    candidates: Vec<Candidate>,
}

impl StaticCatalog {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: dedup_by_id(candidates),
        }
    }
}

impl CatalogProvider for StaticCatalog {
    fn list_all(&self) -> Vec<Candidate> {
        self.candidates.clone()
    }
}

/// Pool read from a directory of JSON files
///
/// Every `*.json` file holds an array of entries. Files whose name contains
/// `template` or starts with `_` are skipped.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    dir: PathBuf,
    candidates: Vec<Candidate>,
}

impl JsonCatalog {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CatalogError::DirectoryNotFound(dir.display().to_string()));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| CatalogError::Unreadable {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_catalog_file(path))
            .collect();
        // Stable pool order regardless of directory iteration order
        files.sort();

        let mut candidates = Vec::new();
        for path in &files {
            let mut batch = read_file(path)?;
            tracing::debug!(file = %path.display(), count = batch.len(), "Loaded catalog file");
            candidates.append(&mut batch);
        }

        let candidates = dedup_by_id(candidates);
        if candidates.is_empty() {
            return Err(CatalogError::Empty);
        }

        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            candidates = candidates.len(),
            "Catalog loaded"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            candidates,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl CatalogProvider for JsonCatalog {
    fn list_all(&self) -> Vec<Candidate> {
        self.candidates.clone()
    }
}

fn is_catalog_file(path: &Path) -> bool {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    is_json && !name.contains("template") && !name.starts_with('_')
}

fn read_file(path: &Path) -> Result<Vec<Candidate>, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| CatalogError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Keep the first occurrence of every id
fn dedup_by_id(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| {
            let fresh = seen.insert(candidate.id.clone());
            if !fresh {
                tracing::warn!(candidate = %candidate.id, "Duplicate catalog id ignored");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_loads_and_flattens_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "1990.json",
            r#"[{"youtubeId":"a","title":"A","artist":"X","year":1990},
                {"youtubeId":"b","title":"B","artist":"Y","year":1990}]"#,
        );
        write(
            dir.path(),
            "1991.json",
            r#"[{"youtubeId":"c","title":"C","artist":"Z","year":1991}]"#,
        );

        let catalog = JsonCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 3);
        let nineties = catalog
            .list_all()
            .into_iter()
            .filter(|candidate| candidate.year == 1990)
            .count();
        assert_eq!(nineties, 2);
    }

    #[test]
    fn test_skips_templates_and_underscored_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "template.json", "not even json");
        write(dir.path(), "_draft.json", "[]");
        write(dir.path(), "notes.txt", "ignored");
        write(
            dir.path(),
            "2000.json",
            r#"[{"youtubeId":"a","title":"A","artist":"X","year":2000}]"#,
        );

        let catalog = JsonCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"[{"youtubeId":"a","title":"First","artist":"X","year":2000},
                {"youtubeId":"a","title":"Second","artist":"X","year":2000}]"#,
        );

        let catalog = JsonCatalog::load(dir.path()).unwrap();
        let all = catalog.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "First");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.json", "[{\"youtubeId\": 1}]");
        assert!(matches!(
            JsonCatalog::load(dir.path()),
            Err(CatalogError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_or_empty_directory() {
        assert!(matches!(
            JsonCatalog::load("/definitely/not/here"),
            Err(CatalogError::DirectoryNotFound(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(JsonCatalog::load(dir.path()), Err(CatalogError::Empty)));
    }
}
