//! File catalog and the per-session file cache.
//!
//! The catalog is the set of project files an index may point into. It is
//! built either from an explicit path list or by walking a source root.
//! Paths are project-relative with forward slashes; ids are assigned in path
//! order so they are stable for a given tree.
//!
//! Record streams name files by path. [`FileCache`] memoizes path lookups for
//! one session and reports each path missing from the catalog exactly once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{IndexError, IndexResult};
use crate::extent::FileId;
use crate::store::File;

/// Exclusions that always apply when scanning a source root.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Build a [`GlobSet`] from exclude patterns.
pub fn build_exclude_set(patterns: &[String]) -> IndexResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_EXCLUSIONS
        .iter()
        .copied()
        .chain(patterns.iter().map(String::as_str))
    {
        let glob = Glob::new(pattern).map_err(|e| {
            IndexError::invalid_config(format!("invalid exclude pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IndexError::invalid_config(format!("invalid exclude patterns: {}", e)))
}

/// Hex-encoded SHA-256 of file content.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Normalize a record path to catalog form.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

// ============================================================================
// FileCatalog
// ============================================================================

/// The set of files an index may reference.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    root: Option<PathBuf>,
    files: Vec<File>,
    by_path: HashMap<String, FileId>,
}

impl FileCatalog {
    /// Catalog an explicit list of paths, without content hashes.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths: Vec<String> = paths
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        paths.sort();
        paths.dedup();
        let files = paths
            .into_iter()
            .map(|path| (path, None))
            .collect::<Vec<_>>();
        FileCatalog::from_entries(None, files)
    }

    /// Walk `root`, skipping excluded paths, and hash every file.
    pub fn scan(root: &Path, exclude: &[String]) -> IndexResult<Self> {
        let excludes = build_exclude_set(exclude)?;
        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| IndexError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| IndexError::internal(e.to_string()))?
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if excludes.is_match(&relative) {
                continue;
            }
            let content = fs::read(entry.path())?;
            entries.push((relative, Some(content_hash(&content))));
        }
        entries.sort();
        debug!(root = %root.display(), files = entries.len(), "file catalog scanned");
        Ok(FileCatalog::from_entries(Some(root.to_path_buf()), entries))
    }

    fn from_entries(root: Option<PathBuf>, entries: Vec<(String, Option<String>)>) -> Self {
        let files: Vec<File> = entries
            .into_iter()
            .enumerate()
            .map(|(idx, (path, content_hash))| File {
                file_id: FileId::new(idx as u32),
                path,
                content_hash,
            })
            .collect();
        let by_path = files
            .iter()
            .map(|f| (f.path.clone(), f.file_id))
            .collect();
        FileCatalog {
            root,
            files,
            by_path,
        }
    }

    /// Source root the catalog was scanned from.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// FileId for a normalized path.
    pub fn lookup(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// ============================================================================
// FileCache
// ============================================================================

/// Outcome of resolving a record's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLookup {
    /// The record named no file.
    NoPath,
    Found(FileId),
    /// Not in the catalog. `first` is true the first time the path is seen.
    Missing { first: bool },
}

impl FileLookup {
    pub fn file_id(&self) -> Option<FileId> {
        match self {
            FileLookup::Found(id) => Some(*id),
            _ => None,
        }
    }
}

/// Lazily populated path → file id cache for one session.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<String, Option<FileId>>,
}

impl FileCache {
    pub fn new() -> Self {
        FileCache::default()
    }

    /// Resolve a path against the catalog, memoizing the answer.
    pub fn resolve(&mut self, catalog: &FileCatalog, path: Option<&str>) -> FileLookup {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            return FileLookup::NoPath;
        };
        if let Some(cached) = self.entries.get(path) {
            return match cached {
                Some(id) => FileLookup::Found(*id),
                None => FileLookup::Missing { first: false },
            };
        }
        let found = catalog.lookup(&normalize_path(path));
        self.entries.insert(path.to_string(), found);
        match found {
            Some(id) => FileLookup::Found(id),
            None => FileLookup::Missing { first: true },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/bar")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::File::create(dir.path().join("src/lib.rs"))
            .unwrap()
            .write_all(b"pub mod bar;\n")
            .unwrap();
        fs::File::create(dir.path().join("src/bar/mod.rs"))
            .unwrap()
            .write_all(b"pub struct Baz;\n")
            .unwrap();
        fs::File::create(dir.path().join("target/debug/out.rs"))
            .unwrap()
            .write_all(b"// generated\n")
            .unwrap();
        dir
    }

    mod catalog_tests {
        use super::*;

        #[test]
        fn explicit_paths_are_sorted_and_normalized() {
            let catalog = FileCatalog::from_paths(["src/main.rs", "./src/lib.rs", "src/main.rs"]);
            assert_eq!(catalog.len(), 2);
            assert_eq!(catalog.lookup("src/lib.rs"), Some(FileId::new(0)));
            assert_eq!(catalog.lookup("src/main.rs"), Some(FileId::new(1)));
        }

        #[test]
        fn scan_hashes_files_and_skips_target() {
            let dir = create_test_tree();
            let catalog = FileCatalog::scan(dir.path(), &[]).unwrap();
            let paths: Vec<&str> = catalog.files().iter().map(|f| f.path.as_str()).collect();
            assert_eq!(paths, vec!["src/bar/mod.rs", "src/lib.rs"]);
            let lib = &catalog.files()[1];
            assert_eq!(
                lib.content_hash.as_deref(),
                Some(content_hash(b"pub mod bar;\n").as_str())
            );
        }

        #[test]
        fn scan_honors_custom_excludes() {
            let dir = create_test_tree();
            let catalog = FileCatalog::scan(dir.path(), &["src/bar/**".to_string()]).unwrap();
            assert_eq!(catalog.len(), 1);
            assert!(catalog.lookup("src/bar/mod.rs").is_none());
        }

        #[test]
        fn bad_exclude_pattern_is_a_config_error() {
            let err = build_exclude_set(&["src/[".to_string()]).unwrap_err();
            assert!(matches!(err, IndexError::InvalidConfig { .. }));
        }

        #[test]
        fn same_bytes_same_hash() {
            assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
            assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
            assert_eq!(content_hash(b"").len(), 64);
        }
    }

    mod cache_tests {
        use super::*;

        #[test]
        fn missing_path_is_reported_once() {
            let catalog = FileCatalog::from_paths(["src/lib.rs"]);
            let mut cache = FileCache::new();
            assert_eq!(
                cache.resolve(&catalog, Some("src/gone.rs")),
                FileLookup::Missing { first: true }
            );
            assert_eq!(
                cache.resolve(&catalog, Some("src/gone.rs")),
                FileLookup::Missing { first: false }
            );
        }

        #[test]
        fn found_and_empty_paths() {
            let catalog = FileCatalog::from_paths(["src/lib.rs"]);
            let mut cache = FileCache::new();
            assert_eq!(
                cache.resolve(&catalog, Some("./src/lib.rs")).file_id(),
                Some(FileId::new(0))
            );
            assert_eq!(cache.resolve(&catalog, Some("")), FileLookup::NoPath);
            assert_eq!(cache.resolve(&catalog, None), FileLookup::NoPath);
        }
    }
}
