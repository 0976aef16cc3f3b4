use crate::models::snapshot::{DirectorySnapshot, LargeFile};
use crate::models::standards::StandardsPolicy;
use chrono::Utc;
use glob::Pattern;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories that are never descended into: version-control metadata,
/// dependency caches and build output.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    ".cache",
    "target",
];

/// Cap on recorded violations; anything past this is silently dropped.
const MAX_VIOLATIONS: usize = 20;
/// Cap on recorded oversized files.
const MAX_LARGE_FILES: usize = 10;

const NO_EXTENSION: &str = "no_extension";

/// Walks a directory tree once and produces a [`DirectorySnapshot`].
/// The walk never mutates the filesystem; per-entry I/O failures are
/// logged and skipped, never fatal to the scan.
pub struct Scanner {
    root: PathBuf,
    policy: StandardsPolicy,
    ignore_patterns: Vec<Pattern>,
}

#[derive(Default)]
struct WalkState {
    total_files: u64,
    total_dirs: u64,
    file_types: BTreeMap<String, u64>,
    depth_distribution: BTreeMap<u32, u64>,
    naming_violations: Vec<String>,
    largest_files: Vec<LargeFile>,
}

impl Scanner {
    pub fn new(root: impl AsRef<Path>, policy: StandardsPolicy) -> Self {
        let ignore = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::with_ignore_patterns(root, policy, ignore)
    }

    pub fn with_ignore_patterns(
        root: impl AsRef<Path>,
        policy: StandardsPolicy,
        ignore_patterns: Vec<String>,
    ) -> Self {
        let ignore_patterns = ignore_patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    log::warn!("skipping invalid ignore pattern '{raw}': {err}");
                    None
                }
            })
            .collect();

        Self {
            root: root.as_ref().to_path_buf(),
            policy,
            ignore_patterns,
        }
    }

    /// Produce exactly one snapshot of the tree under the scanner's root.
    pub fn scan(&self) -> DirectorySnapshot {
        let mut state = WalkState::default();
        self.walk(&self.root, 0, &mut state);

        state.largest_files.sort_by(|a, b| {
            b.size_mb
                .partial_cmp(&a.size_mb)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        state.largest_files.truncate(MAX_LARGE_FILES);
        state.naming_violations.truncate(MAX_VIOLATIONS);

        let structure_hash =
            structure_hash(state.total_files, state.total_dirs, &state.file_types);

        DirectorySnapshot {
            timestamp: Utc::now(),
            root_path: self.root.to_string_lossy().to_string(),
            total_files: state.total_files,
            total_dirs: state.total_dirs,
            file_types: state.file_types,
            depth_distribution: state.depth_distribution,
            naming_violations: state.naming_violations,
            structure_hash,
            largest_files: state.largest_files,
        }
    }

    fn walk(&self, dir: &Path, depth: u32, state: &mut WalkState) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!("skipping unreadable directory {}: {err}", dir.display());
                return;
            }
        };

        let mut subdirs = Vec::new();
        let mut files = Vec::new();

        for entry in entries.flatten() {
            // file_type() does not follow symlinks, so a symlinked directory
            // cannot pull the walk into a cycle.
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let path = entry.path();

            if is_dir {
                let name = entry.file_name().to_string_lossy().to_string();
                if self.ignore_patterns.iter().any(|p| p.matches(&name)) {
                    continue;
                }
                subdirs.push(path);
            } else {
                files.push(path);
            }
        }

        state.total_dirs += subdirs.len() as u64;
        // The bucket is created even when empty so the deepest visited level
        // is observable through the distribution's keys.
        *state.depth_distribution.entry(depth).or_insert(0) += subdirs.len() as u64;

        if files.len() > self.policy.max_files_per_dir {
            state.naming_violations.push(format!(
                "Too many files ({}) in {}",
                files.len(),
                self.relative(dir)
            ));
        }

        for file in &files {
            self.inspect_file(file, state);
        }

        for subdir in &subdirs {
            self.walk(subdir, depth + 1, state);
        }
    }

    fn inspect_file(&self, path: &Path, state: &mut WalkState) {
        state.total_files += 1;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let name_lower = name.to_lowercase();

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| NO_EXTENSION.to_string());
        *state.file_types.entry(ext).or_insert(0) += 1;

        for pattern in &self.policy.forbidden_patterns {
            if name_lower.contains(&pattern.to_lowercase()) {
                state
                    .naming_violations
                    .push(format!("Naming violation '{}' in {}", pattern, self.relative(path)));
            }
        }

        if self.policy.naming.no_spaces && name.contains(' ') {
            state
                .naming_violations
                .push(format!("Space in filename: {}", self.relative(path)));
        }

        match fs::metadata(path) {
            Ok(meta) => {
                let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
                if size_mb > self.policy.max_file_size_mb {
                    state.largest_files.push(LargeFile {
                        path: self.relative(path),
                        size_mb: (size_mb * 100.0).round() / 100.0,
                    });
                }
            }
            Err(err) => {
                log::debug!("skipping size check for {}: {err}", path.display());
            }
        }
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        if rel.is_empty() {
            ".".to_string()
        } else {
            rel
        }
    }
}

#[derive(Serialize)]
struct StructureFingerprint<'a> {
    dirs: u64,
    files: u64,
    types: &'a BTreeMap<String, u64>,
}

/// Digest over counts and type distribution only. BTreeMap serialization
/// keeps keys lexicographically sorted, so the hash is invariant to
/// traversal order.
fn structure_hash(total_files: u64, total_dirs: u64, file_types: &BTreeMap<String, u64>) -> String {
    let fingerprint = StructureFingerprint {
        dirs: total_dirs,
        files: total_files,
        types: file_types,
    };
    let payload = serde_json::to_string(&fingerprint).unwrap_or_else(|_| "{}".to_string());
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}
