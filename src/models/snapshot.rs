use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One structural observation of a directory tree at a point in time.
/// Produced by the scanner and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub timestamp: DateTime<Utc>,
    pub root_path: String,
    pub total_files: u64,
    pub total_dirs: u64,
    /// Lowercased extension -> count. Files without an extension are
    /// bucketed under "no_extension".
    pub file_types: BTreeMap<String, u64>,
    /// Depth (path components below the root) -> directory count at that depth.
    pub depth_distribution: BTreeMap<u32, u64>,
    /// Human-readable violations in discovery order, capped at 20 entries.
    pub naming_violations: Vec<String>,
    /// Order-invariant digest of `{dirs, files, types}`. Independent of
    /// violations and individual file names.
    pub structure_hash: String,
    /// Files over the configured size threshold, largest first, at most 10.
    pub largest_files: Vec<LargeFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeFile {
    pub path: String,
    pub size_mb: f64,
}

impl DirectorySnapshot {
    /// Maximum directory depth seen during the scan, 0 for an empty tree.
    pub fn max_depth(&self) -> u32 {
        self.depth_distribution
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
    }
}
