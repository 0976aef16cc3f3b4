use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What counts as a "messy" directory. An explicit value handed to the
/// scanner and scorer, so independent roots can run with independent
/// policies. Never mutated mid-scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardsPolicy {
    pub max_depth: u32,
    pub max_files_per_dir: usize,
    /// Case-insensitive substrings that flag a filename.
    pub forbidden_patterns: Vec<String>,
    pub recommended_structure: Vec<String>,
    pub naming: NamingRules,
    pub max_file_size_mb: f64,
    /// Glob patterns for well-known clutter files (`*.tmp`, `.DS_Store`, ...).
    /// Carried for config compatibility; not consulted during scanning, so
    /// it never influences the violation list or the score.
    pub clutter_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingRules {
    pub no_spaces: bool,
    pub lowercase_preferred: bool,
    pub no_special_chars: Vec<String>,
}

impl Default for StandardsPolicy {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_files_per_dir: 20,
            forbidden_patterns: to_strings(&[
                "Untitled", "New Folder", "Copy of", "- Copy", "temp", "tmp", "backup", "old",
                "~$",
            ]),
            recommended_structure: to_strings(&[
                "src/", "tests/", "docs/", "config/", "scripts/", "data/", "assets/",
            ]),
            naming: NamingRules::default(),
            max_file_size_mb: 100.0,
            clutter_patterns: to_strings(&[
                ".DS_Store",
                "Thumbs.db",
                "desktop.ini",
                "*.tmp",
                "~$*",
                "*.bak",
                "*.swp",
            ]),
        }
    }
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            no_spaces: true,
            lowercase_preferred: true,
            no_special_chars: to_strings(&["!", "@", "#", "$", "%", "^", "&", "*", "(", ")"]),
        }
    }
}

impl StandardsPolicy {
    /// Load overrides from a local JSON config file. A missing file means
    /// defaults; an unreadable file falls back to defaults with a warning.
    pub fn load(config_path: &Path) -> Self {
        let raw = match fs::read_to_string(config_path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(policy) => policy,
            Err(err) => {
                log::warn!(
                    "ignoring malformed config {}: {err}",
                    config_path.display()
                );
                Self::default()
            }
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
