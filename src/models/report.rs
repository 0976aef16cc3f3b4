use crate::models::snapshot::DirectorySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the analysis history, newest-first. The narrative and alert
/// are optional because a snapshot may be persisted before (or without)
/// its analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub messiness_score: f64,
    pub narrative: Option<String>,
    pub alert: Option<bool>,
}

/// One point of the trend time series, oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub messiness_score: f64,
    pub total_files: u64,
    pub total_dirs: u64,
}

/// Aggregate statistics over every score ever recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreStats {
    pub total_scans: u64,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

/// JSON report written by `Monitor::export_report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorReport {
    pub generated_at: DateTime<Utc>,
    pub statistics: ScoreStats,
    pub recent_history: Vec<HistoryEntry>,
}

/// Result of one scan-and-alert cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub snapshot: DirectorySnapshot,
    pub messiness_score: f64,
    pub narrative: String,
    pub alert: bool,
    pub message: String,
}
