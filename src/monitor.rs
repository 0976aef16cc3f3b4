//! Analysis orchestrator: one scan-and-alert cycle ties the scanner,
//! scorer, retrieval engine, narrative service and store together, and
//! the reporting operations read everything back.

use crate::analysis::scanner::Scanner;
use crate::analysis::scoring::messiness_score;
use crate::analysis::trends::{self, TrendSummary};
use crate::error::Result;
use crate::models::report::{HistoryEntry, MonitorReport, ScanOutcome, ScoreStats, TrendPoint};
use crate::models::snapshot::DirectorySnapshot;
use crate::models::standards::StandardsPolicy;
use crate::rag::engine::RetrievalEngine;
use crate::rag::{NarrativeService, TextEncoder};
use crate::store::ObservationStore;
use chrono::{Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed query used to ground the narrative in similar past states.
const RETRIEVAL_QUERY: &str = "messy directory violations";
/// Token budget for one narrative.
const NARRATIVE_MAX_TOKENS: u32 = 800;
/// How many similar past snapshots are rendered into the prompt.
const RETRIEVAL_TOP_K: usize = 2;
/// Export cap for recent history entries.
const EXPORT_HISTORY_LIMIT: usize = 50;

pub struct Monitor {
    root: PathBuf,
    policy: StandardsPolicy,
    store: ObservationStore,
    retrieval: RetrievalEngine,
    narrative: Box<dyn NarrativeService>,
    encoder: Option<Box<dyn TextEncoder>>,
}

impl Monitor {
    /// Wire up the orchestrator. The encoder is optional; without it the
    /// retrieval cache stays empty and embedding steps are skipped.
    pub fn new(
        root: impl AsRef<Path>,
        policy: StandardsPolicy,
        store: ObservationStore,
        narrative: Box<dyn NarrativeService>,
        encoder: Option<Box<dyn TextEncoder>>,
    ) -> Result<Self> {
        let retrieval = RetrievalEngine::new();
        if encoder.is_some() {
            retrieval.reload(&store)?;
        } else {
            log::info!("text encoder unavailable, retrieval disabled for this session");
        }

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            policy,
            store,
            retrieval,
            narrative,
            encoder,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one full cycle: scan, score, retrieve, generate, persist.
    ///
    /// Narrative failures degrade to a placeholder; the snapshot and its
    /// score are persisted either way so alerting keeps working without
    /// the model server.
    pub async fn scan_and_alert(&self, alert_threshold: f64) -> Result<ScanOutcome> {
        let snapshot = Scanner::new(&self.root, self.policy.clone()).scan();
        let score = messiness_score(&snapshot, &self.policy);
        log::info!(
            "scanned {}: {} files, {} dirs, score {score:.1}",
            snapshot.root_path,
            snapshot.total_files,
            snapshot.total_dirs
        );

        let context = self.retrieval_context().await;
        let prompt = build_analysis_prompt(&snapshot, &context);
        let narrative = match self.narrative.generate(&prompt, NARRATIVE_MAX_TOKENS).await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("narrative generation failed, using placeholder: {err}");
                format!("narrative unavailable: {err}")
            }
        };

        let snapshot_id = self.store.append_snapshot(&snapshot, score)?;
        let alert = score >= alert_threshold;
        self.store.append_analysis(snapshot_id, &narrative, alert)?;

        if let Some(encoder) = &self.encoder {
            match encoder.encode(&snapshot_text(&snapshot)).await {
                Ok(vector) => {
                    self.store.append_embedding(snapshot_id, &vector)?;
                    self.retrieval.reload(&self.store)?;
                }
                Err(err) => {
                    log::warn!("embedding skipped for snapshot {snapshot_id}: {err}");
                }
            }
        }

        let message = if alert {
            format!("ALERT: messiness score {score:.1}/10")
        } else {
            format!("clean (score: {score:.1}/10)")
        };

        Ok(ScanOutcome {
            snapshot,
            messiness_score: score,
            narrative,
            alert,
            message,
        })
    }

    /// Render up to [`RETRIEVAL_TOP_K`] similar past states into a short
    /// context block for the prompt. Empty when no encoder is available,
    /// the cache is empty, or the query embedding fails.
    async fn retrieval_context(&self) -> String {
        let Some(encoder) = &self.encoder else {
            return String::new();
        };

        let query = match encoder.encode(RETRIEVAL_QUERY).await {
            Ok(vector) => vector,
            Err(err) => {
                log::warn!("query embedding failed, skipping retrieval: {err}");
                return String::new();
            }
        };

        let similar = self.retrieval.search(&query, RETRIEVAL_TOP_K);
        if similar.is_empty() {
            return String::new();
        }

        let mut context = String::from("Previous similar states:\n");
        for hit in similar {
            context.push_str(&format!(
                "- {}: {} violations\n",
                hit.snapshot.timestamp.to_rfc3339(),
                hit.snapshot.naming_violations.len()
            ));
        }
        context
    }

    /// Recent analysis history, newest-first.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.store.fetch_recent(limit)
    }

    /// Statistics over every scan ever recorded.
    pub fn statistics(&self) -> Result<ScoreStats> {
        self.store.aggregate()
    }

    /// Trend summary plus the underlying points for the last `days` days.
    pub fn trend_report(&self, days: i64) -> Result<(TrendSummary, Vec<TrendPoint>)> {
        let now = Utc::now();
        let points = self.store.fetch_window(now - Duration::days(days))?;
        Ok((trends::analyze(&points, now), points))
    }

    /// Write the JSON report `{generated_at, statistics, recent_history}`.
    pub fn export_report(&self, output_path: &Path) -> Result<MonitorReport> {
        let report = MonitorReport {
            generated_at: Utc::now(),
            statistics: self.statistics()?,
            recent_history: self.history(EXPORT_HISTORY_LIMIT)?,
        };

        fs::write(output_path, serde_json::to_string_pretty(&report)?)?;
        log::info!("report written to {}", output_path.display());
        Ok(report)
    }
}

fn build_analysis_prompt(snapshot: &DirectorySnapshot, context: &str) -> String {
    let file_types: Vec<&str> = snapshot
        .file_types
        .keys()
        .take(10)
        .map(String::as_str)
        .collect();
    let violations: Vec<&str> = snapshot
        .naming_violations
        .iter()
        .take(10)
        .map(String::as_str)
        .collect();
    let large_files: Vec<String> = snapshot
        .largest_files
        .iter()
        .take(5)
        .map(|f| format!("- {}: {}MB", f.path, f.size_mb))
        .collect();

    format!(
        "You are a development standards expert. Analyze this directory structure:\n\
         \n\
         {context}\n\
         Current State:\n\
         - Path: {path}\n\
         - Total Files: {files}\n\
         - Total Directories: {dirs}\n\
         - Maximum Depth: {depth}\n\
         - File Types: {types}\n\
         - Naming Violations: {violation_count}\n\
         \n\
         Specific Issues:\n\
         {violations}\n\
         \n\
         Large Files:\n\
         {large_files}\n\
         \n\
         Based on development best practices:\n\
         1. Is this directory structure messy? (Yes/No)\n\
         2. What are the top 3 issues?\n\
         3. What specific actions should be taken?\n\
         4. Rate messiness 1-10 (10 = extremely messy)\n\
         \n\
         Be concise and actionable.",
        context = context,
        path = snapshot.root_path,
        files = snapshot.total_files,
        dirs = snapshot.total_dirs,
        depth = snapshot.max_depth(),
        types = file_types.join(", "),
        violation_count = snapshot.naming_violations.len(),
        violations = violations.join("\n"),
        large_files = large_files.join("\n"),
    )
}

/// Text rendering of a snapshot, used as encoder input.
fn snapshot_text(snapshot: &DirectorySnapshot) -> String {
    let types: Vec<&str> = snapshot.file_types.keys().map(String::as_str).collect();
    let violations: Vec<&str> = snapshot
        .naming_violations
        .iter()
        .take(5)
        .map(String::as_str)
        .collect();

    format!(
        "Directory: {}\nFiles: {}\nDirectories: {}\nFile types: {}\nMax depth: {}\nViolations: {}",
        snapshot.root_path,
        snapshot.total_files,
        snapshot.total_dirs,
        types.join(", "),
        snapshot.max_depth(),
        violations.join("\n"),
    )
}
