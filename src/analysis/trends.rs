use crate::models::report::TrendPoint;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const TREND_EPSILON: f64 = 1e-9;
const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Worsening,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Improving => write!(f, "improving"),
            TrendDirection::Worsening => write!(f, "worsening"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Aggregate view over a trend window. Purely derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSummary {
    pub total_scans: u64,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub avg_files: u64,
    pub avg_dirs: u64,
    /// Mean over the last 7 days.
    pub recent_avg: f64,
    /// Mean over days 8-14.
    pub previous_avg: f64,
    pub direction: TrendDirection,
    pub delta: f64,
}

/// Summarize a window of trend points (oldest-first, as returned by the
/// store). A lower recent mean than the prior week reads as improving.
pub fn analyze(points: &[TrendPoint], now: DateTime<Utc>) -> TrendSummary {
    if points.is_empty() {
        return TrendSummary {
            total_scans: 0,
            avg_score: 0.0,
            min_score: 0.0,
            max_score: 0.0,
            avg_files: 0,
            avg_dirs: 0,
            recent_avg: 0.0,
            previous_avg: 0.0,
            direction: TrendDirection::Stable,
            delta: 0.0,
        };
    }

    let scores: Vec<f64> = points.iter().map(|p| p.messiness_score).collect();
    let avg_score = scores.iter().sum::<f64>() / scores.len() as f64;
    let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let avg_files = points.iter().map(|p| p.total_files).sum::<u64>() / points.len() as u64;
    let avg_dirs = points.iter().map(|p| p.total_dirs).sum::<u64>() / points.len() as u64;

    let week_ago = now - Duration::days(7);
    let fortnight_ago = now - Duration::days(14);

    let recent_avg = window_mean(points, |p| p.timestamp >= week_ago);
    let previous_avg =
        window_mean(points, |p| p.timestamp >= fortnight_ago && p.timestamp < week_ago);

    let direction = if recent_avg < previous_avg - TREND_EPSILON {
        TrendDirection::Improving
    } else if recent_avg > previous_avg + TREND_EPSILON {
        TrendDirection::Worsening
    } else {
        TrendDirection::Stable
    };

    TrendSummary {
        total_scans: points.len() as u64,
        avg_score,
        min_score,
        max_score,
        avg_files,
        avg_dirs,
        recent_avg,
        previous_avg,
        direction,
        delta: (recent_avg - previous_avg).abs(),
    }
}

fn window_mean<F>(points: &[TrendPoint], keep: F) -> f64
where
    F: Fn(&TrendPoint) -> bool,
{
    let selected: Vec<f64> = points
        .iter()
        .filter(|p| keep(p))
        .map(|p| p.messiness_score)
        .collect();
    if selected.is_empty() {
        return 0.0;
    }
    selected.iter().sum::<f64>() / selected.len() as f64
}

/// Render scores as a unicode sparkline: each value quantized into one of
/// 8 levels against the window's own min/max, downsampled by uniform
/// stride when longer than `width`.
pub fn sparkline(scores: &[f64], width: usize) -> String {
    if scores.is_empty() || width == 0 {
        return "no data".to_string();
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if (max - min).abs() < f64::EPSILON {
        1.0
    } else {
        max - min
    };

    let scaled: Vec<usize> = scores
        .iter()
        .map(|v| (((v - min) / range) * 7.0) as usize)
        .collect();

    let sampled: Vec<usize> = if scaled.len() > width {
        let step = scaled.len() as f64 / width as f64;
        (0..width).map(|i| scaled[(i as f64 * step) as usize]).collect()
    } else {
        scaled
    };

    sampled.iter().map(|&level| SPARK_CHARS[level.min(7)]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(days_ago: i64, score: f64) -> TrendPoint {
        TrendPoint {
            timestamp: Utc::now() - Duration::days(days_ago),
            messiness_score: score,
            total_files: 100,
            total_dirs: 10,
        }
    }

    #[test]
    fn empty_window_is_stable() {
        let summary = analyze(&[], Utc::now());
        assert_eq!(summary.total_scans, 0);
        assert_eq!(summary.direction, TrendDirection::Stable);
    }

    #[test]
    fn lower_recent_scores_read_as_improving() {
        let points = vec![point(12, 6.0), point(10, 6.0), point(3, 4.0), point(1, 4.0)];
        let summary = analyze(&points, Utc::now());

        assert_eq!(summary.direction, TrendDirection::Improving);
        assert!((summary.recent_avg - 4.0).abs() < 1e-9);
        assert!((summary.previous_avg - 6.0).abs() < 1e-9);
        assert!((summary.delta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn higher_recent_scores_read_as_worsening() {
        let points = vec![point(12, 2.0), point(9, 2.0), point(2, 4.0), point(1, 4.0)];
        let summary = analyze(&points, Utc::now());
        assert_eq!(summary.direction, TrendDirection::Worsening);
    }

    #[test]
    fn equal_means_read_as_stable() {
        let points = vec![point(10, 3.0), point(9, 3.0), point(2, 3.0), point(1, 3.0)];
        let summary = analyze(&points, Utc::now());
        assert_eq!(summary.direction, TrendDirection::Stable);
        assert_eq!(summary.delta, 0.0);
    }

    #[test]
    fn summary_tracks_window_bounds() {
        let points = vec![point(3, 1.0), point(2, 5.0), point(1, 3.0)];
        let summary = analyze(&points, Utc::now());
        assert_eq!(summary.total_scans, 3);
        assert_eq!(summary.min_score, 1.0);
        assert_eq!(summary.max_score, 5.0);
        assert!((summary.avg_score - 3.0).abs() < 1e-9);
        assert_eq!(summary.avg_files, 100);
    }

    #[test]
    fn sparkline_spans_levels() {
        let line = sparkline(&[0.0, 10.0], 50);
        assert_eq!(line.chars().count(), 2);
        assert_eq!(line.chars().next(), Some('▁'));
        assert_eq!(line.chars().last(), Some('█'));
    }

    #[test]
    fn sparkline_downsamples_to_width() {
        let scores: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let line = sparkline(&scores, 60);
        assert_eq!(line.chars().count(), 60);
    }

    #[test]
    fn sparkline_handles_flat_and_empty_input() {
        assert_eq!(sparkline(&[], 10), "no data");
        let flat = sparkline(&[2.0, 2.0, 2.0], 10);
        assert!(flat.chars().all(|c| c == '▁'));
    }
}
