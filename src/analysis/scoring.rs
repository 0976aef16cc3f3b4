use crate::models::snapshot::DirectorySnapshot;
use crate::models::standards::StandardsPolicy;

/// Messiness score in `[0, 10]`. Additive terms, each independently
/// bounded, clamped at 10. The formula is frozen: historical scores in
/// the observation store must stay comparable across releases.
///
/// Note the violation term reads the capped (max 20) violation list, so
/// it saturates at 4.0 well before the cap is reached.
pub fn messiness_score(snapshot: &DirectorySnapshot, policy: &StandardsPolicy) -> f64 {
    let mut score = 0.0;

    score += (snapshot.naming_violations.len() as f64 * 0.5).min(4.0);

    let max_depth = snapshot.max_depth();
    if max_depth > policy.max_depth {
        score += f64::from(max_depth - policy.max_depth) * 0.5;
    }

    score += (snapshot.largest_files.len() as f64 * 0.3).min(2.0);

    if snapshot.file_types.len() > 15 {
        score += 1.0;
    }

    score.min(10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::LargeFile;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn empty_snapshot() -> DirectorySnapshot {
        DirectorySnapshot {
            timestamp: Utc::now(),
            root_path: "/tmp/example".to_string(),
            total_files: 0,
            total_dirs: 0,
            file_types: BTreeMap::new(),
            depth_distribution: BTreeMap::new(),
            naming_violations: Vec::new(),
            structure_hash: String::new(),
            largest_files: Vec::new(),
        }
    }

    fn large_file() -> LargeFile {
        LargeFile {
            path: "data/blob.bin".to_string(),
            size_mb: 150.0,
        }
    }

    #[test]
    fn empty_tree_scores_zero() {
        let policy = StandardsPolicy::default();
        assert_eq!(messiness_score(&empty_snapshot(), &policy), 0.0);
    }

    #[test]
    fn violation_term_is_half_point_each_capped_at_four() {
        let policy = StandardsPolicy::default();
        let mut snapshot = empty_snapshot();

        snapshot.naming_violations = vec!["v".to_string(); 1];
        assert_eq!(messiness_score(&snapshot, &policy), 0.5);

        snapshot.naming_violations = vec!["v".to_string(); 20];
        assert_eq!(messiness_score(&snapshot, &policy), 4.0);
    }

    #[test]
    fn depth_overshoot_adds_half_point_per_level() {
        let policy = StandardsPolicy::default();
        let mut snapshot = empty_snapshot();
        snapshot.depth_distribution.insert(7, 1);

        // max_depth 5, observed 7 -> (7 - 5) * 0.5
        assert_eq!(messiness_score(&snapshot, &policy), 1.0);
    }

    #[test]
    fn oversized_term_caps_at_two() {
        let policy = StandardsPolicy::default();
        let mut snapshot = empty_snapshot();

        snapshot.largest_files = vec![large_file(); 2];
        assert!((messiness_score(&snapshot, &policy) - 0.6).abs() < 1e-9);

        snapshot.largest_files = vec![large_file(); 10];
        assert_eq!(messiness_score(&snapshot, &policy), 2.0);
    }

    #[test]
    fn diversity_term_kicks_in_above_fifteen_types() {
        let policy = StandardsPolicy::default();
        let mut snapshot = empty_snapshot();

        for i in 0..15 {
            snapshot.file_types.insert(format!("ext{i}"), 1);
        }
        assert_eq!(messiness_score(&snapshot, &policy), 0.0);

        snapshot.file_types.insert("one_more".to_string(), 1);
        assert_eq!(messiness_score(&snapshot, &policy), 1.0);
    }

    #[test]
    fn score_is_clamped_to_ten() {
        let policy = StandardsPolicy::default();
        let mut snapshot = empty_snapshot();
        snapshot.naming_violations = vec!["v".to_string(); 20];
        snapshot.largest_files = vec![large_file(); 10];
        snapshot.depth_distribution.insert(40, 1);
        for i in 0..20 {
            snapshot.file_types.insert(format!("ext{i}"), 1);
        }

        assert_eq!(messiness_score(&snapshot, &policy), 10.0);
    }

    #[test]
    fn score_is_monotone_in_each_signal() {
        let policy = StandardsPolicy::default();
        let mut snapshot = empty_snapshot();
        let base = messiness_score(&snapshot, &policy);

        snapshot.naming_violations.push("v".to_string());
        let with_violation = messiness_score(&snapshot, &policy);
        assert!(with_violation > base);

        snapshot.largest_files.push(large_file());
        let with_large = messiness_score(&snapshot, &policy);
        assert!(with_large > with_violation);

        snapshot.depth_distribution.insert(9, 1);
        assert!(messiness_score(&snapshot, &policy) > with_large);
    }
}
