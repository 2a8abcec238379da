//! Selection reduction: from selected segment indices to time intervals
//!
//! This is the contract between the editor and the surgeon; it defines what
//! "selected" means in terms of time. Pure and deterministic.

use std::collections::BTreeSet;

use crate::error::{ReelCutError, ReelCutResult};
use crate::model::Interval;
use crate::segment::Segment;

/// Reduce a set of selected segment indices to a minimal list of intervals.
///
/// Each run of consecutive selected indices collapses to a single interval
/// spanning the run, widened by `buffer` on both sides (the lower bound is
/// clamped at 0). Intervals whose gap after buffering is smaller than
/// `merge_gap` are merged. The result is strictly increasing.
pub fn reduce_selection(
    segments: &[Segment],
    selected: &BTreeSet<usize>,
    buffer: f64,
    merge_gap: f64,
) -> ReelCutResult<Vec<Interval>> {
    if selected.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(&max) = selected.iter().next_back() {
        if max >= segments.len() {
            return Err(ReelCutError::Validation {
                message: format!(
                    "selection index {} out of range for {} segments",
                    max,
                    segments.len()
                ),
            });
        }
    }

    // Collapse runs of consecutive indices. BTreeSet iteration is ordered, so
    // a run breaks exactly when the next index is not previous + 1.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &index in selected {
        match runs.last_mut() {
            Some((_, last)) if index == *last + 1 => *last = index,
            _ => runs.push((index, index)),
        }
    }

    let mut intervals: Vec<Interval> = Vec::new();
    for (first, last) in runs {
        let start = (segments[first].start() - buffer).max(0.0);
        let end = segments[last].end() + buffer;
        match intervals.last_mut() {
            Some(previous) if start - previous.end < merge_gap => {
                previous.end = end;
            }
            _ => intervals.push(Interval::new(start, end)),
        }
    }

    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Word;
    use crate::segment::build_segments;

    const BUFFER: f64 = 0.15;
    const MERGE_GAP: f64 = 0.5;

    fn announcer_segments() -> Vec<Segment> {
        // "home run by smith" over a 10 s clip, 0.5 s of lead-in silence
        let words = vec![
            Word::new("home", 0.50, 0.80, 0.99),
            Word::new("run", 0.80, 1.10, 0.98),
            Word::new("by", 1.10, 1.30, 0.97),
            Word::new("smith", 1.30, 1.70, 0.99),
        ];
        build_segments(&words, 10.0)
    }

    #[test]
    fn test_single_consecutive_run() {
        // "home run": word segments sit after two leading gap slices
        let segments = announcer_segments();
        let selection = BTreeSet::from([2, 3]);
        let intervals = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 0.35).abs() < 1e-9);
        assert!((intervals[0].end - 1.25).abs() < 1e-9);
        assert!((intervals[0].duration() - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_close_runs_merge() {
        // "home" and "smith": buffered intervals sit 0.20 s apart, under the
        // 0.5 s merge threshold, so they join
        let segments = announcer_segments();
        let selection = BTreeSet::from([2, 5]);
        let intervals = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 0.35).abs() < 1e-9);
        assert!((intervals[0].end - 1.85).abs() < 1e-9);
        assert!((intervals[0].duration() - 1.50).abs() < 1e-9);
    }

    #[test]
    fn test_selected_gap_slices_span_exactly() {
        // 1.2 s silence slices into four 0.3 s units; keeping the middle two
        // spans exactly those 0.6 s
        let words = vec![
            Word::new("swing", 0.0, 0.4, 1.0),
            Word::new("miss", 1.6, 2.0, 1.0),
        ];
        let segments = build_segments(&words, 2.0);
        // Segments: word, gap x4, word
        let selection = BTreeSet::from([2, 3]);
        let intervals = reduce_selection(&segments, &selection, 0.0, MERGE_GAP).unwrap();
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 0.7).abs() < 1e-9);
        assert!((intervals[0].end - 1.3).abs() < 1e-9);
        assert!((intervals[0].duration() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_lower_bound_clamped_to_zero() {
        let words = vec![Word::new("go", 0.05, 0.4, 1.0)];
        let segments = build_segments(&words, 1.0);
        let selection = BTreeSet::from([0]);
        let intervals = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        assert_eq!(intervals[0].start, 0.0);
    }

    #[test]
    fn test_distant_runs_stay_separate() {
        let words = vec![
            Word::new("first", 0.0, 0.5, 1.0),
            Word::new("second", 4.0, 4.5, 1.0),
        ];
        let segments = build_segments(&words, 5.0);
        let word_indices: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_gap())
            .map(|(i, _)| i)
            .collect();
        let selection = BTreeSet::from_iter(word_indices);
        let intervals = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        assert_eq!(intervals.len(), 2);
        assert!(intervals[0].end < intervals[1].start);
    }

    #[test]
    fn test_empty_selection_yields_no_intervals() {
        let segments = announcer_segments();
        let intervals =
            reduce_selection(&segments, &BTreeSet::new(), BUFFER, MERGE_GAP).unwrap();
        assert!(intervals.is_empty());
    }

    #[test]
    fn test_out_of_range_selection_fails() {
        let segments = announcer_segments();
        let selection = BTreeSet::from([segments.len()]);
        assert!(reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).is_err());
    }

    #[test]
    fn test_reduction_is_deterministic() {
        let segments = announcer_segments();
        let selection = BTreeSet::from([2, 3, 5]);
        let first = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        let second = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_duration_bounded_by_buffered_sum() {
        // Reducing never exceeds the naive selected duration by more than
        // two buffers per run
        let segments = announcer_segments();
        let selection = BTreeSet::from([0, 2, 3, 5]);
        let intervals = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();

        let naive: f64 = selection.iter().map(|&i| segments[i].duration()).sum();
        let runs = 3.0; // {0}, {2,3}, {5}
        let reduced: f64 = intervals.iter().map(Interval::duration).sum();
        assert!(reduced <= naive + 2.0 * BUFFER * runs + 1e-9);
    }

    #[test]
    fn test_intervals_strictly_increasing() {
        let words: Vec<Word> = (0..8)
            .map(|i| Word::new(format!("w{}", i), i as f64 * 1.5, i as f64 * 1.5 + 0.4, 1.0))
            .collect();
        let segments = build_segments(&words, 12.0);
        let selection: BTreeSet<usize> = (0..segments.len()).step_by(3).collect();
        let intervals = reduce_selection(&segments, &selection, BUFFER, MERGE_GAP).unwrap();
        for pair in intervals.windows(2) {
            assert!(pair[0].end < pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
    }
}
