//! Segment model: the unified word-and-gap view of a clip's audio
//!
//! The transcript UI edits a clip as an ordered list of segments, where a
//! segment is either a spoken word or a slice of silence. Gaps are first-class
//! so a user can deliberately keep silence (dramatic pause) or excise it.
//! Silences are sliced into ~0.3 s units, the smallest selectable unit of
//! silence in the editor.

pub mod reduce;

pub use reduce::reduce_selection;

use crate::error::{ReelCutError, ReelCutResult};
use crate::model::Word;

/// Smallest selectable unit of silence, in seconds. Gaps shorter than this
/// are not represented as segments.
pub const GAP_UNIT_SECONDS: f64 = 0.3;

/// The smallest editable unit in the transcript UI
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A spoken word carrying its index in the original word list
    Word {
        text: String,
        start: f64,
        end: f64,
        word_index: usize,
    },
    /// A slice of silence
    Gap { start: f64, end: f64 },
}

impl Segment {
    pub fn start(&self) -> f64 {
        match self {
            Segment::Word { start, .. } | Segment::Gap { start, .. } => *start,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            Segment::Word { end, .. } | Segment::Gap { end, .. } => *end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Segment::Gap { .. })
    }
}

/// Slice the silence `[start, end)` into equal units of roughly
/// [`GAP_UNIT_SECONDS`]. Silences shorter than one unit produce nothing.
fn push_gap_slices(segments: &mut Vec<Segment>, start: f64, end: f64) {
    let duration = end - start;
    if duration < GAP_UNIT_SECONDS {
        return;
    }
    let count = (duration / GAP_UNIT_SECONDS).round().max(1.0) as usize;
    let slice = duration / count as f64;
    for k in 0..count {
        let slice_start = start + slice * k as f64;
        // Pin the last slice to the exact gap end so float drift cannot open
        // a hole before the next word.
        let slice_end = if k + 1 == count { end } else { start + slice * (k + 1) as f64 };
        segments.push(Segment::Gap {
            start: slice_start,
            end: slice_end,
        });
    }
}

/// Build the unified segment list from a clip's word list and duration.
///
/// The list is contiguous and ordered by start time. It begins at 0 when a
/// leading silence of at least one gap unit exists, otherwise at the first
/// word's start; it ends at `total_duration` when a trailing silence of at
/// least one unit exists, otherwise at the last word's end.
pub fn build_segments(words: &[Word], total_duration: f64) -> Vec<Segment> {
    let mut segments = Vec::new();

    if words.is_empty() {
        push_gap_slices(&mut segments, 0.0, total_duration);
        return segments;
    }

    push_gap_slices(&mut segments, 0.0, words[0].start);

    for (index, word) in words.iter().enumerate() {
        segments.push(Segment::Word {
            text: word.text.clone(),
            start: word.start,
            end: word.end,
            word_index: index,
        });
        if let Some(next) = words.get(index + 1) {
            push_gap_slices(&mut segments, word.end, next.start);
        }
    }

    push_gap_slices(&mut segments, words[words.len() - 1].end, total_duration);

    segments
}

/// Translate word indices into segment indices.
///
/// Bijective with [`segment_indices_to_word_indices`] on the word subset.
/// Fails when a word index does not exist in the segment list.
pub fn word_indices_to_segment_indices(
    segments: &[Segment],
    word_indices: &[usize],
) -> ReelCutResult<Vec<usize>> {
    word_indices
        .iter()
        .map(|&wanted| {
            segments
                .iter()
                .position(
                    |s| matches!(s, Segment::Word { word_index, .. } if *word_index == wanted),
                )
                .ok_or_else(|| ReelCutError::InvariantViolation {
                    message: format!("word index {} has no segment", wanted),
                })
        })
        .collect()
}

/// Translate segment indices back into word indices.
///
/// Gap segments have no word counterpart and are skipped; out-of-range
/// segment indices fail.
pub fn segment_indices_to_word_indices(
    segments: &[Segment],
    segment_indices: &[usize],
) -> ReelCutResult<Vec<usize>> {
    let mut word_indices = Vec::new();
    for &index in segment_indices {
        match segments.get(index) {
            Some(Segment::Word { word_index, .. }) => word_indices.push(*word_index),
            Some(Segment::Gap { .. }) => {}
            None => {
                return Err(ReelCutError::InvariantViolation {
                    message: format!("segment index {} out of range ({})", index, segments.len()),
                })
            }
        }
    }
    Ok(word_indices)
}
