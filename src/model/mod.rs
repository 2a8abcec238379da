//! Core data model: words, intervals, clips, transitions, and the rundown
//!
//! The rundown is a heterogeneous ordered sequence (plays, transitions, at
//! most one title card) modelled as a tagged enum with shared positional
//! semantics. Validation of the §-level invariants is centralised here so
//! every consumer sees the same rules.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReelCutError, ReelCutResult};

/// A transcribed word with precise timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// The word text
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Recognition confidence in [0, 1]
    pub confidence: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A contiguous span of source time selected for inclusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds, strictly greater than start
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Camera feed a clip was sourced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Network,
    Cms,
    Home,
    Away,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feed::Network => write!(f, "network"),
            Feed::Cms => write!(f, "cms"),
            Feed::Home => write!(f, "home"),
            Feed::Away => write!(f, "away"),
        }
    }
}

/// Half of an inning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalfInning {
    Top,
    Bot,
}

impl fmt::Display for HalfInning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalfInning::Top => write!(f, "top"),
            HalfInning::Bot => write!(f, "bot"),
        }
    }
}

/// Key for a pre-rendered inning-transition graphic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionKey {
    pub half: HalfInning,
    /// Inning number, 1 through 9
    pub inning: u8,
}

impl TransitionKey {
    pub fn new(half: HalfInning, inning: u8) -> Self {
        Self { half, inning }
    }

    /// File name this key resolves to inside the transitions directory
    pub fn file_name(&self) -> String {
        format!("{}-{}.mp4", self.half, self.inning)
    }

    /// Full path inside the transitions directory
    pub fn resolve(&self, transitions_dir: &Path) -> PathBuf {
        transitions_dir.join(self.file_name())
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.half, self.inning)
    }
}

/// One at-bat's video with its own audio commentary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    /// Stable identifier from the play catalogue
    pub id: String,
    /// Source URL for the active feed
    pub source: String,
    /// The feed this instance was built from; immutable per instance
    pub feed: Feed,
    /// Feeds the play catalogue offers for this clip
    #[serde(default)]
    pub available_feeds: BTreeSet<Feed>,
    /// Half-inning the play occurred in, when known
    #[serde(default)]
    pub half: Option<HalfInning>,
    /// Inning the play occurred in, when known
    #[serde(default)]
    pub inning: Option<u8>,
    /// Batter name from the play catalogue
    #[serde(default)]
    pub batter: Option<String>,
    /// Pitcher name from the play catalogue
    #[serde(default)]
    pub pitcher: Option<String>,
    /// Event label from the play catalogue ("Home Run", "Strikeout", ...)
    #[serde(default)]
    pub event_label: Option<String>,
    /// Free-form description from the play catalogue
    #[serde(default)]
    pub description: Option<String>,
}

impl Clip {
    pub fn new(id: impl Into<String>, source: impl Into<String>, feed: Feed) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            feed,
            available_feeds: BTreeSet::new(),
            half: None,
            inning: None,
            batter: None,
            pitcher: None,
            event_label: None,
            description: None,
        }
    }

    /// Produce a new clip on a different feed. The transcript belongs to the
    /// audio of one feed, so the caller must re-transcribe the result.
    pub fn with_feed(&self, feed: Feed, source: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            source: source.into(),
            feed,
            available_feeds: self.available_feeds.clone(),
            half: self.half,
            inning: self.inning,
            batter: self.batter.clone(),
            pitcher: self.pitcher.clone(),
            event_label: self.event_label.clone(),
            description: self.description.clone(),
        }
    }
}

/// One positional entry in the rundown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RundownItem {
    /// A play clip with the segment indices the user kept
    Play {
        clip: Clip,
        selection: BTreeSet<usize>,
    },
    /// A pre-rendered inning-transition graphic
    Transition { key: TransitionKey },
    /// Brief title card extracted from an external highlight reel
    TitleCard { source_url: String },
}

impl RundownItem {
    /// Short label for logs and status reports
    pub fn label(&self) -> String {
        match self {
            RundownItem::Play { clip, .. } => format!("play:{}", clip.id),
            RundownItem::Transition { key } => format!("transition:{}", key),
            RundownItem::TitleCard { .. } => "title_card".to_string(),
        }
    }
}

/// The user's ordered specification of what the output contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rundown {
    /// Game identifier, used to key the run's working directory
    pub game_id: String,
    /// Ordered items
    pub items: Vec<RundownItem>,
}

impl Rundown {
    pub fn new(game_id: impl Into<String>, items: Vec<RundownItem>) -> Self {
        Self {
            game_id: game_id.into(),
            items,
        }
    }

    /// Parse a rundown from its JSON representation
    pub fn from_json(json: &str) -> ReelCutResult<Self> {
        serde_json::from_str(json).map_err(|e| ReelCutError::Validation {
            message: format!("malformed rundown: {}", e),
        })
    }

    /// Number of plays in the rundown
    pub fn play_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, RundownItem::Play { .. }))
            .count()
    }

    /// Validate structural invariants:
    /// - at most one title card, and only at position 0
    /// - transition keys name innings 1 through 9
    /// - plays carry non-empty selections
    /// - within an inning, the transition for a half precedes every play of
    ///   that half
    pub fn validate(&self) -> ReelCutResult<()> {
        if self.items.is_empty() {
            return Err(ReelCutError::Validation {
                message: "rundown is empty".to_string(),
            });
        }

        let mut seen_transitions: BTreeSet<(u8, HalfInning)> = BTreeSet::new();
        for (pos, item) in self.items.iter().enumerate() {
            match item {
                RundownItem::TitleCard { .. } => {
                    if pos != 0 {
                        return Err(ReelCutError::Validation {
                            message: format!("title card at position {}, only position 0 is allowed", pos),
                        });
                    }
                }
                RundownItem::Transition { key } => {
                    if !(1..=9).contains(&key.inning) {
                        return Err(ReelCutError::Validation {
                            message: format!("unknown transition key {}", key),
                        });
                    }
                    seen_transitions.insert((key.inning, key.half));
                }
                RundownItem::Play { clip, selection } => {
                    if selection.is_empty() {
                        return Err(ReelCutError::Validation {
                            message: format!("play {} has an empty selection", clip.id),
                        });
                    }
                    // If the rundown carries a transition for this play's
                    // half-inning, it must come before the play.
                    if let (Some(half), Some(inning)) = (clip.half, clip.inning) {
                        let has_own_transition = self.items.iter().any(|it| {
                            matches!(it, RundownItem::Transition { key }
                                if key.inning == inning && key.half == half)
                        });
                        if has_own_transition && !seen_transitions.contains(&(inning, half)) {
                            return Err(ReelCutError::Validation {
                                message: format!(
                                    "play {} ({} {}) appears before its half-inning transition",
                                    clip.id, half, inning
                                ),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(id: &str, half: HalfInning, inning: u8) -> RundownItem {
        let mut clip = Clip::new(id, format!("https://cdn.example.com/{}.mp4", id), Feed::Network);
        clip.half = Some(half);
        clip.inning = Some(inning);
        RundownItem::Play {
            clip,
            selection: BTreeSet::from([0]),
        }
    }

    fn transition(half: HalfInning, inning: u8) -> RundownItem {
        RundownItem::Transition {
            key: TransitionKey::new(half, inning),
        }
    }

    #[test]
    fn test_transition_key_file_name() {
        let key = TransitionKey::new(HalfInning::Top, 3);
        assert_eq!(key.file_name(), "top-3.mp4");
        let key = TransitionKey::new(HalfInning::Bot, 9);
        assert_eq!(key.file_name(), "bot-9.mp4");
    }

    #[test]
    fn test_valid_rundown() {
        let rundown = Rundown::new(
            "g123",
            vec![
                transition(HalfInning::Top, 1),
                play("a", HalfInning::Top, 1),
                transition(HalfInning::Bot, 1),
                play("b", HalfInning::Bot, 1),
            ],
        );
        assert!(rundown.validate().is_ok());
        assert_eq!(rundown.play_count(), 2);
    }

    #[test]
    fn test_title_card_must_lead() {
        let rundown = Rundown::new(
            "g123",
            vec![
                play("a", HalfInning::Top, 1),
                RundownItem::TitleCard {
                    source_url: "https://cdn.example.com/reel.mp4".to_string(),
                },
            ],
        );
        assert!(rundown.validate().is_err());
    }

    #[test]
    fn test_play_before_its_transition_rejected() {
        let rundown = Rundown::new(
            "g123",
            vec![play("a", HalfInning::Top, 1), transition(HalfInning::Top, 1)],
        );
        assert!(rundown.validate().is_err());
    }

    #[test]
    fn test_play_without_inning_metadata_passes() {
        let clip = Clip::new("x", "https://cdn.example.com/x.mp4", Feed::Home);
        let rundown = Rundown::new(
            "g123",
            vec![RundownItem::Play {
                clip,
                selection: BTreeSet::from([0, 1]),
            }],
        );
        assert!(rundown.validate().is_ok());
    }

    #[test]
    fn test_empty_selection_rejected() {
        let rundown = Rundown::new(
            "g123",
            vec![RundownItem::Play {
                clip: Clip::new("x", "https://cdn.example.com/x.mp4", Feed::Cms),
                selection: BTreeSet::new(),
            }],
        );
        assert!(rundown.validate().is_err());
    }

    #[test]
    fn test_invalid_inning_rejected() {
        let rundown = Rundown::new("g123", vec![transition(HalfInning::Top, 11)]);
        assert!(rundown.validate().is_err());
    }

    #[test]
    fn test_rundown_json_round_trip() {
        let rundown = Rundown::new(
            "g778",
            vec![
                RundownItem::TitleCard {
                    source_url: "https://cdn.example.com/reel.mp4".to_string(),
                },
                transition(HalfInning::Top, 1),
                play("p1", HalfInning::Top, 1),
            ],
        );
        let json = serde_json::to_string(&rundown).unwrap();
        let parsed = Rundown::from_json(&json).unwrap();
        assert_eq!(parsed.game_id, "g778");
        assert_eq!(parsed.items.len(), 3);
        assert!(matches!(parsed.items[0], RundownItem::TitleCard { .. }));
    }

    #[test]
    fn test_with_feed_keeps_identity() {
        let mut clip = Clip::new("c1", "https://cdn.example.com/net.mp4", Feed::Network);
        clip.available_feeds = BTreeSet::from([Feed::Network, Feed::Home]);
        let switched = clip.with_feed(Feed::Home, "https://cdn.example.com/home.mp4");
        assert_eq!(switched.id, "c1");
        assert_eq!(switched.feed, Feed::Home);
        assert_eq!(switched.source, "https://cdn.example.com/home.mp4");
        assert_eq!(switched.available_feeds.len(), 2);
    }
}
