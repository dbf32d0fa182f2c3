//! Language understanding payloads and slot extraction
//!
//! The classifier itself is an external collaborator. This module only
//! describes the shape of what it returns and pulls typed values out of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Closed vocabularies
// ============================================================================

/// Error returned when a string is outside one of the closed vocabularies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

/// Game category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Countries,
    Animals,
    Languages,
    Movies,
    Sports,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Countries,
        Category::Animals,
        Category::Languages,
        Category::Movies,
        Category::Sports,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Countries => "countries",
            Category::Animals => "animals",
            Category::Languages => "languages",
            Category::Movies => "movies",
            Category::Sports => "sports",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownValue {
                kind: "category",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownValue {
                kind: "difficulty",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified intent label
///
/// Labels the dialogue reacts to get their own variant. Anything else the
/// classifier produces is carried as `Other` so it still counts as "some
/// intent" in guards that distinguish present from absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    SelectGameSettings,
    GuessedAnswer,
    Confirm,
    Restart,
    Cancel,
    NextClue,
    Other(String),
}

impl Intent {
    pub fn label(&self) -> &str {
        match self {
            Intent::SelectGameSettings => "selectGameSettings",
            Intent::GuessedAnswer => "guessedAnswer",
            Intent::Confirm => "confirm",
            Intent::Restart => "restart",
            Intent::Cancel => "cancel",
            Intent::NextClue => "nextClue",
            Intent::Other(label) => label,
        }
    }

    /// Intents that ask for another round
    pub fn is_replay(&self) -> bool {
        matches!(
            self,
            Intent::Restart | Intent::Confirm | Intent::SelectGameSettings
        )
    }
}

impl From<String> for Intent {
    fn from(label: String) -> Self {
        match label.as_str() {
            "selectGameSettings" => Intent::SelectGameSettings,
            "guessedAnswer" => Intent::GuessedAnswer,
            "confirm" => Intent::Confirm,
            "restart" => Intent::Restart,
            "cancel" => Intent::Cancel,
            "nextClue" => Intent::NextClue,
            _ => Intent::Other(label),
        }
    }
}

impl From<&str> for Intent {
    fn from(label: &str) -> Self {
        Intent::from(label.to_string())
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// One speech recognition hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub utterance: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Classifier output for one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluResult {
    #[serde(default)]
    pub top_intent: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// The utterance the classifier saw
    #[serde(default)]
    pub text: Option<String>,
}

impl NluResult {
    pub fn intent(&self) -> Option<Intent> {
        self.top_intent
            .as_deref()
            .filter(|label| !label.is_empty())
            .map(Intent::from)
    }
}

/// A typed span pulled out of an utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_information: Option<ExtraInformation>,
}

/// Canonicalization data attached to list entities
///
/// The classifier sends either a single object or an array of them. Any
/// other shape is kept but yields no key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraInformation {
    Many(Vec<ExtraInfo>),
    One(ExtraInfo),
    Malformed(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_information_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ExtraInformation {
    /// Canonical key, taken from the first record when there are several
    pub fn key(&self) -> Option<&str> {
        let key = match self {
            ExtraInformation::Many(infos) => infos.first().and_then(|i| i.key.as_deref()),
            ExtraInformation::One(info) => info.key.as_deref(),
            ExtraInformation::Malformed(_) => None,
        };
        key.filter(|k| !k.is_empty())
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Entity categories the dialogue asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Category,
    Difficulty,
    Guess,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Difficulty => "difficulty",
            EntityKind::Guess => "guess",
        }
    }
}

/// Text of the first entity of `kind`.
///
/// Difficulty entities prefer their canonical key, so "tough" and
/// "difficult" both come back as the key the classifier maps them to.
/// Case is left alone; callers lower-case.
pub fn extract_entity(entities: &[Entity], kind: EntityKind) -> Option<String> {
    let entity = entities.iter().find(|e| e.category == kind.as_str())?;

    if kind == EntityKind::Difficulty {
        if let Some(key) = entity.extra_information.as_ref().and_then(ExtraInformation::key) {
            return Some(key.to_string());
        }
    }

    if entity.text.is_empty() {
        None
    } else {
        Some(entity.text.clone())
    }
}

/// Extract and validate one slot without falling back to raw text
pub fn extract_slot<T: FromStr>(nlu: Option<&NluResult>, kind: EntityKind) -> Option<T> {
    nlu.and_then(|n| extract_entity(&n.entities, kind))
        .and_then(|text| text.to_lowercase().parse().ok())
}

/// Result of filling a slot with the raw-text fallback
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFill<T> {
    pub value: Option<T>,
    pub intent: Option<Intent>,
}

/// Fill a slot from entities, falling back to the raw utterance.
///
/// The raw text is only consulted when no entity of `kind` exists. Whenever
/// a valid value comes out, the intent is forced to `selectGameSettings`
/// because short one-word answers are often misclassified.
pub fn fill_slot<T: FromStr>(nlu: Option<&NluResult>, raw_text: &str, kind: EntityKind) -> SlotFill<T> {
    let value = match nlu.and_then(|n| extract_entity(&n.entities, kind)) {
        Some(text) => text.to_lowercase().parse().ok(),
        None => normalize_utterance(raw_text).parse().ok(),
    };

    let intent = if value.is_some() {
        Some(Intent::SelectGameSettings)
    } else {
        nlu.and_then(NluResult::intent)
    };

    SlotFill { value, intent }
}

/// Lower-case and strip the sentence punctuation recognizers append
fn normalize_utterance(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase()
}
