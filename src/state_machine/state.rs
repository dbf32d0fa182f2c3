//! Dialogue state and conversation context

use crate::content::Item;
use crate::nlu::{Category, Difficulty, Intent};
use serde::Serialize;
use std::fmt;

// ============================================================================
// Game State
// ============================================================================

/// Top-level dialogue state
///
/// Compound states carry the active child. `StartGame` has no variant: it
/// only runs its entry action and moves straight on to `PlayClue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameState {
    /// Waiting for the speech service to come up
    #[default]
    Prepare,

    /// Speech is ready, waiting for the start button
    WaitToStart,

    /// Speaking the welcome
    Greeting,

    /// Collecting category and difficulty
    GetGameSettings { step: SettingsStep },

    /// Reading a clue and listening for a guess
    PlayClue { step: ClueStep },

    /// The guess was right
    CorrectAnswer { step: CorrectStep },

    /// The guess was wrong, or the clues ran out
    IncorrectAnswer { step: IncorrectStep },

    /// Speaking the final score
    GameOver,

    /// Waiting for the start button again
    Done,
}

/// Children of `GetGameSettings`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingsStep {
    Listening,
    NoInput,
    GetCategory { step: AskStep },
    GetDifficulty { step: AskStep },
}

/// Speak-then-listen pair used to ask for a single setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AskStep {
    Ask,
    Listen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClueStep {
    SayClue,
    GetAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectStep {
    DelayBeforeSpeak,
    AskToRestart,
    GetConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncorrectStep {
    DelayBeforeNextClue,
    HandleLastClue,
    AskNextClue,
    GetAnswer,
}

impl GameState {
    /// Dotted path from the root to the active leaf, e.g.
    /// `GetGameSettings.GetCategory.AskForCategory`
    pub fn path(&self) -> String {
        let segments: Vec<&str> = match self {
            GameState::Prepare => vec!["Prepare"],
            GameState::WaitToStart => vec!["WaitToStart"],
            GameState::Greeting => vec!["Greeting"],
            GameState::GetGameSettings { step } => {
                let mut path = vec!["GetGameSettings"];
                match step {
                    SettingsStep::Listening => path.push("Listening"),
                    SettingsStep::NoInput => path.push("NoInput"),
                    SettingsStep::GetCategory { step } => path.extend([
                        "GetCategory",
                        match step {
                            AskStep::Ask => "AskForCategory",
                            AskStep::Listen => "GetCat",
                        },
                    ]),
                    SettingsStep::GetDifficulty { step } => path.extend([
                        "GetDifficulty",
                        match step {
                            AskStep::Ask => "AskForDifficulty",
                            AskStep::Listen => "GetDif",
                        },
                    ]),
                }
                path
            }
            GameState::PlayClue { step } => vec![
                "PlayClue",
                match step {
                    ClueStep::SayClue => "SayClue",
                    ClueStep::GetAnswer => "GetAnswer",
                },
            ],
            GameState::CorrectAnswer { step } => vec![
                "CorrectAnswer",
                match step {
                    CorrectStep::DelayBeforeSpeak => "DelayBeforeSpeak",
                    CorrectStep::AskToRestart => "AskToRestart",
                    CorrectStep::GetConfirmation => "GetConfirmation",
                },
            ],
            GameState::IncorrectAnswer { step } => vec![
                "IncorrectAnswer",
                match step {
                    IncorrectStep::DelayBeforeNextClue => "DelayBeforeNextClue",
                    IncorrectStep::HandleLastClue => "HandleLastClue",
                    IncorrectStep::AskNextClue => "AskNextClue",
                    IncorrectStep::GetAnswer => "GetAnswer",
                },
            ],
            GameState::GameOver => vec!["GameOver"],
            GameState::Done => vec!["Done"],
        };
        segments.join(".")
    }

    /// States in which the speech service is listening for the user
    pub fn is_listening(&self) -> bool {
        matches!(
            self,
            GameState::GetGameSettings {
                step: SettingsStep::Listening
                    | SettingsStep::GetCategory { step: AskStep::Listen }
                    | SettingsStep::GetDifficulty { step: AskStep::Listen }
            } | GameState::PlayClue {
                step: ClueStep::GetAnswer
            } | GameState::CorrectAnswer {
                step: CorrectStep::GetConfirmation
            } | GameState::IncorrectAnswer {
                step: IncorrectStep::GetAnswer
            }
        )
    }

    /// States waiting on the post-answer timer
    pub fn is_delaying(&self) -> bool {
        matches!(
            self,
            GameState::CorrectAnswer {
                step: CorrectStep::DelayBeforeSpeak
            } | GameState::IncorrectAnswer {
                step: IncorrectStep::DelayBeforeNextClue
            }
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// ============================================================================
// Game Context
// ============================================================================

/// Points for a correct guess at a given clue
pub fn points_for_clue(clue_index: usize) -> u32 {
    let index = u32::try_from(clue_index).unwrap_or(u32::MAX);
    10u32.saturating_sub(index).max(1)
}

/// Conversation memory, owned by one session and reset field by field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameContext {
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub intent: Option<Intent>,
    pub current_item: Option<Item>,
    /// Clues of `current_item`, fixed for the round
    pub clues: Vec<String>,
    pub current_clue_index: usize,
    pub score: u32,
    /// Score before the last award, for the "+N" display
    pub previous_score: u32,
    /// Last extracted guess, lower-cased
    pub answer: Option<String>,
    /// Last recognized utterance, display only
    pub transcript: String,
}

impl GameContext {
    /// Forget settings so nothing leaks into the next selection
    pub fn clear_settings(&mut self) {
        self.category = None;
        self.difficulty = None;
        self.intent = None;
    }

    /// Full reset for a new session
    pub fn reset_all(&mut self) {
        *self = GameContext::default();
    }

    /// Clear the per-round fields ahead of picking a new item
    pub fn reset_round(&mut self) {
        self.current_item = None;
        self.current_clue_index = 0;
        self.clues.clear();
        self.answer = None;
    }

    /// Whether another clue follows the current one
    pub fn has_more_clues(&self) -> bool {
        self.current_clue_index + 1 < self.clues.len()
    }

    pub fn current_clue(&self) -> Option<&str> {
        self.clues.get(self.current_clue_index).map(String::as_str)
    }

    pub fn next_clue(&mut self) {
        if self.has_more_clues() {
            self.current_clue_index += 1;
        }
    }

    /// Whether the stored guess names the current item
    pub fn answer_matches(&self) -> bool {
        match (&self.answer, &self.current_item) {
            (Some(answer), Some(item)) => item.is_named(answer),
            _ => false,
        }
    }

    /// Award points for the current clue and return them
    pub fn award_points(&mut self) -> u32 {
        let points = points_for_clue(self.current_clue_index);
        self.previous_score = self.score;
        self.score = self.score.saturating_add(points);
        points
    }

    /// Score gained by the last award
    pub fn points_delta(&self) -> u32 {
        self.score.saturating_sub(self.previous_score)
    }
}
