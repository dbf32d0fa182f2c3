//! Pure state transition function
//!
//! Given the current state, the context, and one event, compute the next
//! state, the updated context, and the effects to run. No I/O happens here;
//! the only outside inputs are the content store and a random source for
//! round setup.
//!
//! Guarded branches are checked top to bottom and the first match wins.

use super::state::{
    AskStep, ClueStep, CorrectStep, GameContext, GameState, IncorrectStep, SettingsStep,
};
use super::{event, Effect, Event};
use crate::content::{pick_item, ContentStore};
use crate::nlu::{self, Category, Difficulty, EntityKind, Intent, NluResult, SlotFill};
use rand::Rng;
use thiserror::Error;

const WELCOME: &str = "Welcome to Trivaso! Choose a category and a difficulty.";
const SETTINGS_REPROMPT: &str =
    "I'm sorry, I didn't get that. Please select a category and difficulty.";
const ASK_CATEGORY: &str = "Please select a category.";
const ASK_DIFFICULTY: &str = "Please select a difficulty.";
const ASK_NEXT_CLUE: &str = "Incorrect answer. Would you like to continue with the next clue?";
const PLAY_AGAIN: &str =
    "Would you like to play again? Please state the category and difficulty if different.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: GameState,
    pub new_context: GameContext,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: GameState, context: GameContext) -> Self {
        Self {
            new_state: state,
            new_context: context,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("{event} is not handled in {state}")]
    Unhandled { state: String, event: &'static str },
    #[error("Cannot start a round without a category and difficulty")]
    SettingsMissing,
    #[error("No {difficulty} items for category {category}")]
    NoCandidates {
        category: Category,
        difficulty: Difficulty,
    },
}

impl TransitionError {
    /// Errors that mean the session cannot continue
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransitionError::Unhandled { .. })
    }
}

/// Initial state and the effects issued when a session starts
pub fn start() -> TransitionResult {
    TransitionResult::new(GameState::Prepare, GameContext::default()).with_effect(Effect::Prepare)
}

/// Pure transition function
#[allow(clippy::too_many_lines)] // One arm per row of the transition table
pub fn transition<R: Rng + ?Sized>(
    state: &GameState,
    context: &GameContext,
    event: Event,
    content: &ContentStore,
    rng: &mut R,
) -> Result<TransitionResult, TransitionError> {
    let mut ctx = context.clone();

    match (state, event) {
        // ============================================================
        // Startup
        // ============================================================
        (GameState::Prepare, Event::SpeechReady) => Ok(enter_wait_to_start(ctx)),

        (GameState::WaitToStart | GameState::Done, Event::StartClicked) => {
            Ok(enter_greeting(ctx))
        }

        (GameState::Greeting, Event::SpeakComplete) => Ok(enter_game_settings(ctx)),

        // ============================================================
        // Game settings
        // ============================================================
        (
            GameState::GetGameSettings {
                step: SettingsStep::Listening,
            },
            Event::Recognised { value, nlu_value },
        ) => {
            let nlu = nlu_value.as_ref();
            ctx.transcript = event::transcript(&value);
            ctx.intent = nlu.and_then(NluResult::intent);
            ctx.category = nlu::extract_slot(nlu, EntityKind::Category);
            ctx.difficulty = nlu::extract_slot(nlu, EntityKind::Difficulty);
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::GetGameSettings {
                step: SettingsStep::Listening,
            },
            Event::NoInput,
        ) => {
            ctx.clear_settings();
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::GetGameSettings {
                step: SettingsStep::NoInput,
            },
            Event::SpeakComplete,
        ) => Ok(listen_in(
            GameState::GetGameSettings {
                step: SettingsStep::Listening,
            },
            ctx,
        )),

        (
            GameState::GetGameSettings {
                step: SettingsStep::GetCategory { step: AskStep::Ask },
            },
            Event::SpeakComplete,
        ) => Ok(listen_in(
            GameState::GetGameSettings {
                step: SettingsStep::GetCategory {
                    step: AskStep::Listen,
                },
            },
            ctx,
        )),

        (
            GameState::GetGameSettings {
                step: SettingsStep::GetCategory {
                    step: AskStep::Listen,
                },
            },
            Event::Recognised { value, nlu_value },
        ) => {
            let raw = event::raw_text(&value, nlu_value.as_ref());
            let SlotFill { value: category, intent } =
                nlu::fill_slot(nlu_value.as_ref(), &raw, EntityKind::Category);
            ctx.transcript = event::transcript(&value);
            ctx.category = category;
            ctx.intent = intent;
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::GetGameSettings {
                step: SettingsStep::GetCategory {
                    step: AskStep::Listen,
                },
            },
            Event::NoInput,
        ) => {
            ctx.category = None;
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::GetGameSettings {
                step: SettingsStep::GetDifficulty { step: AskStep::Ask },
            },
            Event::SpeakComplete,
        ) => Ok(listen_in(
            GameState::GetGameSettings {
                step: SettingsStep::GetDifficulty {
                    step: AskStep::Listen,
                },
            },
            ctx,
        )),

        (
            GameState::GetGameSettings {
                step: SettingsStep::GetDifficulty {
                    step: AskStep::Listen,
                },
            },
            Event::Recognised { value, nlu_value },
        ) => {
            let raw = event::raw_text(&value, nlu_value.as_ref());
            let SlotFill {
                value: difficulty,
                intent,
            } = nlu::fill_slot(nlu_value.as_ref(), &raw, EntityKind::Difficulty);
            ctx.transcript = event::transcript(&value);
            ctx.difficulty = difficulty;
            ctx.intent = intent;
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::GetGameSettings {
                step: SettingsStep::GetDifficulty {
                    step: AskStep::Listen,
                },
            },
            Event::NoInput,
        ) => {
            ctx.difficulty = None;
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (GameState::GetGameSettings { .. }, Event::ListenComplete) => {
            settings_branch(state, ctx, content, rng)
        }

        // ============================================================
        // Clues
        // ============================================================
        (
            GameState::PlayClue {
                step: ClueStep::SayClue,
            },
            Event::SpeakComplete,
        ) => Ok(listen_in(
            GameState::PlayClue {
                step: ClueStep::GetAnswer,
            },
            ctx,
        )),

        (
            GameState::PlayClue {
                step: ClueStep::GetAnswer,
            },
            Event::Recognised { value, nlu_value },
        ) => {
            let nlu = nlu_value.as_ref();
            let guess = nlu
                .and_then(|n| nlu::extract_entity(&n.entities, EntityKind::Guess))
                .map(|g| g.to_lowercase());
            ctx.intent = if guess.is_some() {
                Some(Intent::GuessedAnswer)
            } else {
                nlu.and_then(NluResult::intent)
            };
            ctx.answer = guess;
            ctx.transcript = event::transcript(&value);
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::PlayClue {
                step: ClueStep::GetAnswer,
            },
            Event::NoInput,
        ) => {
            ctx.answer = None;
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (GameState::PlayClue { .. }, Event::ListenComplete) => Ok(clue_branch(state, ctx)),

        // ============================================================
        // Correct answer
        // ============================================================
        (
            GameState::CorrectAnswer {
                step: CorrectStep::DelayBeforeSpeak,
            },
            Event::DelayElapsed,
        ) => Ok(enter_ask_to_restart(ctx)),

        (
            GameState::CorrectAnswer {
                step: CorrectStep::AskToRestart,
            },
            Event::SpeakComplete,
        ) => Ok(listen_in(
            GameState::CorrectAnswer {
                step: CorrectStep::GetConfirmation,
            },
            ctx,
        )),

        (
            GameState::CorrectAnswer {
                step: CorrectStep::GetConfirmation,
            }
            | GameState::IncorrectAnswer {
                step: IncorrectStep::GetAnswer,
            },
            Event::Recognised { value, nlu_value },
        ) => {
            ctx.transcript = event::transcript(&value);
            apply_replay_request(&mut ctx, nlu_value.as_ref());
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (
            GameState::CorrectAnswer {
                step: CorrectStep::GetConfirmation,
            }
            | GameState::IncorrectAnswer {
                step: IncorrectStep::GetAnswer,
            },
            Event::NoInput,
        ) => {
            ctx.intent = None;
            Ok(TransitionResult::new(state.clone(), ctx))
        }

        (GameState::CorrectAnswer { .. }, Event::ListenComplete) => {
            correct_branch(state, ctx, content, rng)
        }

        // ============================================================
        // Incorrect answer
        // ============================================================
        (
            GameState::IncorrectAnswer {
                step: IncorrectStep::DelayBeforeNextClue,
            },
            Event::DelayElapsed,
        ) => {
            if ctx.has_more_clues() {
                Ok(enter_ask_next_clue(ctx))
            } else {
                Ok(enter_handle_last_clue(ctx))
            }
        }

        (
            GameState::IncorrectAnswer {
                step: IncorrectStep::HandleLastClue | IncorrectStep::AskNextClue,
            },
            Event::SpeakComplete,
        ) => Ok(listen_in(
            GameState::IncorrectAnswer {
                step: IncorrectStep::GetAnswer,
            },
            ctx,
        )),

        (GameState::IncorrectAnswer { .. }, Event::ListenComplete) => {
            incorrect_branch(state, ctx, content, rng)
        }

        // ============================================================
        // End of game
        // ============================================================
        (GameState::GameOver, Event::SpeakComplete) => {
            Ok(TransitionResult::new(GameState::Done, ctx))
        }

        // ============================================================
        // Anything else is ignored by the caller
        // ============================================================
        (state, event) => Err(TransitionError::Unhandled {
            state: state.path(),
            event: event.name(),
        }),
    }
}

// ============================================================================
// Guarded branches
// ============================================================================

/// Classification resolved while collecting settings
fn settings_branch<R: Rng + ?Sized>(
    state: &GameState,
    ctx: GameContext,
    content: &ContentStore,
    rng: &mut R,
) -> Result<TransitionResult, TransitionError> {
    if ctx.category.is_some() && ctx.difficulty.is_some() {
        return start_game(ctx, content, rng);
    }

    if ctx.intent == Some(Intent::Cancel) {
        return Ok(enter_game_over(ctx));
    }

    // Nothing usable and no request to pick settings: generic re-prompt
    if ctx.category.is_none()
        && ctx.difficulty.is_none()
        && ctx.intent != Some(Intent::SelectGameSettings)
    {
        return Ok(TransitionResult::new(
            GameState::GetGameSettings {
                step: SettingsStep::NoInput,
            },
            ctx,
        )
        .with_effect(Effect::speak(SETTINGS_REPROMPT)));
    }

    if ctx.category.is_none() {
        return Ok(TransitionResult::new(
            GameState::GetGameSettings {
                step: SettingsStep::GetCategory { step: AskStep::Ask },
            },
            ctx,
        )
        .with_effect(Effect::speak(ASK_CATEGORY)));
    }

    if ctx.difficulty.is_none() {
        return Ok(TransitionResult::new(
            GameState::GetGameSettings {
                step: SettingsStep::GetDifficulty { step: AskStep::Ask },
            },
            ctx,
        )
        .with_effect(Effect::speak(ASK_DIFFICULTY)));
    }

    Ok(TransitionResult::new(state.clone(), ctx))
}

/// Classification resolved after a clue
fn clue_branch(state: &GameState, mut ctx: GameContext) -> TransitionResult {
    let guessed = ctx.intent == Some(Intent::GuessedAnswer);
    let matches = ctx.answer_matches();
    let more = ctx.has_more_clues();

    if matches && guessed {
        return enter_correct_answer(ctx);
    }

    // Cancel wins over running out of clues
    if ctx.intent == Some(Intent::Cancel) {
        return enter_game_over(ctx);
    }

    if (guessed && !matches)
        || (!more && (ctx.answer.is_none() || ctx.intent == Some(Intent::NextClue)))
    {
        return enter_incorrect_answer(ctx);
    }

    if (ctx.intent == Some(Intent::NextClue) || ctx.answer.is_none()) && more {
        ctx.next_clue();
        return enter_play_clue(ctx);
    }

    TransitionResult::new(state.clone(), ctx)
}

/// Classification resolved after "play again?" following a correct guess
fn correct_branch<R: Rng + ?Sized>(
    state: &GameState,
    ctx: GameContext,
    content: &ContentStore,
    rng: &mut R,
) -> Result<TransitionResult, TransitionError> {
    match ctx.intent.clone() {
        Some(intent) if intent.is_replay() => start_game(ctx, content, rng),
        Some(Intent::Cancel) | None => Ok(enter_game_over(ctx)),
        Some(_) => Ok(TransitionResult::new(state.clone(), ctx)),
    }
}

/// Classification resolved after a wrong guess or the last clue
fn incorrect_branch<R: Rng + ?Sized>(
    state: &GameState,
    mut ctx: GameContext,
    content: &ContentStore,
    rng: &mut R,
) -> Result<TransitionResult, TransitionError> {
    let more = ctx.has_more_clues();

    // "Yes" to the next clue continues the same item
    if ctx.intent == Some(Intent::Confirm) && more {
        ctx.next_clue();
        return Ok(enter_play_clue(ctx));
    }

    if ctx.intent.as_ref().is_some_and(Intent::is_replay) {
        return start_game(ctx, content, rng);
    }

    if ctx.intent == Some(Intent::Cancel) {
        return Ok(enter_game_over(ctx));
    }

    if !more {
        return Ok(enter_handle_last_clue(ctx));
    }

    if ctx.intent.is_none() {
        return Ok(enter_ask_next_clue(ctx));
    }

    Ok(TransitionResult::new(state.clone(), ctx))
}

/// Settings given while asked to play again override the stored ones only
/// when present and valid
fn apply_replay_request(ctx: &mut GameContext, nlu: Option<&NluResult>) {
    let intent = nlu.and_then(NluResult::intent);
    if intent == Some(Intent::SelectGameSettings) {
        if let Some(category) = nlu::extract_slot(nlu, EntityKind::Category) {
            ctx.category = Some(category);
        }
        if let Some(difficulty) = nlu::extract_slot(nlu, EntityKind::Difficulty) {
            ctx.difficulty = Some(difficulty);
        }
    }
    ctx.intent = intent;
}

// ============================================================================
// Entry actions
// ============================================================================

fn listen_in(state: GameState, ctx: GameContext) -> TransitionResult {
    TransitionResult::new(state, ctx).with_effect(Effect::Listen)
}

fn enter_wait_to_start(mut ctx: GameContext) -> TransitionResult {
    ctx.clear_settings();
    TransitionResult::new(GameState::WaitToStart, ctx)
}

fn enter_greeting(mut ctx: GameContext) -> TransitionResult {
    ctx.reset_all();
    TransitionResult::new(GameState::Greeting, ctx).with_effect(Effect::speak(WELCOME))
}

fn enter_game_settings(mut ctx: GameContext) -> TransitionResult {
    ctx.clear_settings();
    listen_in(
        GameState::GetGameSettings {
            step: SettingsStep::Listening,
        },
        ctx,
    )
}

/// Pick a new item for the stored settings and read its first clue
fn start_game<R: Rng + ?Sized>(
    mut ctx: GameContext,
    content: &ContentStore,
    rng: &mut R,
) -> Result<TransitionResult, TransitionError> {
    let (Some(category), Some(difficulty)) = (ctx.category, ctx.difficulty) else {
        return Err(TransitionError::SettingsMissing);
    };

    let previous = ctx.current_item.take();
    ctx.reset_round();

    let candidates = content.items_for(category, difficulty);
    let item = pick_item(&candidates, previous.as_ref(), rng).ok_or(
        TransitionError::NoCandidates {
            category,
            difficulty,
        },
    )?;

    ctx.clues.clone_from(&item.clues);
    ctx.current_item = Some(item.clone());
    ctx.current_clue_index = 0;
    ctx.intent = None;

    Ok(enter_play_clue(ctx))
}

fn enter_play_clue(ctx: GameContext) -> TransitionResult {
    let utterance = format!("Here is your clue: {}", ctx.current_clue().unwrap_or_default());
    TransitionResult::new(
        GameState::PlayClue {
            step: ClueStep::SayClue,
        },
        ctx,
    )
    .with_effect(Effect::speak(utterance))
}

fn enter_correct_answer(mut ctx: GameContext) -> TransitionResult {
    ctx.intent = None;
    TransitionResult::new(
        GameState::CorrectAnswer {
            step: CorrectStep::DelayBeforeSpeak,
        },
        ctx,
    )
    .with_effect(Effect::StartAnswerDelay)
}

fn enter_ask_to_restart(mut ctx: GameContext) -> TransitionResult {
    let points = ctx.award_points();
    let utterance = format!(
        "Correct! You earned {points} points. Your total score is {}. {PLAY_AGAIN}",
        ctx.score
    );
    TransitionResult::new(
        GameState::CorrectAnswer {
            step: CorrectStep::AskToRestart,
        },
        ctx,
    )
    .with_effect(Effect::speak(utterance))
}

fn enter_incorrect_answer(mut ctx: GameContext) -> TransitionResult {
    ctx.intent = None;
    TransitionResult::new(
        GameState::IncorrectAnswer {
            step: IncorrectStep::DelayBeforeNextClue,
        },
        ctx,
    )
    .with_effect(Effect::StartAnswerDelay)
}

fn enter_handle_last_clue(ctx: GameContext) -> TransitionResult {
    let name = ctx
        .current_item
        .as_ref()
        .map(|i| i.name.as_str())
        .unwrap_or_default();
    let utterance = if ctx.answer.is_some() {
        format!("Incorrect! The correct answer was {name}. {PLAY_AGAIN}")
    } else {
        format!("You've reached the last clue. The correct answer was {name}. {PLAY_AGAIN}")
    };
    TransitionResult::new(
        GameState::IncorrectAnswer {
            step: IncorrectStep::HandleLastClue,
        },
        ctx,
    )
    .with_effect(Effect::speak(utterance))
}

fn enter_ask_next_clue(ctx: GameContext) -> TransitionResult {
    TransitionResult::new(
        GameState::IncorrectAnswer {
            step: IncorrectStep::AskNextClue,
        },
        ctx,
    )
    .with_effect(Effect::speak(ASK_NEXT_CLUE))
}

fn enter_game_over(ctx: GameContext) -> TransitionResult {
    let utterance = format!(
        "Game over! Your final score is {}. Please press on Start if you want to play again",
        ctx.score
    );
    TransitionResult::new(GameState::GameOver, ctx).with_effect(Effect::speak(utterance))
}
