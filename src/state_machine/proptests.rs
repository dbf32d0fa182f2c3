//! Property-based tests for the state machine
//!
//! These tests drive whole games through the pure transition function with
//! seeded randomness and check the invariants that must hold for any input.

use super::state::*;
use super::transition::*;
use super::*;
use crate::content::ContentStore;
use crate::nlu::{self, Category, Difficulty, Entity, EntityKind, Intent, NluResult, SlotFill};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::OnceLock;

// ============================================================================
// Test Helpers
// ============================================================================

fn store() -> &'static ContentStore {
    static STORE: OnceLock<ContentStore> = OnceLock::new();
    STORE.get_or_init(|| ContentStore::builtin().unwrap())
}

fn entity(category: &str, text: &str) -> Entity {
    Entity {
        category: category.to_string(),
        text: text.to_string(),
        extra_information: None,
    }
}

fn heard(text: &str, intent: &str, entities: Vec<Entity>) -> Event {
    Event::recognised(
        text,
        Some(NluResult {
            top_intent: Some(intent.to_string()),
            entities,
            text: Some(text.to_string()),
        }),
    )
}

/// A single session driven through `transition`
struct Game {
    state: GameState,
    ctx: GameContext,
    rng: StdRng,
}

impl Game {
    fn new(seed: u64) -> Self {
        let started = start();
        Self {
            state: started.new_state,
            ctx: started.new_context,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn fire(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let result = transition(&self.state, &self.ctx, event, store(), &mut self.rng)?;
        self.state = result.new_state;
        self.ctx = result.new_context;
        Ok(result.effects)
    }

    fn must(&mut self, event: Event) {
        let name = event.name();
        if let Err(e) = self.fire(event) {
            panic!("{name} failed in {}: {e}", self.state);
        }
    }

    /// Startup through the welcome, ending in settings collection
    fn to_settings(&mut self) {
        self.must(Event::SpeechReady);
        self.must(Event::StartClicked);
        self.must(Event::SpeakComplete);
    }

    /// Say both settings in one go, ending while listening for a guess
    fn choose(&mut self, category: Category, difficulty: Difficulty) {
        self.must(heard(
            "settings",
            "selectGameSettings",
            vec![
                entity("category", category.as_str()),
                entity("difficulty", difficulty.as_str()),
            ],
        ));
        self.must(Event::ListenComplete);
        self.must(Event::SpeakComplete);
    }

    fn ask_next_clue(&mut self) {
        self.must(heard("next clue", "nextClue", vec![]));
        self.must(Event::ListenComplete);
        self.must(Event::SpeakComplete);
    }

    /// Guess the current item, ending while asked to play again
    fn guess_right(&mut self) {
        let name = self.ctx.current_item.as_ref().unwrap().name.to_uppercase();
        self.must(heard(&name, "guessedAnswer", vec![entity("guess", &name)]));
        self.must(Event::ListenComplete);
        self.must(Event::DelayElapsed);
        self.must(Event::SpeakComplete);
    }

    fn restart(&mut self) {
        self.must(heard("again", "restart", vec![]));
        self.must(Event::ListenComplete);
        self.must(Event::SpeakComplete);
    }

    fn item_name(&self) -> String {
        self.ctx.current_item.as_ref().unwrap().name.clone()
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
    prop::sample::select(Difficulty::ALL.to_vec())
}

fn arb_intent_label() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "selectGameSettings",
        "guessedAnswer",
        "confirm",
        "restart",
        "cancel",
        "nextClue",
        "chitchat",
    ])
    .prop_map(String::from)
}

fn arb_entity() -> impl Strategy<Value = Entity> {
    prop_oneof![
        arb_category().prop_map(|c| entity("category", c.as_str())),
        arb_difficulty().prop_map(|d| entity("difficulty", d.as_str())),
        Just(entity("category", "cooking")),
        Just(entity("guess", "lion")),
        Just(entity("guess", "france")),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::SpeechReady),
        Just(Event::StartClicked),
        Just(Event::SpeakComplete),
        Just(Event::NoInput),
        Just(Event::ListenComplete),
        Just(Event::DelayElapsed),
        (
            "[a-z ]{0,12}",
            arb_intent_label(),
            proptest::collection::vec(arb_entity(), 0..3)
        )
            .prop_map(|(text, intent, entities)| heard(&text, &intent, entities)),
    ]
}

/// Surface variations of a vocabulary word as a speech recognizer writes it
fn arb_spoken(word: &'static str) -> impl Strategy<Value = String> {
    (
        proptest::collection::vec(any::<bool>(), word.len()),
        prop::sample::select(vec!["", ".", "!", "?"]),
        prop::sample::select(vec!["", " ", "  "]),
    )
        .prop_map(move |(upper, punct, pad)| {
            let cased: String = word
                .chars()
                .zip(upper)
                .map(|(c, u)| if u { c.to_ascii_uppercase() } else { c })
                .collect();
            format!("{pad}{cased}{punct}{pad}")
        })
}

fn arb_spoken_category() -> impl Strategy<Value = (Category, String)> {
    arb_category().prop_flat_map(|c| arb_spoken(c.as_str()).prop_map(move |s| (c, s)))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // No item is played twice in a row while its tier has alternatives
    #[test]
    fn prop_restart_never_repeats_item(
        seed in any::<u64>(),
        category in arb_category(),
        difficulty in arb_difficulty()
    ) {
        prop_assume!(store().items_for(category, difficulty).len() >= 2);

        let mut game = Game::new(seed);
        game.to_settings();
        game.choose(category, difficulty);

        let mut previous = game.item_name();
        for _ in 0..100 {
            game.guess_right();
            game.restart();
            let current = game.item_name();
            prop_assert_ne!(&current, &previous);
            prop_assert_eq!(game.ctx.current_clue_index, 0);
            previous = current;
        }
    }

    // The score is the sum of max(10 - clue index, 1) over correct guesses
    #[test]
    fn prop_score_sums_clue_points(
        seed in any::<u64>(),
        category in arb_category(),
        difficulty in arb_difficulty(),
        clue_counts in proptest::collection::vec(0usize..8, 1..6)
    ) {
        let mut game = Game::new(seed);
        game.to_settings();
        game.choose(category, difficulty);

        let mut expected = 0u32;
        for (round, wanted) in clue_counts.iter().enumerate() {
            if round > 0 {
                game.restart();
            }
            let last = game.ctx.clues.len() - 1;
            for _ in 0..(*wanted).min(last) {
                game.ask_next_clue();
            }
            let index = game.ctx.current_clue_index;
            prop_assert_eq!(index, (*wanted).min(last));

            let before = game.ctx.score;
            game.guess_right();
            expected += points_for_clue(index);
            prop_assert_eq!(game.ctx.score, expected);
            prop_assert_eq!(game.ctx.previous_score, before);
        }
    }

    // Arbitrary event streams never break the session
    #[test]
    fn prop_random_events_never_fatal(
        seed in any::<u64>(),
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let mut game = Game::new(seed);
        for event in events {
            let before = game.state.clone();
            match game.fire(event) {
                Ok(_) => {}
                Err(e) => {
                    prop_assert!(!e.is_fatal(), "fatal error {} in {}", e, before);
                    prop_assert_eq!(&game.state, &before);
                }
            }

            prop_assert!(game.ctx.score >= game.ctx.previous_score);
            if !game.ctx.clues.is_empty() {
                prop_assert!(game.ctx.current_clue_index < game.ctx.clues.len());
            }
            if matches!(game.state, GameState::PlayClue { .. }) {
                prop_assert!(game.ctx.current_item.is_some());
                prop_assert!(!game.ctx.clues.is_empty());
            }
        }
    }

    // A cancel while collecting settings always ends the game
    #[test]
    fn prop_cancel_in_settings_ends_game(
        step in prop::sample::select(vec![
            SettingsStep::Listening,
            SettingsStep::GetCategory { step: AskStep::Listen },
            SettingsStep::GetDifficulty { step: AskStep::Listen },
        ]),
        category in proptest::option::of(arb_category()),
        difficulty in proptest::option::of(arb_difficulty())
    ) {
        // Both settings present means the round starts before cancel is looked at
        prop_assume!(category.is_none() || difficulty.is_none());

        let state = GameState::GetGameSettings { step };
        let ctx = GameContext { category, difficulty, ..GameContext::default() };
        let mut rng = StdRng::seed_from_u64(0);

        let said = transition(&state, &ctx, heard("stop", "cancel", vec![]), store(), &mut rng).unwrap();
        // The listening step only ever reads entities, so it may clear settings
        let result = transition(&state, &said.new_context, Event::ListenComplete, store(), &mut rng).unwrap();
        prop_assert_eq!(result.new_state, GameState::GameOver);
    }

    // A cancel after any clue, or while asked to go on, ends the game
    #[test]
    fn prop_cancel_during_round_ends_game(
        seed in any::<u64>(),
        category in arb_category(),
        difficulty in arb_difficulty(),
        wrong_first in any::<bool>(),
        skipped in 0usize..8
    ) {
        let mut game = Game::new(seed);
        game.to_settings();
        game.choose(category, difficulty);

        if wrong_first {
            game.must(heard("nope", "guessedAnswer", vec![entity("guess", "not it")]));
            game.must(Event::ListenComplete);
            game.must(Event::DelayElapsed);
            game.must(Event::SpeakComplete);
            prop_assert_eq!(
                &game.state,
                &GameState::IncorrectAnswer { step: IncorrectStep::GetAnswer }
            );
        } else {
            // Up to and including the last clue
            for _ in 0..skipped {
                if !game.ctx.has_more_clues() {
                    break;
                }
                game.ask_next_clue();
            }
            prop_assert_eq!(&game.state, &GameState::PlayClue { step: ClueStep::GetAnswer });
        }

        game.must(heard("stop", "cancel", vec![]));
        game.must(Event::ListenComplete);
        prop_assert_eq!(&game.state, &GameState::GameOver);
        game.must(Event::SpeakComplete);
        prop_assert_eq!(&game.state, &GameState::Done);
    }

    // Cancel or silence when asked to play again after a correct answer
    #[test]
    fn prop_cancel_after_correct_answer_ends_game(
        seed in any::<u64>(),
        category in arb_category(),
        difficulty in arb_difficulty(),
        silent in any::<bool>()
    ) {
        let mut game = Game::new(seed);
        game.to_settings();
        game.choose(category, difficulty);
        game.guess_right();
        let score = game.ctx.score;

        if silent {
            game.must(Event::NoInput);
        } else {
            game.must(heard("no thanks", "cancel", vec![]));
        }
        game.must(Event::ListenComplete);
        prop_assert_eq!(&game.state, &GameState::GameOver);
        prop_assert_eq!(game.ctx.score, score);
    }

    // Raw-text fallback accepts any casing and trailing punctuation, and is
    // stable when fed its own canonical output
    #[test]
    fn prop_fallback_is_idempotent((category, spoken) in arb_spoken_category()) {
        let SlotFill { value, intent } =
            nlu::fill_slot::<Category>(None, &spoken, EntityKind::Category);
        prop_assert_eq!(value, Some(category));
        prop_assert_eq!(intent, Some(Intent::SelectGameSettings));

        let again = nlu::fill_slot::<Category>(None, category.as_str(), EntityKind::Category);
        prop_assert_eq!(again.value, value);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_one_item_tier_repeats_without_stalling() {
    let mut items = std::collections::BTreeMap::new();
    for category in Category::ALL {
        let list = Difficulty::ALL
            .iter()
            .map(|d| crate::content::Item {
                name: format!("{category}-{d}"),
                difficulty: *d,
                clues: vec!["only clue".to_string(), "second clue".to_string()],
            })
            .collect();
        items.insert(category, list);
    }
    let single = ContentStore::new(items).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let state = GameState::CorrectAnswer {
        step: CorrectStep::GetConfirmation,
    };
    let mut ctx = GameContext {
        category: Some(Category::Sports),
        difficulty: Some(Difficulty::Hard),
        intent: Some(Intent::Restart),
        ..GameContext::default()
    };
    for _ in 0..10 {
        let result = transition(&state, &ctx, Event::ListenComplete, &single, &mut rng).unwrap();
        assert_eq!(
            result.new_context.current_item.as_ref().unwrap().name,
            "sports-hard"
        );
        ctx = result.new_context;
        ctx.intent = Some(Intent::Restart);
    }
}

#[test]
fn test_full_game_with_fallback_and_reveal() {
    let mut game = Game::new(3);
    game.to_settings();

    // Only the difficulty comes through; the category is asked for
    game.must(heard(
        "hard please",
        "selectGameSettings",
        vec![entity("difficulty", "hard")],
    ));
    game.must(Event::ListenComplete);
    assert_eq!(game.state.path(), "GetGameSettings.GetCategory.AskForCategory");
    game.must(Event::SpeakComplete);

    // A bare word the classifier did not tag
    game.must(heard("Sports.", "other", vec![]));
    assert_eq!(game.ctx.category, Some(Category::Sports));
    game.must(Event::ListenComplete);
    assert_eq!(game.state.path(), "PlayClue.SayClue");
    assert_eq!(game.ctx.difficulty, Some(Difficulty::Hard));
    game.must(Event::SpeakComplete);

    // Stay silent through every clue
    while game.ctx.has_more_clues() {
        game.must(Event::NoInput);
        game.must(Event::ListenComplete);
        game.must(Event::SpeakComplete);
    }
    game.must(Event::NoInput);
    game.must(Event::ListenComplete);
    assert_eq!(game.state.path(), "IncorrectAnswer.DelayBeforeNextClue");

    let name = game.item_name();
    let effects = game.fire(Event::DelayElapsed).unwrap();
    assert_eq!(game.state.path(), "IncorrectAnswer.HandleLastClue");
    assert!(effects.iter().any(
        |e| matches!(e, Effect::Speak { utterance } if utterance.contains(&name))
    ));
    assert_eq!(game.ctx.score, 0);
}
