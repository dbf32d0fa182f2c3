//! Game content: items to guess, grouped by category
//!
//! Loaded once at startup and never mutated. Every category/difficulty pair
//! must have at least one item, which is checked at load so round setup can
//! never come up empty.

mod selector;

pub use selector::pick_item;

use crate::nlu::{Category, Difficulty};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Built-in content document
const BUILTIN_CONTENT: &str = include_str!("../content/game.json");

/// Something to guess
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub difficulty: Difficulty,
    pub clues: Vec<String>,
}

impl Item {
    /// Case-insensitive comparison against a spoken guess
    pub fn is_named(&self, guess: &str) -> bool {
        self.name.trim().to_lowercase() == guess.trim().to_lowercase()
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to read content file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid content document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unknown category '{0}' in content document")]
    UnknownCategory(String),
    #[error("Item '{name}' in {category} has no clues")]
    NoClues { category: Category, name: String },
    #[error("No {difficulty} items for category {category}")]
    MissingTier {
        category: Category,
        difficulty: Difficulty,
    },
}

/// On-disk document shape: `{ "categories": { "animals": [ {name, difficulty, clues} ] } }`
#[derive(Debug, Deserialize)]
struct ContentDocument {
    categories: HashMap<String, Vec<Item>>,
}

/// Immutable category → items mapping
#[derive(Debug, Clone)]
pub struct ContentStore {
    items: BTreeMap<Category, Vec<Item>>,
}

impl ContentStore {
    /// Build a store, checking that every category has items at every tier
    pub fn new(items: BTreeMap<Category, Vec<Item>>) -> Result<Self, ContentError> {
        for (category, list) in &items {
            if let Some(item) = list.iter().find(|i| i.clues.is_empty()) {
                return Err(ContentError::NoClues {
                    category: *category,
                    name: item.name.clone(),
                });
            }
        }

        for category in Category::ALL {
            for difficulty in Difficulty::ALL {
                let covered = items
                    .get(&category)
                    .is_some_and(|list| list.iter().any(|i| i.difficulty == difficulty));
                if !covered {
                    return Err(ContentError::MissingTier {
                        category,
                        difficulty,
                    });
                }
            }
        }

        Ok(Self { items })
    }

    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let doc: ContentDocument = serde_json::from_str(json)?;
        let mut items = BTreeMap::new();
        for (key, list) in doc.categories {
            let category: Category = key
                .parse()
                .map_err(|_| ContentError::UnknownCategory(key.clone()))?;
            items.insert(category, list);
        }
        Self::new(items)
    }

    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let json = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The document shipped with the crate
    pub fn builtin() -> Result<Self, ContentError> {
        Self::from_json(BUILTIN_CONTENT)
    }

    /// Items of one category at one tier, in document order
    pub fn items_for(&self, category: Category, difficulty: Difficulty) -> Vec<&Item> {
        self.items
            .get(&category)
            .map(|list| list.iter().filter(|i| i.difficulty == difficulty).collect())
            .unwrap_or_default()
    }

    pub fn item_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }
}
