//! Trait abstractions for runtime I/O
//!
//! The speech service is the only collaborator the game talks to. The trait
//! lets the executor run against a recording double in tests.

use super::SessionEvent;
use crate::config::SpeechSettings;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Commands sent to the speech service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeechCommand {
    /// Bring up recognition and synthesis
    Prepare { settings: SpeechSettings },
    Speak { utterance: String },
    /// Listen for one utterance; `nlu` asks for classification
    Listen { nlu: bool },
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("No speech client is connected")]
    NoListener,
}

/// Speech recognition and synthesis collaborator
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Hand a command to the service. Completion comes back later as an event.
    async fn dispatch(&self, command: SpeechCommand) -> Result<(), SpeechError>;
}

#[async_trait]
impl<T: SpeechService + ?Sized> SpeechService for Arc<T> {
    async fn dispatch(&self, command: SpeechCommand) -> Result<(), SpeechError> {
        (**self).dispatch(command).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Forwards commands to connected browser clients over the session stream
#[derive(Clone)]
pub struct BroadcastSpeech {
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastSpeech {
    pub fn new(broadcast_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self { broadcast_tx }
    }
}

#[async_trait]
impl SpeechService for BroadcastSpeech {
    async fn dispatch(&self, command: SpeechCommand) -> Result<(), SpeechError> {
        self.broadcast_tx
            .send(SessionEvent::Speech { command })
            .map(|_| ())
            .map_err(|_| SpeechError::NoListener)
    }
}
