//! Runtime for hosting game sessions
//!
//! Each session is one actor task that owns its state and context. Handles
//! only carry channels into and out of it.

mod executor;
pub mod traits;


pub use executor::GameRuntime;
pub use traits::*;

use crate::config::{GameConfig, SpeechSettings};
use crate::content::ContentStore;
use crate::state_machine::{Event, GameContext, GameState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the production runtime
pub type ProductionRuntime = GameRuntime<BroadcastSpeech>;

/// Per-session runtime settings
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Wait after an answer before speaking again
    pub answer_delay: Duration,
    pub speech: SpeechSettings,
}

impl From<&GameConfig> for RuntimeConfig {
    fn from(config: &GameConfig) -> Self {
        Self {
            answer_delay: config.answer_delay,
            speech: config.speech.clone(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig::from(&GameConfig::default())
    }
}

/// What a UI needs to render the game
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub session_id: String,
    /// Bumped once per processed event
    pub sequence: u64,
    pub state: GameState,
    /// Dotted path of the active leaf state
    pub path: String,
    pub context: GameContext,
    /// Whether the microphone is open
    pub listening: bool,
    /// The "+N" shown after a correct answer
    pub points_delta: u32,
    /// Most recent speech command, so late subscribers can catch up
    pub last_command: Option<SpeechCommand>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Snapshot of a session that has not processed anything yet
    pub fn initial(session_id: &str) -> Self {
        let state = GameState::default();
        Self {
            session_id: session_id.to_string(),
            sequence: 0,
            path: state.path(),
            state,
            context: GameContext::default(),
            listening: false,
            points_delta: 0,
            last_command: None,
            updated_at: Utc::now(),
        }
    }
}

/// Events sent to stream clients
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Init { snapshot: Snapshot },
    Snapshot { snapshot: Snapshot },
    Speech { command: SpeechCommand },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session {0} has stopped")]
    Closed(String),
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<Snapshot>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }
}

/// Manager for all game sessions
pub struct SessionManager {
    content: Arc<ContentStore>,
    config: RuntimeConfig,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new(content: Arc<ContentStore>, config: RuntimeConfig) -> Self {
        Self {
            content,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a new session. Its runtime immediately asks the speech service
    /// to prepare. The session is forgotten once its runtime stops.
    pub async fn create(&self) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::initial(&session_id));
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = GameRuntime::new(
            &session_id,
            self.content.clone(),
            BroadcastSpeech::new(broadcast_tx.clone()),
            self.config.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            snapshot_tx,
            shutdown.clone(),
        );

        let handle = SessionHandle {
            session_id: session_id.clone(),
            event_tx,
            broadcast_tx,
            snapshot_rx,
            shutdown,
        };

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            runtime.run().await;
            sessions.write().await.remove(&session_id);
            tracing::info!(session_id = %session_id, "Game runtime finished");
        });

        handle
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Ids of all live sessions, sorted
    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Queue an event for a session
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), SessionError> {
        let handle = self.get(session_id).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))
    }

    /// Subscribe to session updates
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        let handle = self.get(session_id).await?;
        Ok(handle.broadcast_tx.subscribe())
    }

    /// Tear a session down. A pending answer delay is dropped without firing.
    pub async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.shutdown.cancel();
        tracing::info!(session_id = %session_id, "Session removed");
        Ok(())
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }
}
