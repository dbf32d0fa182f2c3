//! Game session runtime executor

use super::traits::{SpeechCommand, SpeechService};
use super::{RuntimeConfig, SessionEvent, Snapshot};

use crate::content::ContentStore;
use crate::state_machine::{
    start, transition, Effect, Event, GameContext, GameState, TransitionError, TransitionResult,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Session actor, generic over the speech service
pub struct GameRuntime<S>
where
    S: SpeechService + 'static,
{
    session_id: String,
    state: GameState,
    context: GameContext,
    content: Arc<ContentStore>,
    speech: Arc<S>,
    config: RuntimeConfig,
    rng: StdRng,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<Snapshot>,
    /// Cancelled on teardown
    shutdown: CancellationToken,
    /// Token for the pending answer delay, if any
    delay_token: Option<CancellationToken>,
    sequence: u64,
    last_command: Option<SpeechCommand>,
}

impl<S> GameRuntime<S>
where
    S: SpeechService + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: &str,
        content: Arc<ContentStore>,
        speech: S,
        config: RuntimeConfig,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        snapshot_tx: watch::Sender<Snapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: GameState::default(),
            context: GameContext::default(),
            content,
            speech: Arc::new(speech),
            config,
            rng: StdRng::from_entropy(),
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            shutdown,
            delay_token: None,
            sequence: 0,
            last_command: None,
        }
    }

    /// Use a fixed random source for item selection
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting game runtime");

        self.apply(start()).await;

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                event = self.event_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.process_event(event).await {
                        tracing::error!(
                            session_id = %self.session_id,
                            state = %self.state,
                            error = %e,
                            "Session cannot continue"
                        );
                        let _ = self.broadcast_tx.send(SessionEvent::Error {
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        self.cancel_delay();
        tracing::info!(session_id = %self.session_id, "Game runtime stopped");
    }

    /// Run one event to completion. Only fatal errors are returned.
    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let name = event.name();
        match transition(
            &self.state,
            &self.context,
            event,
            &self.content,
            &mut self.rng,
        ) {
            Ok(result) => {
                self.apply(result).await;
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                tracing::debug!(
                    session_id = %self.session_id,
                    state = %self.state,
                    event = name,
                    "Ignoring event"
                );
                self.publish_snapshot();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(&mut self, result: TransitionResult) {
        let TransitionResult {
            new_state,
            new_context,
            effects,
        } = result;

        let old_state = std::mem::replace(&mut self.state, new_state);
        self.context = new_context;

        if old_state != self.state {
            tracing::debug!(
                session_id = %self.session_id,
                from = %old_state,
                to = %self.state,
                "State transition"
            );
        }

        if !self.state.is_delaying() {
            self.cancel_delay();
        }

        for effect in effects {
            self.execute_effect(effect).await;
        }

        self.publish_snapshot();
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Prepare => {
                let settings = self.config.speech.clone();
                self.dispatch(SpeechCommand::Prepare { settings }).await;
            }

            Effect::Speak { utterance } => {
                self.dispatch(SpeechCommand::Speak { utterance }).await;
            }

            Effect::Listen => {
                self.dispatch(SpeechCommand::Listen { nlu: true }).await;
            }

            Effect::StartAnswerDelay => self.start_delay(),
        }
    }

    async fn dispatch(&mut self, command: SpeechCommand) {
        self.last_command = Some(command.clone());
        if let Err(e) = self.speech.dispatch(command).await {
            tracing::warn!(session_id = %self.session_id, error = %e, "Speech command not delivered");
        }
    }

    /// Arm the answer delay. It fires `DelayElapsed` back into this session
    /// unless the session is torn down first.
    fn start_delay(&mut self) {
        self.cancel_delay();

        let token = self.shutdown.child_token();
        self.delay_token = Some(token.clone());

        let event_tx = self.event_tx.clone();
        let delay = self.config.answer_delay;

        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = token.cancelled() => {
                    tracing::debug!("Answer delay cancelled");
                }

                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(Event::DelayElapsed).await;
                }
            }
        });
    }

    fn cancel_delay(&mut self) {
        if let Some(token) = self.delay_token.take() {
            token.cancel();
        }
    }

    fn publish_snapshot(&mut self) {
        self.sequence += 1;
        let snapshot = Snapshot {
            session_id: self.session_id.clone(),
            sequence: self.sequence,
            state: self.state.clone(),
            path: self.state.path(),
            context: self.context.clone(),
            listening: self.state.is_listening(),
            points_delta: self.context.points_delta(),
            last_command: self.last_command.clone(),
            updated_at: Utc::now(),
        };

        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self.broadcast_tx.send(SessionEvent::Snapshot { snapshot });
    }
}
