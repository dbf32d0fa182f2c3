//! Effects produced by state transitions

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Bring up the speech service
    Prepare,

    /// Say something
    Speak { utterance: String },

    /// Start listening, with classification
    Listen,

    /// Start the post-answer delay; the runtime answers with `DelayElapsed`
    StartAnswerDelay,
}

impl Effect {
    pub fn speak(utterance: impl Into<String>) -> Self {
        Effect::Speak {
            utterance: utterance.into(),
        }
    }
}
