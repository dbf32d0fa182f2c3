//! Events that drive the dialogue

use crate::nlu::{Hypothesis, NluResult};
use serde::Deserialize;

/// Events raised by the speech service, the UI, or the answer timer
///
/// The wire names are the ones the browser speech client sends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "ASRTTS_READY")]
    SpeechReady,

    #[serde(rename = "CLICK")]
    StartClicked,

    #[serde(rename = "SPEAK_COMPLETE")]
    SpeakComplete,

    #[serde(rename = "RECOGNISED")]
    Recognised {
        /// Recognition hypotheses, best first
        #[serde(default)]
        value: Vec<Hypothesis>,
        #[serde(default, rename = "nluValue")]
        nlu_value: Option<NluResult>,
    },

    #[serde(rename = "ASR_NOINPUT")]
    NoInput,

    /// Classification of the last utterance has resolved
    #[serde(rename = "LISTEN_COMPLETE")]
    ListenComplete,

    /// Post-answer delay ran out. Raised internally, never accepted on the wire.
    #[serde(skip)]
    DelayElapsed,
}

impl Event {
    /// Build a recognition event from an utterance and classifier output
    #[cfg(test)]
    pub fn recognised(utterance: impl Into<String>, nlu: Option<NluResult>) -> Self {
        Event::Recognised {
            value: vec![Hypothesis {
                utterance: utterance.into(),
                confidence: 1.0,
            }],
            nlu_value: nlu,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::SpeechReady => "ASRTTS_READY",
            Event::StartClicked => "CLICK",
            Event::SpeakComplete => "SPEAK_COMPLETE",
            Event::Recognised { .. } => "RECOGNISED",
            Event::NoInput => "ASR_NOINPUT",
            Event::ListenComplete => "LISTEN_COMPLETE",
            Event::DelayElapsed => "DELAY_ELAPSED",
        }
    }
}

/// Top recognition hypothesis, or empty
pub fn transcript(value: &[Hypothesis]) -> String {
    value
        .first()
        .map(|h| h.utterance.clone())
        .unwrap_or_default()
}

/// Text used for raw-text fallback: what the classifier saw, else the top hypothesis
pub fn raw_text(value: &[Hypothesis], nlu: Option<&NluResult>) -> String {
    nlu.and_then(|n| n.text.clone())
        .unwrap_or_else(|| transcript(value))
}
