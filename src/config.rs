//! Environment-driven configuration

use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ANSWER_DELAY_MS: u64 = 3000;

/// Settings forwarded to the speech service with `PREPARE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSettings {
    pub locale: String,
    pub tts_voice: String,
    /// Silence before the recognizer gives up with `ASR_NOINPUT`
    pub noinput_timeout_ms: u64,
    pub complete_timeout_ms: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            locale: "en-GB".to_string(),
            tts_voice: "en-GB-SoniaNeural".to_string(),
            noinput_timeout_ms: 5000,
            complete_timeout_ms: 0,
        }
    }
}

/// Server and game configuration
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub port: u16,
    /// Content document to load instead of the built-in one
    pub content_path: Option<PathBuf>,
    pub answer_delay: Duration,
    pub speech: SpeechSettings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            content_path: None,
            answer_delay: Duration::from_millis(DEFAULT_ANSWER_DELAY_MS),
            speech: SpeechSettings::default(),
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let speech = SpeechSettings {
            locale: lookup("TRIVASO_LOCALE").unwrap_or(defaults.speech.locale),
            tts_voice: lookup("TRIVASO_TTS_VOICE").unwrap_or(defaults.speech.tts_voice),
            noinput_timeout_ms: parse_or(
                &lookup,
                "TRIVASO_NOINPUT_TIMEOUT_MS",
                defaults.speech.noinput_timeout_ms,
            ),
            complete_timeout_ms: parse_or(
                &lookup,
                "TRIVASO_COMPLETE_TIMEOUT_MS",
                defaults.speech.complete_timeout_ms,
            ),
        };

        Self {
            port: parse_or(&lookup, "TRIVASO_PORT", DEFAULT_PORT),
            content_path: lookup("TRIVASO_CONTENT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            answer_delay: Duration::from_millis(parse_or(
                &lookup,
                "TRIVASO_ANSWER_DELAY_MS",
                DEFAULT_ANSWER_DELAY_MS,
            )),
            speech,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Ignoring unparseable setting");
            default
        }),
    }
}
