//! Voice command surface
//!
//! Recognized phrases arrive as text from whatever keyword spotter is in
//! front of the crate; each maps to one orchestrator request.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::orchestrator::{Orchestrator, RequestOutcome};

/// Default objects that can be guided to
pub const DEFAULT_GUIDE_LABELS: &[&str] =
    &["tv", "bottle", "bed", "chair", "laptop", "person", "couch"];

const GUIDE_PREFIX: &str = "guide me to the ";

/// A recognized request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DescribeRoom,
    DescribeScene,
    DetectObjects,
    Stop,
    Help,
    GuideTo(String),
}

/// Lowercase, trim, drop trailing punctuation and collapse whitespace
#[must_use]
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Maps phrases to commands and runs them
pub struct CommandDispatcher {
    orchestrator: Arc<Orchestrator>,
    phrases: Vec<(String, Command)>,
}

impl CommandDispatcher {
    /// Dispatcher accepting "guide me to the {label}" for each of `labels`
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, labels: &[String]) -> Self {
        let mut phrases = vec![
            ("describe the room for me".to_string(), Command::DescribeRoom),
            ("describe the scene".to_string(), Command::DescribeScene),
            (
                "what is currently in front of me".to_string(),
                Command::DetectObjects,
            ),
            ("stop".to_string(), Command::Stop),
            ("help".to_string(), Command::Help),
        ];

        for label in labels {
            let label = normalize_phrase(label);
            if label.is_empty() {
                continue;
            }
            phrases.push((
                format!("{GUIDE_PREFIX}{label}"),
                Command::GuideTo(label),
            ));
        }

        Self {
            orchestrator,
            phrases,
        }
    }

    /// Every phrase this dispatcher accepts, in registration order
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.phrases.iter().map(|(p, _)| p.as_str())
    }

    /// The command for a recognized phrase, if it is one of ours
    #[must_use]
    pub fn parse(&self, phrase: &str) -> Option<Command> {
        let phrase = normalize_phrase(phrase);
        self.phrases
            .iter()
            .find(|(p, _)| *p == phrase)
            .map(|(_, c)| c.clone())
    }

    /// Spoken list of available commands
    ///
    /// All guide phrases are collapsed into "guide me to an object".
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut spoken: Vec<&str> = self
            .phrases
            .iter()
            .filter(|(_, c)| !matches!(c, Command::GuideTo(_)))
            .map(|(p, _)| p.as_str())
            .collect();
        if self
            .phrases
            .iter()
            .any(|(_, c)| matches!(c, Command::GuideTo(_)))
        {
            spoken.push("guide me to an object");
        }
        format!("You can say: {}", spoken.join(", "))
    }

    /// Run the command for `phrase`
    ///
    /// Network-bound requests are spawned so the caller can keep reading
    /// phrases. Returns the command that was started, if any.
    pub fn dispatch(&self, phrase: &str) -> Option<Command> {
        let Some(command) = self.parse(phrase) else {
            tracing::debug!(phrase, "unrecognized phrase");
            return None;
        };

        tracing::info!(?command, "command recognized");

        match &command {
            Command::DescribeRoom => {
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    log_outcome("describe room", orchestrator.describe_room().await);
                });
            }
            Command::DescribeScene => {
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    log_outcome("describe scene", orchestrator.describe_scene().await);
                });
            }
            Command::DetectObjects => {
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    log_outcome("detect objects", orchestrator.refresh_detections(true).await);
                });
            }
            Command::Stop => {
                self.orchestrator.stop_guidance();
            }
            Command::Help => {
                self.orchestrator.speaker().say(self.help_text());
            }
            Command::GuideTo(label) => {
                if let Err(e) = self.orchestrator.find_and_guide(label) {
                    tracing::info!(label = %label, error = %e, "guidance not started");
                }
            }
        }

        Some(command)
    }

    /// Dispatch phrases until the sender side closes
    pub async fn run(&self, mut phrases: mpsc::Receiver<String>) {
        while let Some(phrase) = phrases.recv().await {
            self.dispatch(&phrase);
        }
        tracing::debug!("phrase stream closed");
    }
}

fn log_outcome(request: &str, outcome: RequestOutcome) {
    match outcome {
        RequestOutcome::Completed => tracing::debug!(request, "request completed"),
        RequestOutcome::FellBack => tracing::info!(request, "request completed via fallback"),
        RequestOutcome::Busy => tracing::info!(request, "request ignored, one already running"),
        RequestOutcome::Failed => tracing::warn!(request, "request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  Guide me to   the TV. "), "guide me to the tv");
        assert_eq!(normalize_phrase("Stop!"), "stop");
        assert_eq!(normalize_phrase(""), "");
    }
}
