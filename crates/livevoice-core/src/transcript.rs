//! Running transcripts for the current exchange.

use serde::{Deserialize, Serialize};

/// User and model transcripts.
///
/// Both strings only grow between resets. The orchestrator resets them on
/// connect, at the start of every typed message, and at the start of every
/// recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// User speech as text.
    pub input: String,
    /// Model output as text (text responses and speech transcription).
    pub output: String,
}

impl Transcript {
    pub fn append_input(&mut self, delta: &str) {
        self.input.push_str(delta);
    }

    pub fn append_output(&mut self, delta: &str) {
        self.output.push_str(delta);
    }

    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }
}
