//! The always-on input gate: decides whether an utterance gets any
//! response at all, and in which language.
//!
//! Total over arbitrary input — every utterance maps to exactly one of
//! "say nothing", "say this canned line", or "hand it to the dialogue
//! layer". Never panics on malformed text.

use crate::language::{
    self, any_phrase_in_text, message, normalize_transcript, sleep_phrases, wake_phrases,
    Language, MessageKey,
};
use crate::state::StateStore;
use tracing::debug;

/// What the caller should do with an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Produce no response at all — not even an empty string. Downstream
    /// must not speak.
    Silent,
    /// Speak exactly this canned response and stop.
    Reply(String),
    /// Proceed to full dialogue handling.
    PassThrough,
}

/// Wake/sleep gate over the shared [`StateStore`].
#[derive(Debug, Clone)]
pub struct ReceptionGate {
    state: StateStore,
}

impl ReceptionGate {
    /// Create a gate over the shared state.
    #[must_use]
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Gate one raw utterance.
    ///
    /// Check order:
    /// 1. Explicit language-switch request — fires even while asleep.
    /// 2. Language inference (script, then phrase lists) and adoption.
    /// 3. Auto-sleep on idle timeout, preempting everything below.
    /// 4. Asleep: only a wake phrase gets a response.
    /// 5. Awake: sleep phrase, redundant wake phrase, else pass through.
    #[must_use]
    pub fn process_input(&self, input: &str) -> GateOutcome {
        // A sleeping receptionist still honours "talk in Tamil": the
        // switch is a convenience override ahead of the sleep gate.
        if let Some(switch) = language::detect_switch_request(input) {
            self.state.set_preferred_language(switch);
            self.state.touch();
            debug!(lang = %switch, "language switch requested");
            return GateOutcome::Reply(
                message(MessageKey::LanguageSupportAffirm, switch).to_owned(),
            );
        }

        let inferred = self.infer_language(input);
        if inferred != self.state.preferred_language() {
            self.state.set_preferred_language(inferred);
        }
        let lang = inferred;

        if let Some(notice) = self.state.check_auto_sleep() {
            return GateOutcome::Reply(notice);
        }

        let normalized = normalize_transcript(input.trim(), lang);

        if !self.state.is_awake() {
            if any_phrase_in_text(&normalized, wake_phrases(lang)) {
                return GateOutcome::Reply(self.state.wake_up());
            }
            return GateOutcome::Silent;
        }

        self.state.touch();

        if any_phrase_in_text(&normalized, sleep_phrases(lang)) {
            return GateOutcome::Reply(self.state.go_to_sleep());
        }
        if any_phrase_in_text(&normalized, wake_phrases(lang)) {
            return GateOutcome::Reply(message(MessageKey::AlreadyAwake, lang).to_owned());
        }

        GateOutcome::PassThrough
    }

    /// Infer the utterance language: strong script evidence first, then
    /// wake/sleep phrase-list matches per candidate, else keep current.
    fn infer_language(&self, input: &str) -> Language {
        if let Some(lang) = language::detect_by_script(input) {
            return lang;
        }

        let lowered = input.trim().to_lowercase();
        for candidate in Language::ALL {
            let normalized = normalize_transcript(&lowered, candidate);
            if any_phrase_in_text(&normalized, wake_phrases(candidate))
                || any_phrase_in_text(&normalized, sleep_phrases(candidate))
            {
                return candidate;
            }
        }
        self.state.preferred_language()
    }
}
