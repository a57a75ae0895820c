//! Clara: voice-driven virtual-receptionist backend.
//!
//! Classifies arriving people as employees or guests, verifies employees
//! via face-embedding matching with an ID+OTP fallback, logs visitors and
//! notifies their hosts, and gates every utterance through a wake/sleep
//! filter with multilingual support.
//!
//! # Architecture
//!
//! The core is a handful of cooperating pieces:
//! - **Gate** ([`gate`]): decides whether an utterance gets any response
//!   at all, and in which language.
//! - **Flow** ([`flow`]): the reception state machine — one conversation
//!   at a time, from wake word to verified employee or logged visitor.
//! - **Face match** ([`face`]): embedding gallery with a distance/
//!   ambiguity decision procedure.
//! - **Shared state** ([`state`]): the awake/verified snapshot other
//!   processes reload before trusting.
//! - **Collaborators** ([`collaborators`]): narrow async seams to the
//!   employee directory, OTP delivery, visitor notification, and blob
//!   storage — concrete backends live with the deployment.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod face;
pub mod flow;
pub mod gate;
pub mod language;
pub mod otp;
pub mod signal;
pub mod state;
pub mod test_utils;

pub use config::ReceptionConfig;
pub use error::{ReceptionError, Result};
pub use face::{FaceMatchEngine, FaceObservation, MatchOutcome};
pub use flow::{Collaborators, FlowManager, FlowReply};
pub use gate::{GateOutcome, ReceptionGate};
pub use language::Language;
pub use signal::SignalChannel;
pub use state::StateStore;

/// Install a stderr tracing subscriber honouring `RUST_LOG`.
///
/// Call once at process start; a second call is a no-op (the first
/// subscriber wins).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
