//! Session types and the persisted session table for the reception flow.

use crate::state::now_epoch_secs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// States of the reception flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Initial state, before any wake word.
    Idle,
    /// Wake word heard, session being set up.
    WakeDetected,
    /// Waiting for the user to pick a conversation language.
    LanguageSelection,
    /// Waiting for the employee/visitor answer.
    UserClassification,
    /// Employee path: camera capture requested.
    FaceRecognition,
    /// Employee path: match result being evaluated.
    FaceMatchCheck,
    /// Employee fallback: ID/OTP verification.
    ManualVerification,
    /// Post-OTP credential confirmation.
    CredentialCheck,
    /// Face enrollment in progress.
    FaceRegistration,
    /// Employee fully verified.
    EmployeeVerified,
    /// Visitor path: collecting name/phone/purpose/host.
    VisitorInfoCollection,
    /// Visitor path: photo capture.
    VisitorFaceCapture,
    /// Visitor path: host has been notified.
    HostNotification,
    /// Terminal: the session is discarded, never reused.
    FlowEnd,
}

/// How the user classified themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Not yet classified.
    #[default]
    Unknown,
    /// Company employee.
    Employee,
    /// Guest / visitor.
    Visitor,
}

/// How an identity was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Matched against the face gallery.
    FaceRecognition,
    /// Employee ID plus one-time passcode.
    ManualWithOtp,
    /// Verified out-of-band by an external notification.
    ExternalNotification,
}

/// Well-known `user_data` keys.
pub mod keys {
    /// Employee display name (from face match or directory).
    pub const EMPLOYEE_NAME: &str = "employee_name";
    /// Employee ID (from face match or directory).
    pub const EMPLOYEE_ID: &str = "employee_id";
    /// Name supplied during manual verification.
    pub const MANUAL_NAME: &str = "manual_name";
    /// Employee ID supplied during manual verification.
    pub const MANUAL_EMPLOYEE_ID: &str = "manual_employee_id";
    /// Email resolved or supplied during manual verification.
    pub const MANUAL_EMAIL: &str = "manual_email";
    /// Visitor name.
    pub const VISITOR_NAME: &str = "visitor_name";
    /// Visitor phone number.
    pub const VISITOR_PHONE: &str = "visitor_phone";
    /// Visitor purpose of visit.
    pub const VISITOR_PURPOSE: &str = "visitor_purpose";
    /// Employee the visitor is meeting.
    pub const HOST_EMPLOYEE: &str = "host_employee";
    /// Set once the visit was logged and the host notified.
    pub const VISITOR_LOGGED: &str = "visitor_logged";
    /// Detail of a failed (best-effort) host notification.
    pub const NOTIFY_ERROR: &str = "notify_error";
    /// Set once the visitor photo was captured.
    pub const FACE_CAPTURED: &str = "face_captured";
    /// Set once the employee enrolled a face.
    pub const FACE_REGISTERED: &str = "face_registered";
}

/// One conversation's flow state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSession {
    /// Opaque unique token, created on wake.
    pub session_id: String,
    /// Position in the state machine.
    pub current_state: FlowState,
    /// Employee/visitor classification.
    pub user_type: UserType,
    /// Epoch seconds the session was created.
    pub start_time: u64,
    /// Epoch seconds of the last interaction.
    pub last_activity: u64,
    /// Verification failures so far.
    pub verification_attempts: u32,
    /// Open string-keyed map of transient flow data. Keys come and go as
    /// the flow progresses; see [`keys`].
    pub user_data: BTreeMap<String, String>,
    /// Whether an identity has been verified. Once set, only session end
    /// clears it.
    pub is_verified: bool,
    /// How the identity was verified.
    pub verification_method: Option<VerificationMethod>,
}

impl FlowSession {
    /// Fresh session in [`FlowState::Idle`].
    #[must_use]
    pub fn new(session_id: String) -> Self {
        let now = now_epoch_secs();
        Self {
            session_id,
            current_state: FlowState::Idle,
            user_type: UserType::Unknown,
            start_time: now,
            last_activity: now,
            verification_attempts: 0,
            user_data: BTreeMap::new(),
            is_verified: false,
            verification_method: None,
        }
    }

    /// Record activity now.
    pub fn touch(&mut self) {
        self.last_activity = now_epoch_secs();
    }

    /// Age of the session's last activity in seconds.
    #[must_use]
    pub fn idle_secs(&self) -> u64 {
        now_epoch_secs().saturating_sub(self.last_activity)
    }

    /// Non-empty value of a `user_data` field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.user_data
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Set a `user_data` field.
    pub fn set_field(&mut self, key: &str, value: impl Into<String>) {
        self.user_data.insert(key.to_owned(), value.into());
    }

    /// The verified identity's display name, preferring the face-match
    /// name over the manually-supplied one.
    #[must_use]
    pub fn identity_name(&self) -> Option<&str> {
        self.field(keys::EMPLOYEE_NAME)
            .or_else(|| self.field(keys::MANUAL_NAME))
    }

    /// The verified identity's employee ID.
    #[must_use]
    pub fn identity_id(&self) -> Option<&str> {
        self.field(keys::EMPLOYEE_ID)
            .or_else(|| self.field(keys::MANUAL_EMPLOYEE_ID))
    }
}

/// The persisted session-table document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionDocument {
    /// All live sessions, keyed by session ID.
    pub sessions: BTreeMap<String, FlowSession>,
    /// The single "current" session addressed by the active conversation.
    pub current_session_id: Option<String>,
    /// Epoch seconds this document was written.
    pub last_updated: u64,
}

impl SessionDocument {
    /// Write the whole document. Best-effort: failures are logged, the
    /// in-memory table stays authoritative.
    pub fn persist(&self, path: &Path) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let data = serde_json::to_vec_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(path, data)
        };
        if let Err(e) = write() {
            warn!("failed to persist session table to {}: {e}", path.display());
        }
    }

    /// Load the document; a missing or corrupt file yields an empty table.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read(path).map_err(|e| e.to_string()).and_then(|data| {
            serde_json::from_slice::<Self>(&data).map_err(|e| e.to_string())
        }) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("ignoring corrupt session table at {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn new_session_defaults() {
        let session = FlowSession::new("s1".into());
        assert_eq!(session.current_state, FlowState::Idle);
        assert_eq!(session.user_type, UserType::Unknown);
        assert_eq!(session.verification_attempts, 0);
        assert!(!session.is_verified);
        assert!(session.verification_method.is_none());
        assert!(session.user_data.is_empty());
    }

    #[test]
    fn field_ignores_blank_values() {
        let mut session = FlowSession::new("s1".into());
        session.set_field(keys::VISITOR_NAME, "   ");
        assert!(session.field(keys::VISITOR_NAME).is_none());
        session.set_field(keys::VISITOR_NAME, "Priya");
        assert_eq!(session.field(keys::VISITOR_NAME), Some("Priya"));
    }

    #[test]
    fn identity_prefers_face_match_fields() {
        let mut session = FlowSession::new("s1".into());
        session.set_field(keys::MANUAL_NAME, "A. Kumar");
        session.set_field(keys::MANUAL_EMPLOYEE_ID, "E200");
        assert_eq!(session.identity_name(), Some("A. Kumar"));

        session.set_field(keys::EMPLOYEE_NAME, "Arun Kumar");
        session.set_field(keys::EMPLOYEE_ID, "E200");
        assert_eq!(session.identity_name(), Some("Arun Kumar"));
        assert_eq!(session.identity_id(), Some("E200"));
    }

    #[test]
    fn session_serde_round_trip() {
        let mut session = FlowSession::new("s1".into());
        session.current_state = FlowState::ManualVerification;
        session.user_type = UserType::Employee;
        session.verification_method = Some(VerificationMethod::ManualWithOtp);
        session.set_field(keys::MANUAL_EMPLOYEE_ID, "E200");

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("manual_verification"));
        assert!(json.contains("manual_with_otp"));
        let restored: FlowSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.current_state, FlowState::ManualVerification);
        assert_eq!(restored.user_type, UserType::Employee);
        assert_eq!(restored.field(keys::MANUAL_EMPLOYEE_ID), Some("E200"));
    }

    #[test]
    fn document_load_missing_file_is_empty() {
        let doc = SessionDocument::load(Path::new("/nonexistent/clara/sessions.json"));
        assert!(doc.sessions.is_empty());
        assert!(doc.current_session_id.is_none());
    }

    #[test]
    fn document_persist_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!(
            "clara-sessions-{}-{}",
            std::process::id(),
            now_epoch_secs()
        ));
        let path = dir.join("flow_sessions.json");

        let mut doc = SessionDocument::default();
        let session = FlowSession::new("s1".into());
        doc.current_session_id = Some(session.session_id.clone());
        doc.sessions.insert(session.session_id.clone(), session);
        doc.last_updated = now_epoch_secs();
        doc.persist(&path);

        let restored = SessionDocument::load(&path);
        assert_eq!(restored.current_session_id.as_deref(), Some("s1"));
        assert!(restored.sessions.contains_key("s1"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
