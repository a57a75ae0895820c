//! The reception flow state machine.
//!
//! Orchestrates one conversation at a time through wake → language
//! selection → employee/visitor classification → verification (face match
//! or ID+OTP) or visitor logging. Collaborator failures never escape:
//! every external call degrades to a user-facing retry message, and the
//! session stays in a well-defined, recoverable state.
//!
//! The manager holds a single "current session" pointer — a kiosk serves
//! one conversation at a time. The session table itself is keyed by ID,
//! so per-conversation routing is a structural extension, not a rewrite.

pub mod session;

use crate::collaborators::{
    EmployeeDirectory, EmployeeRecord, ManagerVisit, OtpDelivery, VisitSchedule, VisitorEntry,
    VisitorSink,
};
use crate::config::ReceptionConfig;
use crate::face::MatchOutcome;
use crate::language::{self, message, normalize_transcript, render, MessageKey};
use crate::otp::{IssueOutcome, OtpSessions, Verification};
use crate::signal::{self, SignalChannel};
use crate::state::{now_epoch_secs, StateStore};
use self::session::{keys, FlowSession, FlowState, SessionDocument, UserType, VerificationMethod};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Response from one flow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReply {
    /// Whether the operation advanced the flow.
    pub ok: bool,
    /// Localized text to speak back to the user.
    pub message: String,
    /// State after the operation.
    pub state: FlowState,
}

impl FlowReply {
    fn new(ok: bool, message: impl Into<String>, state: FlowState) -> Self {
        Self {
            ok,
            message: message.into(),
            state,
        }
    }
}

/// Status field of a face recognition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceResultStatus {
    /// A gallery identity was matched.
    Success,
    /// No gallery identity was close enough (or the match was ambiguous).
    NotRecognized,
    /// The recognition subsystem failed (no face, broken gallery…).
    Error,
}

/// Result handed to the flow by the face recognition subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRecognitionResult {
    /// Overall outcome.
    pub status: FaceResultStatus,
    /// Matched display name, when recognized.
    #[serde(default)]
    pub name: Option<String>,
    /// Matched employee ID, when recognized.
    #[serde(default)]
    pub employee_id: Option<String>,
}

impl From<MatchOutcome> for FaceRecognitionResult {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Recognized {
                employee_id,
                display_name,
                ..
            } => Self {
                status: FaceResultStatus::Success,
                name: Some(display_name),
                employee_id: Some(employee_id),
            },
            MatchOutcome::NotRecognized | MatchOutcome::Ambiguous { .. } => Self {
                status: FaceResultStatus::NotRecognized,
                name: None,
                employee_id: None,
            },
        }
    }
}

/// One manual-verification step: any subset of the fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualVerificationRequest {
    /// Company email, when the user supplied one.
    pub email: Option<String>,
    /// One-time passcode, when the user is answering a challenge.
    pub otp: Option<String>,
    /// Name, when the user supplied one.
    pub name: Option<String>,
    /// Employee ID — required for every step.
    pub employee_id: Option<String>,
}

/// Visitor details; empty fields mean "not provided in this turn".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorInfo {
    /// Visitor name.
    pub name: String,
    /// Visitor phone number.
    pub phone: String,
    /// Purpose of the visit.
    pub purpose: String,
    /// Employee being visited.
    pub host: String,
}

/// External collaborator handles injected into the flow.
#[derive(Clone)]
pub struct Collaborators {
    /// Employee directory lookups.
    pub directory: Arc<dyn EmployeeDirectory>,
    /// OTP delivery channels.
    pub delivery: Arc<dyn OtpDelivery>,
    /// Visitor logging + host notification.
    pub visitors: Arc<dyn VisitorSink>,
    /// Scheduled manager visits.
    pub visits: Arc<dyn VisitSchedule>,
}

/// Ordered classification rules: the first rule with a matching keyword
/// wins. Keywords cover every supported language.
const CLASSIFICATION_RULES: &[(UserType, &[&str])] = &[
    (
        UserType::Employee,
        &[
            "employee",
            "staff",
            "worker",
            "work here",
            "ஊழியர்",
            "ஊழியன",
            "ஊழியர்கள்",
            "ఉద్యోగి",
            "సిబ్బంది",
            "कर्मचारी",
            "स्टाफ",
        ],
    ),
    (
        UserType::Visitor,
        &[
            "visitor",
            "guest",
            "visiting",
            "meeting",
            "வருகையாளர்",
            "விருந்தினர்",
            "வருகை",
            "సందర్శకుడు",
            "అతిథి",
            "आगंतुक",
            "मेहमान",
        ],
    ),
];

/// Tools only verified employees may use.
const RESTRICTED_TOOLS: &[&str] = &["send_email", "get_employee_details", "company_info"];

/// The reception flow manager.
pub struct FlowManager {
    sessions: BTreeMap<String, FlowSession>,
    /// Single-slot register: the one session the active conversation
    /// addresses. Last writer wins.
    current_session_id: Option<String>,
    store_path: PathBuf,
    config: ReceptionConfig,
    state: StateStore,
    signals: SignalChannel,
    collaborators: Collaborators,
    otp: OtpSessions,
}

impl FlowManager {
    /// Create a manager, restoring the persisted session table and
    /// immediately cleaning up expired sessions.
    #[must_use]
    pub fn new(config: ReceptionConfig, state: StateStore, collaborators: Collaborators) -> Self {
        let store_path = config.data_dir.join("flow_sessions.json");
        let doc = SessionDocument::load(&store_path);
        let signals = SignalChannel::new(&config.data_dir);
        let otp = OtpSessions::new(config.otp.clone());
        let mut manager = Self {
            sessions: doc.sessions,
            current_session_id: doc.current_session_id,
            store_path,
            config,
            state,
            signals,
            collaborators,
            otp,
        };
        let max_age_hours = manager.config.flow.session_max_age_hours;
        manager.cleanup_old_sessions(max_age_hours);
        manager
    }

    /// The signal channel the front-end polls.
    #[must_use]
    pub fn signals(&self) -> &SignalChannel {
        &self.signals
    }

    /// The session the active conversation addresses, if any.
    #[must_use]
    pub fn current_session(&self) -> Option<&FlowSession> {
        self.current_session_id
            .as_deref()
            .and_then(|id| self.sessions.get(id))
    }

    /// Create a fresh session in [`FlowState::Idle`] and make it current.
    pub fn create_session(&mut self) -> String {
        let session_id = format!("session_{}", Uuid::new_v4().simple());
        self.sessions
            .insert(session_id.clone(), FlowSession::new(session_id.clone()));
        self.current_session_id = Some(session_id.clone());
        self.persist();
        info!(%session_id, "flow session created");
        session_id
    }

    /// Wake word heard: start a fresh conversation.
    ///
    /// Any prior session stops receiving dialogue but keeps its audit
    /// data in the table until cleanup.
    pub fn process_wake_word_detected(&mut self) -> FlowReply {
        let session_id = self.create_session();
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.current_state = FlowState::LanguageSelection;
            session.touch();
        }
        self.persist();

        let lang = self.state.preferred_language();
        let greeting = format!(
            "{} {}",
            message(MessageKey::WakeIntro, lang),
            message(MessageKey::LanguageSelectionPrompt, lang)
        );
        FlowReply::new(true, greeting, FlowState::LanguageSelection)
    }

    /// Classify free text as employee intent, visitor intent, or a
    /// language choice.
    ///
    /// An employee/visitor keyword in any supported language wins from
    /// any sub-state, overriding a pending language selection.
    pub fn process_user_classification(&mut self, input: &str) -> FlowReply {
        // Never block on a missing session: create one defensively.
        if self.current_session().is_none() {
            self.create_session();
            if let Some(session) = self.current_session_mut() {
                session.current_state = FlowState::UserClassification;
            }
        }

        let lang = self.state.preferred_language();
        let normalized = normalize_transcript(input.trim(), lang);

        match classify(&normalized) {
            Some(UserType::Employee) => return self.classify_as_employee(lang),
            Some(UserType::Visitor) => return self.classify_as_visitor(lang),
            _ => {}
        }

        let current_state = self
            .current_session()
            .map_or(FlowState::UserClassification, |s| s.current_state);

        if current_state == FlowState::LanguageSelection {
            return match language::resolve(input) {
                Some(choice) => {
                    self.state.set_preferred_language(choice);
                    if let Some(session) = self.current_session_mut() {
                        session.current_state = FlowState::UserClassification;
                        session.touch();
                    }
                    self.persist();
                    info!(lang = %choice, "conversation language selected");
                    FlowReply::new(
                        true,
                        message(MessageKey::LanguageSelectionConfirmed, choice),
                        FlowState::UserClassification,
                    )
                }
                None => FlowReply::new(
                    false,
                    message(MessageKey::LanguageSelectionRetry, lang),
                    FlowState::LanguageSelection,
                ),
            };
        }

        // A language named mid-classification (with no employee/visitor
        // intent) re-confirms that language without leaving this state.
        if let Some(mentioned) = language::resolve(input) {
            if mentioned != lang {
                self.state.set_preferred_language(mentioned);
                return FlowReply::new(
                    true,
                    message(MessageKey::LanguageSelectionConfirmed, mentioned),
                    current_state,
                );
            }
        }

        FlowReply::new(
            false,
            message(MessageKey::ClassificationRetry, lang),
            current_state,
        )
    }

    fn classify_as_employee(&mut self, lang: language::Language) -> FlowReply {
        let response = message(MessageKey::ClassificationEmployee, lang).to_owned();
        if let Some(session) = self.current_session_mut() {
            session.user_type = UserType::Employee;
            session.current_state = FlowState::FaceRecognition;
            session.touch();
        }
        self.post_signal(
            signal::START_FACE_CAPTURE,
            json!({ "message": response, "next_endpoint": "/flow/face_recognition" }),
        );
        self.persist();
        info!("classified as employee");
        FlowReply::new(true, response, FlowState::FaceRecognition)
    }

    fn classify_as_visitor(&mut self, lang: language::Language) -> FlowReply {
        let response = message(MessageKey::ClassificationVisitor, lang).to_owned();
        if let Some(session) = self.current_session_mut() {
            session.user_type = UserType::Visitor;
            session.current_state = FlowState::VisitorInfoCollection;
            session.touch();
        }
        self.post_signal(
            signal::START_VISITOR_INFO,
            json!({ "message": response, "next_endpoint": "/flow/visitor_info" }),
        );
        self.persist();
        info!("classified as visitor");
        FlowReply::new(true, response, FlowState::VisitorInfoCollection)
    }

    /// Evaluate a face recognition result for the employee path.
    pub async fn process_face_recognition_result(
        &mut self,
        result: &FaceRecognitionResult,
    ) -> FlowReply {
        // Recover from a stale session (e.g. the session ended just
        // before recognition finished).
        if self.current_session().is_none() {
            self.create_session();
        }
        let lang = self.state.preferred_language();

        // Administratively disabled: always degrade to manual
        // verification regardless of the reported status.
        if !self.config.face.enabled {
            if let Some(session) = self.current_session_mut() {
                session.user_type = UserType::Employee;
                session.current_state = FlowState::ManualVerification;
                session.touch();
            }
            self.persist();
            info!("face matching disabled, degrading to manual verification");
            return FlowReply::new(
                false,
                message(MessageKey::ManualFaceNotRecognized, lang),
                FlowState::ManualVerification,
            );
        }

        if result.status != FaceResultStatus::Success {
            return self.face_fallback_to_manual(lang);
        }

        // A successful match promotes even a not-yet-classified session.
        let (emp_name, emp_id) = {
            let session = self.current_session_mut_or_create();
            session.user_type = UserType::Employee;
            let name = result
                .name
                .clone()
                .or_else(|| session.field(keys::EMPLOYEE_NAME).map(str::to_owned));
            let id = result
                .employee_id
                .clone()
                .or_else(|| session.field(keys::EMPLOYEE_ID).map(str::to_owned));
            (name, id)
        };

        let (Some(emp_name), Some(emp_id)) = (emp_name, emp_id) else {
            // A match with no retrievable identity verifies nobody.
            warn!("face result missing name or id, degrading to manual verification");
            return self.face_fallback_to_manual(lang);
        };

        if let Some(session) = self.current_session_mut() {
            session.set_field(keys::EMPLOYEE_NAME, emp_name.clone());
            session.set_field(keys::EMPLOYEE_ID, emp_id.clone());
            session.is_verified = true;
            session.verification_method = Some(VerificationMethod::FaceRecognition);
            session.current_state = FlowState::EmployeeVerified;
            // Face recognition superseded any half-done manual attempt.
            session.user_data.remove(keys::MANUAL_NAME);
            session.user_data.remove(keys::MANUAL_EMPLOYEE_ID);
            session.user_data.remove(keys::MANUAL_EMAIL);
            session.touch();
        }
        self.state.set_user_verified(&emp_name, Some(&emp_id));
        self.persist();
        info!(name = %emp_name, id = %emp_id, "employee verified by face recognition");

        let mut reply = render(MessageKey::FaceRecognitionSuccess, lang, &[("name", &emp_name)]);
        if let Some(suffix) = self.manager_visit_suffix(&emp_id).await {
            reply.push(' ');
            reply.push_str(&suffix);
        }
        FlowReply::new(true, reply, FlowState::EmployeeVerified)
    }

    fn face_fallback_to_manual(&mut self, lang: language::Language) -> FlowReply {
        if let Some(session) = self.current_session_mut() {
            session.user_type = UserType::Employee;
            session.verification_attempts += 1;
            session.current_state = FlowState::ManualVerification;
            session.touch();
        }
        self.persist();
        FlowReply::new(
            false,
            message(MessageKey::ManualFaceNotRecognized, lang),
            FlowState::ManualVerification,
        )
    }

    /// One step of manual employee verification: resolve the directory
    /// record, then either dispatch a passcode or verify a provided one.
    pub async fn process_manual_verification_step(
        &mut self,
        request: &ManualVerificationRequest,
    ) -> FlowReply {
        let lang = self.state.preferred_language();
        if self.current_session().is_none() {
            return FlowReply::new(
                false,
                message(MessageKey::ManualNoSession, lang),
                FlowState::Idle,
            );
        }

        let Some(employee_id) = trimmed(request.employee_id.as_deref()) else {
            // Email alone is not enough: the registered email is resolved
            // *from* the directory using the ID.
            return FlowReply::new(
                false,
                message(MessageKey::ManualMissingEmployeeId, lang),
                FlowState::ManualVerification,
            );
        };

        let record = match self.resolve_employee(request.email.as_deref(), &employee_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return FlowReply::new(
                    false,
                    message(MessageKey::ManualEmployeeNotFound, lang),
                    FlowState::ManualVerification,
                );
            }
            Err(e) => {
                warn!("directory lookup failed during manual verification: {e}");
                return FlowReply::new(
                    false,
                    render(MessageKey::ManualDirectoryError, lang, &[("error", &e.to_string())]),
                    FlowState::ManualVerification,
                );
            }
        };

        let Some(resolved_email) = record
            .email
            .clone()
            .or_else(|| trimmed(request.email.as_deref()))
        else {
            return FlowReply::new(
                false,
                message(MessageKey::ManualNoEmailOnFile, lang),
                FlowState::ManualVerification,
            );
        };

        if let Some(session) = self.current_session_mut() {
            session.set_field(keys::MANUAL_EMAIL, resolved_email.clone());
            session.set_field(keys::MANUAL_EMPLOYEE_ID, record.employee_id.clone());
            if let Some(name) = trimmed(request.name.as_deref()).or_else(|| record.name.clone()) {
                session.set_field(keys::MANUAL_NAME, name);
            }
            session.current_state = FlowState::ManualVerification;
            session.touch();
        }
        self.persist();

        match trimmed(request.otp.as_deref()) {
            Some(code) => self.verify_manual_otp(&resolved_email, &code, lang).await,
            None => self.dispatch_manual_otp(&record, lang).await,
        }
    }

    async fn dispatch_manual_otp(
        &mut self,
        record: &EmployeeRecord,
        lang: language::Language,
    ) -> FlowReply {
        let recipient = record.name.clone().unwrap_or_else(|| "there".to_owned());
        let delivery = self.collaborators.delivery.clone();
        match self.otp.issue(record, delivery.as_ref()).await {
            Ok(IssueOutcome::Delivered(receipt)) => FlowReply::new(
                false,
                render(
                    MessageKey::OtpSent,
                    lang,
                    &[
                        ("name", recipient.as_str()),
                        ("channel", &receipt.channel.to_string()),
                    ],
                ),
                FlowState::ManualVerification,
            ),
            Ok(IssueOutcome::DevCode(code)) => FlowReply::new(
                false,
                render(
                    MessageKey::OtpDevCode,
                    lang,
                    &[("name", recipient.as_str()), ("code", &code)],
                ),
                FlowState::ManualVerification,
            ),
            Err(e) => FlowReply::new(
                false,
                render(MessageKey::OtpSendFailed, lang, &[("error", &e.to_string())]),
                FlowState::ManualVerification,
            ),
        }
    }

    async fn verify_manual_otp(
        &mut self,
        email: &str,
        code: &str,
        lang: language::Language,
    ) -> FlowReply {
        match self.otp.verify(email, code) {
            Verification::Verified { name, employee_id } => {
                let verified_name = {
                    let session = self.current_session_mut_or_create();
                    session.is_verified = true;
                    session.verification_method = Some(VerificationMethod::ManualWithOtp);
                    // Straight to verified: the passcode path does not
                    // offer face enrollment inline.
                    session.current_state = FlowState::EmployeeVerified;
                    session.touch();
                    session
                        .field(keys::MANUAL_NAME)
                        .map(str::to_owned)
                        .or(name)
                        .unwrap_or_else(|| "Employee".to_owned())
                };
                let verified_id = employee_id.or_else(|| {
                    self.current_session()
                        .and_then(|s| s.field(keys::MANUAL_EMPLOYEE_ID).map(str::to_owned))
                });
                self.state
                    .set_user_verified(&verified_name, verified_id.as_deref());
                self.persist();
                info!(name = %verified_name, "employee verified by OTP");

                let mut reply = render(MessageKey::OtpVerified, lang, &[("name", &verified_name)]);
                if let Some(id) = &verified_id {
                    if let Some(suffix) = self.manager_visit_suffix(id).await {
                        reply.push(' ');
                        reply.push_str(&suffix);
                    }
                }
                reply.push_str("\n\n");
                reply.push_str(message(MessageKey::EmployeeVerifiedPrompt, lang));
                FlowReply::new(true, reply, FlowState::EmployeeVerified)
            }
            Verification::Incorrect { remaining } => FlowReply::new(
                false,
                render(
                    MessageKey::OtpIncorrect,
                    lang,
                    &[("remaining", &remaining.to_string())],
                ),
                FlowState::ManualVerification,
            ),
            Verification::Exhausted => FlowReply::new(
                false,
                message(MessageKey::OtpExhausted, lang),
                FlowState::ManualVerification,
            ),
            Verification::NoSession => FlowReply::new(
                false,
                message(MessageKey::OtpNoSession, lang),
                FlowState::ManualVerification,
            ),
        }
    }

    /// Offer-or-skip face enrollment after verification.
    pub fn process_face_registration_choice(&mut self, register_face: bool) -> FlowReply {
        let lang = self.state.preferred_language();
        if !self.current_session().is_some_and(|s| s.is_verified) {
            return FlowReply::new(
                false,
                message(MessageKey::ManualNotVerified, lang),
                FlowState::Idle,
            );
        }

        if register_face {
            if let Some(session) = self.current_session_mut() {
                session.current_state = FlowState::FaceRegistration;
                session.touch();
            }
            let prompt = message(MessageKey::FaceRegistrationReady, lang).to_owned();
            self.post_signal(
                signal::START_FACE_REGISTRATION,
                json!({ "message": prompt, "next_endpoint": "/flow/register_face" }),
            );
            self.persist();
            FlowReply::new(true, prompt, FlowState::FaceRegistration)
        } else {
            if let Some(session) = self.current_session_mut() {
                session.current_state = FlowState::EmployeeVerified;
                session.touch();
            }
            self.persist();
            FlowReply::new(
                true,
                message(MessageKey::FaceRegistrationSkipAck, lang),
                FlowState::EmployeeVerified,
            )
        }
    }

    /// Record the outcome of a face enrollment attempt. Failure never
    /// blocks access — it only skips the future face shortcut.
    pub fn process_face_registration_completion(
        &mut self,
        success: bool,
        detail: Option<&str>,
    ) -> FlowReply {
        let lang = self.state.preferred_language();
        if !self.current_session().is_some_and(|s| s.is_verified) {
            return FlowReply::new(
                false,
                message(MessageKey::ManualNotVerified, lang),
                FlowState::Idle,
            );
        }

        if let Some(session) = self.current_session_mut() {
            session.current_state = FlowState::EmployeeVerified;
            if success {
                session.set_field(keys::FACE_REGISTERED, "true");
            }
            session.touch();
        }
        self.persist();

        let reply = if success {
            message(MessageKey::FaceRegistrationSuccess, lang).to_owned()
        } else {
            format!(
                "{} ({})",
                message(MessageKey::FaceRegistrationSkipAck, lang),
                detail.unwrap_or("unknown error")
            )
        };
        FlowReply::new(true, reply, FlowState::EmployeeVerified)
    }

    /// Collect visitor fields incrementally; once complete, log the visit
    /// and notify the host exactly once.
    pub async fn process_visitor_info(&mut self, info: &VisitorInfo) -> FlowReply {
        let lang = self.state.preferred_language();
        if !self
            .current_session()
            .is_some_and(|s| s.user_type == UserType::Visitor)
        {
            return FlowReply::new(
                false,
                message(MessageKey::ManualInvalidSession, lang),
                FlowState::Idle,
            );
        }

        let updated = {
            let session = self.current_session_mut_or_create();
            let mut updated = false;
            for (key, candidate) in [
                (keys::VISITOR_NAME, info.name.trim()),
                (keys::VISITOR_PHONE, info.phone.trim()),
                (keys::VISITOR_PURPOSE, info.purpose.trim()),
                (keys::HOST_EMPLOYEE, info.host.trim()),
            ] {
                if !candidate.is_empty() && session.field(key) != Some(candidate) {
                    session.set_field(key, candidate);
                    updated = true;
                }
            }
            updated
        };
        if updated {
            self.persist();
        }

        // First missing field, in fixed prompt order.
        let missing = [
            (keys::VISITOR_NAME, MessageKey::VisitorNeedName),
            (keys::VISITOR_PHONE, MessageKey::VisitorNeedPhone),
            (keys::VISITOR_PURPOSE, MessageKey::VisitorNeedPurpose),
            (keys::HOST_EMPLOYEE, MessageKey::VisitorNeedHost),
        ]
        .into_iter()
        .find(|(key, _)| self.current_session().and_then(|s| s.field(key)).is_none());

        if let Some((_, prompt)) = missing {
            return FlowReply::new(
                false,
                message(prompt, lang),
                FlowState::VisitorInfoCollection,
            );
        }

        let entry = {
            let field = |key| {
                self.current_session()
                    .and_then(|s| s.field(key))
                    .unwrap_or_default()
                    .to_owned()
            };
            VisitorEntry {
                name: field(keys::VISITOR_NAME),
                phone: field(keys::VISITOR_PHONE),
                purpose: field(keys::VISITOR_PURPOSE),
                host: field(keys::HOST_EMPLOYEE),
                photo_location: None,
            }
        };

        let already_logged = self
            .current_session()
            .and_then(|s| s.field(keys::VISITOR_LOGGED))
            .is_some();
        if !already_logged {
            // Best-effort: a failed notification is recorded, not fatal,
            // and the logged flag still flips so we never notify twice.
            match self.collaborators.visitors.log_and_notify(&entry).await {
                Ok(detail) => {
                    info!(visitor = %entry.name, host = %entry.host, "visit logged: {detail}");
                }
                Err(e) => {
                    warn!(visitor = %entry.name, "host notification failed: {e}");
                    if let Some(session) = self.current_session_mut() {
                        session.set_field(keys::NOTIFY_ERROR, e.to_string());
                    }
                }
            }
            if let Some(session) = self.current_session_mut() {
                session.set_field(keys::VISITOR_LOGGED, "true");
            }
        }

        if let Some(session) = self.current_session_mut() {
            session.current_state = FlowState::HostNotification;
            session.touch();
        }
        self.persist();

        let prompt = render(MessageKey::VisitorPhotoPrompt, lang, &[("host", &entry.host)]);
        self.post_signal(
            signal::START_VISITOR_PHOTO,
            json!({
                "message": prompt,
                "next_endpoint": "/flow/visitor_photo",
                "visitor_name": entry.name,
            }),
        );

        FlowReply::new(true, prompt, FlowState::HostNotification)
    }

    /// Record the visitor photo outcome. A legacy capture path no longer
    /// gates progress: visitors move to host notification either way.
    pub fn process_visitor_face_capture(&mut self, captured: bool) -> FlowReply {
        let lang = self.state.preferred_language();
        if !self
            .current_session()
            .is_some_and(|s| s.user_type == UserType::Visitor)
        {
            return FlowReply::new(
                false,
                message(MessageKey::ManualInvalidSession, lang),
                FlowState::Idle,
            );
        }

        if let Some(session) = self.current_session_mut() {
            if captured {
                session.set_field(keys::FACE_CAPTURED, "true");
            }
            session.current_state = FlowState::HostNotification;
            session.touch();
        }
        self.persist();
        FlowReply::new(
            true,
            message(MessageKey::HostNotificationPrompt, lang),
            FlowState::HostNotification,
        )
    }

    /// Gate tool access on verification and user type.
    ///
    /// Policy invariant: only verified employees may use the restricted
    /// tool set.
    #[must_use]
    pub fn check_tool_access(&self, tool_name: &str) -> (bool, String) {
        let session = self.current_session();
        let verified = session.is_some_and(|s| s.is_verified);
        if !verified {
            if session.is_some_and(|s| s.user_type == UserType::Visitor) {
                return (
                    false,
                    "Visitors have limited access. Your host will assist you with any information needed."
                        .to_owned(),
                );
            }
            return (
                false,
                "Please verify your identity first. Say 'Hey Clara' to start the verification process."
                    .to_owned(),
            );
        }

        if RESTRICTED_TOOLS.contains(&tool_name)
            && !session.is_some_and(|s| s.user_type == UserType::Employee)
        {
            return (false, "This tool requires employee access.".to_owned());
        }

        (
            true,
            format!("Access granted for {tool_name}. How can I help you?"),
        )
    }

    /// End the conversation: the session is removed outright, not
    /// archived, and the current pointer cleared.
    pub fn end_session(&mut self) -> String {
        let lang = self.state.preferred_language();
        if let Some(session_id) = self.current_session_id.take() {
            self.sessions.remove(&session_id);
            self.persist();
            info!(%session_id, "flow session ended");
        }
        message(MessageKey::FlowEndPrompt, lang).to_owned()
    }

    /// Remove sessions idle longer than `max_age_hours`.
    pub fn cleanup_old_sessions(&mut self, max_age_hours: u64) {
        let max_age_secs = max_age_hours * 3600;
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.idle_secs() > max_age_secs)
            .map(|s| s.session_id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }

        for session_id in &expired {
            self.sessions.remove(session_id);
        }
        if self
            .current_session_id
            .as_ref()
            .is_some_and(|id| expired.contains(id))
        {
            self.current_session_id = None;
        }
        info!(count = expired.len(), "expired flow sessions removed");
        self.persist();
    }

    /// Debug snapshot of the current flow position.
    #[must_use]
    pub fn status(&self) -> serde_json::Value {
        let Some(session) = self.current_session() else {
            return json!({ "status": "no_active_session" });
        };
        let last_activity = chrono::DateTime::from_timestamp(session.last_activity as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        json!({
            "session_id": session.session_id,
            "current_state": session.current_state,
            "user_type": session.user_type,
            "is_verified": session.is_verified,
            "verification_method": session.verification_method,
            "user_data_keys": session.user_data.keys().collect::<Vec<_>>(),
            "last_activity": last_activity,
        })
    }

    // ── internals ───────────────────────────────────────────────────────

    async fn resolve_employee(
        &self,
        email: Option<&str>,
        employee_id: &str,
    ) -> anyhow::Result<Option<EmployeeRecord>> {
        if let Some(email) = trimmed(email) {
            if let Some(record) = self.collaborators.directory.lookup_by_email(&email).await? {
                return Ok(Some(record));
            }
        }
        self.collaborators.directory.lookup_by_id(employee_id).await
    }

    /// Suffix for a scheduled manager visit today, if any. Lookup
    /// failures are logged and ignored — the greeting still goes out.
    async fn manager_visit_suffix(&self, employee_id: &str) -> Option<String> {
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        match self
            .collaborators
            .visits
            .visit_for(employee_id, &today)
            .await
        {
            Ok(Some(visit)) => Some(visit_message(&visit)),
            Ok(None) => None,
            Err(e) => {
                warn!(%employee_id, "manager visit lookup failed: {e}");
                None
            }
        }
    }

    fn current_session_mut(&mut self) -> Option<&mut FlowSession> {
        let id = self.current_session_id.clone()?;
        self.sessions.get_mut(&id)
    }

    fn current_session_mut_or_create(&mut self) -> &mut FlowSession {
        let id = match self
            .current_session_id
            .clone()
            .filter(|id| self.sessions.contains_key(id))
        {
            Some(id) => id,
            None => self.create_session(),
        };
        self.sessions
            .entry(id)
            .or_insert_with_key(|key| FlowSession::new(key.clone()))
    }

    /// Signal posting is best-effort: the conversation continues even if
    /// the front-end mailbox is unwritable.
    fn post_signal(&self, name: &str, payload: serde_json::Value) {
        if let Err(e) = self.signals.post(name, payload) {
            warn!(name, "could not post front-end signal: {e}");
        }
    }

    fn persist(&self) {
        let doc = SessionDocument {
            sessions: self.sessions.clone(),
            current_session_id: self.current_session_id.clone(),
            last_updated: now_epoch_secs(),
        };
        doc.persist(&self.store_path);
    }
}

/// Evaluate the ordered classification rule table.
fn classify(normalized_input: &str) -> Option<UserType> {
    for (user_type, keywords) in CLASSIFICATION_RULES {
        if keywords.iter().any(|k| normalized_input.contains(k)) {
            return Some(*user_type);
        }
    }
    None
}

/// English visit greeting composed from the schedule record.
fn visit_message(visit: &ManagerVisit) -> String {
    let office = visit.office.as_deref().unwrap_or("our office");
    let mut parts = vec![format!("Hope your visit to our {office} office goes smoothly.")];
    if let Some(manager) = &visit.manager_name {
        parts.push(format!("Your meeting with {manager} is confirmed."));
    }
    parts.push("Let me know if you need any assistance while you're here.".to_owned());
    parts.join(" ")
}

fn trimmed(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::GateConfig;
    use crate::test_utils::{
        InMemoryDirectory, RecordingOtpDelivery, RecordingVisitorSink, StaticVisitSchedule,
    };
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "clara-flow-{name}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn asha() -> EmployeeRecord {
        EmployeeRecord {
            employee_id: "E100".into(),
            name: Some("Asha".into()),
            email: Some("asha@example.com".into()),
            phone: Some("+911234567890".into()),
            department: Some("Engineering".into()),
        }
    }

    fn manager_with(dir: &PathBuf, mutate: impl FnOnce(&mut ReceptionConfig)) -> FlowManager {
        let mut config = ReceptionConfig {
            data_dir: dir.clone(),
            ..ReceptionConfig::default()
        };
        config.otp.dev_mode = true;
        mutate(&mut config);
        let state = StateStore::open(dir, &GateConfig::default());
        let collaborators = Collaborators {
            directory: Arc::new(InMemoryDirectory::with_records(vec![asha()])),
            delivery: Arc::new(RecordingOtpDelivery::default()),
            visitors: Arc::new(RecordingVisitorSink::default()),
            visits: Arc::new(StaticVisitSchedule::default()),
        };
        FlowManager::new(config, state, collaborators)
    }

    fn manager(dir: &PathBuf) -> FlowManager {
        manager_with(dir, |_| {})
    }

    #[test]
    fn wake_creates_session_in_language_selection() {
        let dir = temp_dir("wake");
        let mut flow = manager(&dir);
        let reply = flow.process_wake_word_detected();
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::LanguageSelection);
        assert!(reply.message.contains("Clara"));
        assert_eq!(
            flow.current_session().unwrap().current_state,
            FlowState::LanguageSelection
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn employee_keyword_overrides_pending_language_selection() {
        let dir = temp_dir("keyword-override");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();

        let reply = flow.process_user_classification("I am an employee");
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::FaceRecognition);
        let session = flow.current_session().unwrap();
        assert_eq!(session.user_type, UserType::Employee);

        let signal = flow.signals().take().expect("signal posted");
        assert_eq!(signal.name, signal::START_FACE_CAPTURE);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn language_choice_advances_then_prompts_again() {
        let dir = temp_dir("language-choice");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();

        let reply = flow.process_user_classification("tamil please");
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::UserClassification);
        assert_eq!(flow.state.preferred_language(), language::Language::Ta);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_language_choice_stays_in_selection() {
        let dir = temp_dir("language-retry");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();

        let reply = flow.process_user_classification("banana");
        assert!(!reply.ok);
        assert_eq!(reply.state, FlowState::LanguageSelection);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unclear_classification_keeps_state() {
        let dir = temp_dir("unclear");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("english");

        let reply = flow.process_user_classification("nice weather today");
        assert!(!reply.ok);
        assert_eq!(reply.state, FlowState::UserClassification);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn classification_without_session_creates_one() {
        let dir = temp_dir("defensive");
        let mut flow = manager(&dir);
        let reply = flow.process_user_classification("I am a visitor");
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::VisitorInfoCollection);
        assert!(flow.current_session().is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tamil_employee_keyword_classifies() {
        let dir = temp_dir("tamil-keyword");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        let reply = flow.process_user_classification("நான் ஊழியர்");
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::FaceRecognition);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn face_success_verifies_and_mirrors_state() {
        let dir = temp_dir("face-success");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");

        let result = FaceRecognitionResult {
            status: FaceResultStatus::Success,
            name: Some("Asha".into()),
            employee_id: Some("E100".into()),
        };
        let reply = flow.process_face_recognition_result(&result).await;
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::EmployeeVerified);
        assert!(reply.message.contains("Asha"));

        let session = flow.current_session().unwrap();
        assert!(session.is_verified);
        assert_eq!(
            session.verification_method,
            Some(VerificationMethod::FaceRecognition)
        );
        assert_eq!(session.field(keys::EMPLOYEE_ID), Some("E100"));

        flow.state.refresh();
        let snapshot = flow.state.snapshot();
        assert!(snapshot.is_verified);
        assert_eq!(snapshot.verified_user_name.as_deref(), Some("Asha"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn face_partial_result_degrades_to_manual() {
        let dir = temp_dir("face-partial");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");

        let result = FaceRecognitionResult {
            status: FaceResultStatus::Success,
            name: Some("Asha".into()),
            employee_id: None,
        };
        let reply = flow.process_face_recognition_result(&result).await;
        assert!(!reply.ok);
        assert_eq!(reply.state, FlowState::ManualVerification);
        let session = flow.current_session().unwrap();
        assert!(!session.is_verified);
        assert_eq!(session.verification_attempts, 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn face_disabled_always_degrades() {
        let dir = temp_dir("face-disabled");
        let mut flow = manager_with(&dir, |c| c.face.enabled = false);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");

        let result = FaceRecognitionResult {
            status: FaceResultStatus::Success,
            name: Some("Asha".into()),
            employee_id: Some("E100".into()),
        };
        let reply = flow.process_face_recognition_result(&result).await;
        assert!(!reply.ok);
        assert_eq!(reply.state, FlowState::ManualVerification);
        assert!(!flow.current_session().unwrap().is_verified);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn face_success_clears_stale_manual_fields() {
        let dir = temp_dir("face-clears-manual");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");
        // Half-done manual attempt before recognition caught up.
        flow.process_manual_verification_step(&ManualVerificationRequest {
            employee_id: Some("E100".into()),
            ..ManualVerificationRequest::default()
        })
        .await;
        assert!(flow
            .current_session()
            .unwrap()
            .field(keys::MANUAL_EMAIL)
            .is_some());

        let result = FaceRecognitionResult {
            status: FaceResultStatus::Success,
            name: Some("Asha".into()),
            employee_id: Some("E100".into()),
        };
        flow.process_face_recognition_result(&result).await;
        let session = flow.current_session().unwrap();
        assert!(session.field(keys::MANUAL_EMAIL).is_none());
        assert!(session.field(keys::MANUAL_NAME).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn manual_step_requires_employee_id() {
        let dir = temp_dir("manual-id-required");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");

        let reply = flow
            .process_manual_verification_step(&ManualVerificationRequest {
                email: Some("asha@example.com".into()),
                ..ManualVerificationRequest::default()
            })
            .await;
        assert!(!reply.ok);
        assert_eq!(reply.state, FlowState::ManualVerification);
        assert_eq!(
            reply.message,
            message(MessageKey::ManualMissingEmployeeId, language::Language::En)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn manual_unknown_id_gets_not_found_message() {
        let dir = temp_dir("manual-not-found");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");

        let reply = flow
            .process_manual_verification_step(&ManualVerificationRequest {
                employee_id: Some("E999".into()),
                ..ManualVerificationRequest::default()
            })
            .await;
        assert!(!reply.ok);
        assert_eq!(reply.state, FlowState::ManualVerification);
        assert_eq!(
            reply.message,
            message(MessageKey::ManualEmployeeNotFound, language::Language::En)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn manual_otp_round_trip_verifies() {
        let dir = temp_dir("manual-otp");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("employee");

        // Request a code (dev mode hands it back in the message).
        let reply = flow
            .process_manual_verification_step(&ManualVerificationRequest {
                employee_id: Some("E100".into()),
                ..ManualVerificationRequest::default()
            })
            .await;
        assert!(!reply.ok);
        let code = extract_code(&reply.message);

        let reply = flow
            .process_manual_verification_step(&ManualVerificationRequest {
                employee_id: Some("E100".into()),
                otp: Some(code),
                ..ManualVerificationRequest::default()
            })
            .await;
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::EmployeeVerified);
        assert!(reply.message.contains("Asha"));

        let session = flow.current_session().unwrap();
        assert!(session.is_verified);
        assert_eq!(
            session.verification_method,
            Some(VerificationMethod::ManualWithOtp)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn visitor_fields_prompted_in_order() {
        let dir = temp_dir("visitor-order");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        flow.process_user_classification("visitor");

        let reply = flow
            .process_visitor_info(&VisitorInfo {
                name: "Priya".into(),
                ..VisitorInfo::default()
            })
            .await;
        assert!(!reply.ok);
        assert_eq!(
            reply.message,
            message(MessageKey::VisitorNeedPhone, language::Language::En)
        );

        let reply = flow
            .process_visitor_info(&VisitorInfo {
                phone: "+919999".into(),
                ..VisitorInfo::default()
            })
            .await;
        assert_eq!(
            reply.message,
            message(MessageKey::VisitorNeedPurpose, language::Language::En)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn visitor_notification_fires_exactly_once() {
        let dir = temp_dir("visitor-once");
        let sink = Arc::new(RecordingVisitorSink::default());
        let mut flow = manager(&dir);
        flow.collaborators.visitors = sink.clone();
        flow.process_wake_word_detected();
        flow.process_user_classification("visitor");

        let info = VisitorInfo {
            name: "Priya".into(),
            phone: "+919999".into(),
            purpose: "interview".into(),
            host: "Asha".into(),
        };
        let reply = flow.process_visitor_info(&info).await;
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::HostNotification);
        assert!(reply.message.contains("Asha"));
        assert_eq!(sink.notified_count(), 1);

        // Repeating the complete submission does not re-notify.
        let reply = flow.process_visitor_info(&info).await;
        assert!(reply.ok);
        assert_eq!(sink.notified_count(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn visitor_notification_failure_is_recorded_not_fatal() {
        let dir = temp_dir("visitor-notify-fail");
        let mut flow = manager(&dir);
        flow.collaborators.visitors = Arc::new(RecordingVisitorSink::failing());
        flow.process_wake_word_detected();
        flow.process_user_classification("visitor");

        let reply = flow
            .process_visitor_info(&VisitorInfo {
                name: "Priya".into(),
                phone: "+919999".into(),
                purpose: "interview".into(),
                host: "Asha".into(),
            })
            .await;
        assert!(reply.ok);
        assert_eq!(reply.state, FlowState::HostNotification);
        let session = flow.current_session().unwrap();
        assert!(session.field(keys::NOTIFY_ERROR).is_some());
        assert!(session.field(keys::VISITOR_LOGGED).is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn tool_access_policy() {
        let dir = temp_dir("tool-access");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();

        // Unverified, unclassified.
        let (ok, msg) = flow.check_tool_access("send_email");
        assert!(!ok);
        assert!(msg.contains("verify"));

        // Unverified visitor.
        flow.process_user_classification("visitor");
        let (ok, msg) = flow.check_tool_access("send_email");
        assert!(!ok);
        assert!(msg.contains("limited access"));

        // Verified employee gets restricted tools.
        flow.process_user_classification("employee");
        let result = FaceRecognitionResult {
            status: FaceResultStatus::Success,
            name: Some("Asha".into()),
            employee_id: Some("E100".into()),
        };
        flow.process_face_recognition_result(&result).await;
        let (ok, _) = flow.check_tool_access("send_email");
        assert!(ok);
        let (ok, _) = flow.check_tool_access("weather");
        assert!(ok);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn end_session_removes_the_session() {
        let dir = temp_dir("end");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        assert!(flow.current_session().is_some());

        let farewell = flow.end_session();
        assert!(farewell.contains("Hey Clara"));
        assert!(flow.current_session().is_none());
        assert!(flow.sessions.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cleanup_drops_expired_sessions() {
        let dir = temp_dir("cleanup");
        let mut flow = manager(&dir);
        flow.process_wake_word_detected();
        if let Some(session) = flow.current_session_mut() {
            session.last_activity = now_epoch_secs().saturating_sub(3 * 3600);
        }
        flow.cleanup_old_sessions(2);
        assert!(flow.current_session().is_none());
        assert!(flow.sessions.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_reports_current_position() {
        let dir = temp_dir("status");
        let mut flow = manager(&dir);
        assert_eq!(flow.status()["status"], "no_active_session");

        flow.process_wake_word_detected();
        let status = flow.status();
        assert_eq!(status["current_state"], "language_selection");
        assert_eq!(status["is_verified"], false);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn verified_session_has_identity() {
        // The "no verified nobody" invariant on the conversion path.
        let outcome = MatchOutcome::Recognized {
            employee_id: "E100".into(),
            display_name: "Asha".into(),
            distance: 0.3,
        };
        let result = FaceRecognitionResult::from(outcome);
        assert_eq!(result.status, FaceResultStatus::Success);
        assert!(result.name.is_some() && result.employee_id.is_some());

        let ambiguous = MatchOutcome::Ambiguous {
            distance: 0.5,
            runner_up: 0.52,
        };
        let result = FaceRecognitionResult::from(ambiguous);
        assert_eq!(result.status, FaceResultStatus::NotRecognized);
    }

    /// Pull the dev-mode code out of the OTP confirmation message.
    fn extract_code(message: &str) -> String {
        message
            .split(|c: char| !c.is_ascii_digit())
            .find(|token| token.len() == 6)
            .expect("dev-mode message carries the code")
            .to_owned()
    }
}
