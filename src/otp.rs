//! One-time-passcode sessions for manual employee verification.
//!
//! One session per resolved employee email. A session is created (or
//! replaced) when a code is issued, counts failed verification attempts,
//! and is forcibly reset once the attempt cap is exhausted — the caller
//! must restart verification, and the old code is gone.

use crate::collaborators::{DeliveryChannel, DeliveryReceipt, EmployeeRecord, OtpDelivery, OtpDispatch};
use crate::config::OtpConfig;
use crate::error::{ReceptionError, Result};
use crate::state::now_epoch_secs;
use rand::Rng;
use std::collections::HashMap;
use tracing::{info, warn};

/// State of one passcode session.
#[derive(Debug, Clone, Default)]
struct OtpSession {
    /// Outstanding code; `None` after a forced reset.
    code: Option<String>,
    /// Failed verification attempts so far.
    attempts: u32,
    /// Set once a code was verified.
    verified: bool,
    /// Resolved display name, carried into the verification outcome.
    name: Option<String>,
    /// Resolved employee ID, carried into the verification outcome.
    employee_id: Option<String>,
    /// Channel the last code went out on.
    delivery: Option<DeliveryChannel>,
    /// Epoch seconds the last code was issued.
    issued_at: u64,
}

/// How a code was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Code delivered through a collaborator channel.
    Delivered(DeliveryReceipt),
    /// Development mode: no delivery, the code is handed back directly.
    DevCode(String),
}

/// Result of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Code matched; identity fields from the session.
    Verified {
        /// Resolved display name.
        name: Option<String>,
        /// Resolved employee ID.
        employee_id: Option<String>,
    },
    /// Code did not match; attempts remain.
    Incorrect {
        /// Attempts left before the forced reset.
        remaining: u32,
    },
    /// Attempt cap reached: the session was reset and the stored code
    /// cleared. The user must restart verification.
    Exhausted,
    /// No session exists for this email — a code must be requested first.
    NoSession,
}

/// Table of active passcode sessions, keyed by normalized email.
#[derive(Debug)]
pub struct OtpSessions {
    sessions: HashMap<String, OtpSession>,
    config: OtpConfig,
}

impl OtpSessions {
    /// Create an empty table.
    #[must_use]
    pub fn new(config: OtpConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Issue a fresh code for `record` and deliver it.
    ///
    /// Replaces any existing session for the same email. Delivery prefers
    /// SMS when the record has a phone number and falls back to email; in
    /// dev mode no delivery happens and the code is returned directly.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::Otp`] when the record has no usable email,
    /// or when every delivery channel failed. The issued code stays stored
    /// either way, so a later resend can succeed without invalidating it.
    pub async fn issue(
        &mut self,
        record: &EmployeeRecord,
        delivery: &dyn OtpDelivery,
    ) -> Result<IssueOutcome> {
        let Some(email_key) = normalize_email(record.email.as_deref()) else {
            return Err(ReceptionError::Otp(
                "no email address on file for OTP delivery".into(),
            ));
        };

        let code = self.generate_code();
        let session = self.sessions.entry(email_key.clone()).or_default();
        session.code = Some(code.clone());
        session.attempts = 0;
        session.verified = false;
        session.name = record.name.clone();
        session.employee_id = Some(record.employee_id.clone());
        session.delivery = None;
        session.issued_at = now_epoch_secs();

        if self.config.dev_mode {
            info!(email = %email_key, "dev-mode OTP issued, delivery skipped");
            return Ok(IssueOutcome::DevCode(code));
        }

        let recipient = record.name.clone();

        // SMS first when we have a phone number, email as the fallback.
        let mut sms_failure: Option<String> = None;
        if let Some(phone) = record.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            let dispatch = OtpDispatch {
                channel: DeliveryChannel::Sms,
                destination: phone.to_owned(),
                code: code.clone(),
                recipient_name: recipient.clone(),
            };
            match delivery.send(&dispatch).await {
                Ok(receipt) => {
                    info!(email = %email_key, channel = %receipt.channel, "OTP dispatched");
                    self.mark_delivery(&email_key, receipt.channel);
                    return Ok(IssueOutcome::Delivered(receipt));
                }
                Err(e) => {
                    warn!(email = %email_key, "SMS delivery failed, trying email: {e}");
                    sms_failure = Some(e.to_string());
                }
            }
        }

        let dispatch = OtpDispatch {
            channel: DeliveryChannel::Email,
            destination: email_key.clone(),
            code,
            recipient_name: recipient,
        };
        match delivery.send(&dispatch).await {
            Ok(receipt) => {
                info!(email = %email_key, channel = %receipt.channel, "OTP dispatched");
                self.mark_delivery(&email_key, receipt.channel);
                Ok(IssueOutcome::Delivered(receipt))
            }
            Err(email_failure) => {
                let detail = match sms_failure {
                    Some(sms) => format!("SMS: {sms}; email: {email_failure}"),
                    None => email_failure.to_string(),
                };
                warn!(email = %email_key, "OTP delivery failed: {detail}");
                Err(ReceptionError::Otp(detail))
            }
        }
    }

    /// Verify a provided code against the session for `email`.
    pub fn verify(&mut self, email: &str, provided: &str) -> Verification {
        let Some(email_key) = normalize_email(Some(email)) else {
            return Verification::NoSession;
        };
        let max_attempts = self.config.max_attempts;

        let Some(session) = self.sessions.get_mut(&email_key) else {
            return Verification::NoSession;
        };

        if session.attempts >= max_attempts {
            // The cap was reached on a previous attempt: reset now, which
            // also invalidates any previously-issued code.
            let (name, employee_id) = (session.name.clone(), session.employee_id.clone());
            *session = OtpSession {
                name,
                employee_id,
                ..OtpSession::default()
            };
            info!(email = %email_key, "OTP session reset after exhausted attempts");
            return Verification::Exhausted;
        }

        let provided = provided.trim();
        if !provided.is_empty() && session.code.as_deref() == Some(provided) {
            session.verified = true;
            let age_secs = now_epoch_secs().saturating_sub(session.issued_at);
            info!(email = %email_key, age_secs, "OTP verified");
            return Verification::Verified {
                name: session.name.clone(),
                employee_id: session.employee_id.clone(),
            };
        }

        session.attempts += 1;
        let remaining = max_attempts.saturating_sub(session.attempts);
        warn!(email = %email_key, remaining, "OTP attempt failed");
        Verification::Incorrect { remaining }
    }

    /// Drop the session for `email`, if any.
    pub fn clear(&mut self, email: &str) {
        if let Some(email_key) = normalize_email(Some(email)) {
            self.sessions.remove(&email_key);
        }
    }

    /// Whether a session currently holds an outstanding, unverified code.
    #[must_use]
    pub fn has_pending_code(&self, email: &str) -> bool {
        normalize_email(Some(email))
            .and_then(|key| self.sessions.get(&key))
            .is_some_and(|s| s.code.is_some() && !s.verified)
    }

    /// Channel the last issued code was delivered over, if any.
    #[must_use]
    pub fn delivery_channel(&self, email: &str) -> Option<DeliveryChannel> {
        normalize_email(Some(email))
            .and_then(|key| self.sessions.get(&key))
            .and_then(|s| s.delivery)
    }

    fn mark_delivery(&mut self, email_key: &str, channel: DeliveryChannel) {
        if let Some(session) = self.sessions.get_mut(email_key) {
            session.delivery = Some(channel);
        }
    }

    fn generate_code(&self) -> String {
        let digits = self.config.code_digits.clamp(4, 9);
        let low = 10u32.pow(digits - 1);
        let high = 10u32.pow(digits);
        let code = rand::thread_rng().gen_range(low..high);
        code.to_string()
    }
}

/// Lowercased, trimmed email; `None` when empty.
fn normalize_email(email: Option<&str>) -> Option<String> {
    let normalized = email?.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
