//! Collaborator contracts for external services.
//!
//! The reception core never talks to DynamoDB, S3, SNS, SMTP, or Teams
//! directly — it sees these narrow seams. Implementations live with the
//! deployment; in-memory fakes for tests live in [`crate::test_utils`].
//!
//! `Ok(None)` from a lookup means "no such record" and is handled as a
//! distinct user-facing case; `Err` means a transient backend problem and
//! is always surfaced as retryable.

use async_trait::async_trait;

/// One employee-directory record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeRecord {
    /// Stable employee identifier (e.g. `E100`).
    pub employee_id: String,
    /// Full display name.
    pub name: Option<String>,
    /// Registered company email.
    pub email: Option<String>,
    /// Registered phone number.
    pub phone: Option<String>,
    /// Department, when the directory carries one.
    pub department: Option<String>,
}

/// Read access to the employee directory.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Look up a record by employee ID.
    async fn lookup_by_id(&self, employee_id: &str) -> anyhow::Result<Option<EmployeeRecord>>;

    /// Look up a record by registered email.
    async fn lookup_by_email(&self, email: &str) -> anyhow::Result<Option<EmployeeRecord>>;

    /// Look up a record by display name (best-effort match).
    async fn lookup_by_name(&self, name: &str) -> anyhow::Result<Option<EmployeeRecord>>;
}

/// Channel an OTP was (or should be) delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// Text message to the employee's phone.
    Sms,
    /// Email to the registered address.
    Email,
    /// Workplace chat message.
    Chat,
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sms => "SMS",
            Self::Email => "email",
            Self::Chat => "chat",
        })
    }
}

/// A single OTP delivery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpDispatch {
    /// Requested channel.
    pub channel: DeliveryChannel,
    /// Channel-specific destination (phone number, email address…).
    pub destination: String,
    /// The code to deliver.
    pub code: String,
    /// Recipient name for the message template.
    pub recipient_name: Option<String>,
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Channel actually used.
    pub channel: DeliveryChannel,
    /// Human-readable detail, e.g. `"to +91…"` — shown to the user.
    pub detail: String,
}

/// One-time-passcode delivery.
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    /// Deliver a code. `Err` is a transient failure the flow surfaces as a
    /// retryable message.
    async fn send(&self, dispatch: &OtpDispatch) -> anyhow::Result<DeliveryReceipt>;
}

/// Fields logged for one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorEntry {
    /// Visitor name.
    pub name: String,
    /// Visitor phone number.
    pub phone: String,
    /// Stated purpose of the visit.
    pub purpose: String,
    /// The employee being visited.
    pub host: String,
    /// Location of the captured visitor photo, when available.
    pub photo_location: Option<String>,
}

/// Best-effort visitor logging and host notification.
#[async_trait]
pub trait VisitorSink: Send + Sync {
    /// Record the visit and notify the host. Returns a detail string on
    /// success. Failures are recorded into the session, never fatal.
    async fn log_and_notify(&self, entry: &VisitorEntry) -> anyhow::Result<String>;
}

/// A scheduled manager visit for an employee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerVisit {
    /// Visiting manager's name, when known.
    pub manager_name: Option<String>,
    /// Office the visit takes place in.
    pub office: Option<String>,
}

/// Lookup of scheduled manager visits.
#[async_trait]
pub trait VisitSchedule: Send + Sync {
    /// Visit scheduled for `employee_id` on `date` (`YYYY-MM-DD`), if any.
    async fn visit_for(&self, employee_id: &str, date: &str)
        -> anyhow::Result<Option<ManagerVisit>>;
}

/// Whole-document blob storage for the face gallery.
///
/// Readers get the full blob or nothing; writers replace the full blob.
/// No partial-write states are ever visible.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the full blob. `Ok(None)` means the blob does not exist yet.
    async fn read(&self) -> anyhow::Result<Option<Vec<u8>>>;

    /// Replace the full blob.
    async fn write(&self, bytes: &[u8]) -> anyhow::Result<()>;
}
