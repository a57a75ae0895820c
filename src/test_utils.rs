//! In-memory collaborator fakes shared by unit and integration tests.
//!
//! Each fake can be switched into a failing mode to exercise the
//! transient-error paths without any real backend.

use crate::collaborators::{
    BlobStore, DeliveryChannel, DeliveryReceipt, EmployeeDirectory, EmployeeRecord, ManagerVisit,
    OtpDelivery, OtpDispatch, VisitSchedule, VisitorEntry, VisitorSink,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Employee directory backed by a fixed record list.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: Vec<EmployeeRecord>,
    fail: bool,
}

impl InMemoryDirectory {
    /// Directory holding `records`.
    #[must_use]
    pub fn with_records(records: Vec<EmployeeRecord>) -> Self {
        Self {
            records,
            fail: false,
        }
    }

    /// Directory whose every lookup fails transiently.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail: true,
        }
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("directory unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryDirectory {
    async fn lookup_by_id(&self, employee_id: &str) -> anyhow::Result<Option<EmployeeRecord>> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .find(|r| r.employee_id.eq_ignore_ascii_case(employee_id.trim()))
            .cloned())
    }

    async fn lookup_by_email(&self, email: &str) -> anyhow::Result<Option<EmployeeRecord>> {
        self.check()?;
        let email = email.trim().to_lowercase();
        Ok(self
            .records
            .iter()
            .find(|r| {
                r.email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase() == email)
            })
            .cloned())
    }

    async fn lookup_by_name(&self, name: &str) -> anyhow::Result<Option<EmployeeRecord>> {
        self.check()?;
        let name = name.trim().to_lowercase();
        Ok(self
            .records
            .iter()
            .find(|r| {
                r.name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase() == name)
            })
            .cloned())
    }
}

/// OTP delivery that records every dispatch.
#[derive(Debug, Default)]
pub struct RecordingOtpDelivery {
    dispatches: Mutex<Vec<OtpDispatch>>,
    fail_all: bool,
    fail_channel: Option<DeliveryChannel>,
}

impl RecordingOtpDelivery {
    /// Delivery where every channel fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Delivery where only `channel` fails.
    #[must_use]
    pub fn failing_channel(channel: DeliveryChannel) -> Self {
        Self {
            fail_channel: Some(channel),
            ..Self::default()
        }
    }

    /// Number of successful sends.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.dispatches.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// The most recent successful dispatch.
    #[must_use]
    pub fn last_dispatch(&self) -> Option<OtpDispatch> {
        self.dispatches.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl OtpDelivery for RecordingOtpDelivery {
    async fn send(&self, dispatch: &OtpDispatch) -> anyhow::Result<DeliveryReceipt> {
        if self.fail_all || self.fail_channel == Some(dispatch.channel) {
            anyhow::bail!("{} gateway unavailable", dispatch.channel);
        }
        if let Ok(mut dispatches) = self.dispatches.lock() {
            dispatches.push(dispatch.clone());
        }
        Ok(DeliveryReceipt {
            channel: dispatch.channel,
            detail: format!("to {}", dispatch.destination),
        })
    }
}

/// Visitor sink that counts notifications.
#[derive(Debug, Default)]
pub struct RecordingVisitorSink {
    notified: AtomicUsize,
    entries: Mutex<Vec<VisitorEntry>>,
    fail: bool,
}

impl RecordingVisitorSink {
    /// Sink whose every notification fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of notification attempts that succeeded.
    #[must_use]
    pub fn notified_count(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }

    /// Entries that were logged.
    #[must_use]
    pub fn entries(&self) -> Vec<VisitorEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisitorSink for RecordingVisitorSink {
    async fn log_and_notify(&self, entry: &VisitorEntry) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("notification service unavailable");
        }
        self.notified.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(format!("notified {}", entry.host))
    }
}

/// Visit schedule backed by a fixed `(employee_id, date)` map.
#[derive(Debug, Default)]
pub struct StaticVisitSchedule {
    visits: HashMap<(String, String), ManagerVisit>,
}

impl StaticVisitSchedule {
    /// Schedule one visit.
    #[must_use]
    pub fn with_visit(employee_id: &str, date: &str, visit: ManagerVisit) -> Self {
        let mut visits = HashMap::new();
        visits.insert((employee_id.to_owned(), date.to_owned()), visit);
        Self { visits }
    }
}

#[async_trait]
impl VisitSchedule for StaticVisitSchedule {
    async fn visit_for(
        &self,
        employee_id: &str,
        date: &str,
    ) -> anyhow::Result<Option<ManagerVisit>> {
        Ok(self
            .visits
            .get(&(employee_id.to_owned(), date.to_owned()))
            .cloned())
    }
}

/// Blob store over a single in-memory slot.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blob: Mutex<Option<Vec<u8>>>,
    fail: bool,
}

impl InMemoryBlobStore {
    /// Store pre-seeded with `bytes`.
    #[must_use]
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(bytes)),
            fail: false,
        }
    }

    /// Store whose reads and writes all fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            blob: Mutex::new(None),
            fail: true,
        }
    }

    /// Current blob contents.
    #[must_use]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.blob.lock().ok()?.clone()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn read(&self) -> anyhow::Result<Option<Vec<u8>>> {
        if self.fail {
            anyhow::bail!("blob store unavailable");
        }
        Ok(self.bytes())
    }

    async fn write(&self, bytes: &[u8]) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("blob store unavailable");
        }
        if let Ok(mut blob) = self.blob.lock() {
            *blob = Some(bytes.to_vec());
        }
        Ok(())
    }
}
