use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle: `CREATED -> QUEUED -> PROCESSING -> SAVING -> {COMPLETE | FAILED | CANCELLED}`
///
/// Any state may be skipped, none may be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    Queued,
    Processing,
    Saving,
    Complete,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Queued => 1,
            Self::Processing => 2,
            Self::Saving => 3,
            Self::Complete | Self::Failed | Self::Cancelled => 4,
        }
    }

    /// Forward moves only, and nothing leaves a terminal state
    pub fn can_advance_to(&self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Saving => "SAVING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub site: String,
    pub chapter: String,
    /// Archive file name, known once the writer is resolved
    pub file: Option<String>,
    pub status: JobState,
    /// Fraction of pages written, `None` while the page count is unknown
    pub completion: Option<f64>,
    pub bytes: u64,
    pub pages: usize,
    pub total_pages: Option<usize>,
    pub created: DateTime<Utc>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Mutable bookkeeping of an active job
#[derive(Debug, Clone)]
pub(crate) struct JobRecord {
    pub id: JobId,
    pub site: String,
    pub chapter: String,
    pub register_mark: bool,
    pub state: JobState,
    pub created: DateTime<Utc>,
    pub begin: Option<DateTime<Utc>>,
    pub file: Option<String>,
    pub bytes: u64,
    pub pages: usize,
    pub total_pages: Option<usize>,
    pub cancel_requested: bool,
}

impl JobRecord {
    pub fn new(id: JobId, site: &str, chapter: &str, register_mark: bool, created: DateTime<Utc>) -> Self {
        Self {
            id,
            site: site.to_string(),
            chapter: chapter.to_string(),
            register_mark,
            state: JobState::Created,
            created,
            begin: None,
            file: None,
            bytes: 0,
            pages: 0,
            total_pages: None,
            cancel_requested: false,
        }
    }

    pub fn completion(&self) -> Option<f64> {
        if self.state == JobState::Complete {
            return Some(1.0);
        }
        match self.total_pages {
            Some(total) if total > 0 => Some((self.pages as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }

    pub fn snapshot(&self, end: Option<DateTime<Utc>>, error: Option<String>) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            site: self.site.clone(),
            chapter: self.chapter.clone(),
            file: self.file.clone(),
            status: self.state,
            completion: self.completion(),
            bytes: self.bytes,
            pages: self.pages,
            total_pages: self.total_pages,
            created: self.created,
            begin: self.begin,
            end,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_only() {
        assert!(JobState::Created.can_advance_to(JobState::Queued));
        assert!(JobState::Queued.can_advance_to(JobState::Cancelled));
        assert!(JobState::Processing.can_advance_to(JobState::Failed));
        assert!(!JobState::Saving.can_advance_to(JobState::Processing));
        assert!(!JobState::Queued.can_advance_to(JobState::Queued));
        assert!(!JobState::Complete.can_advance_to(JobState::Failed));
        assert!(!JobState::Cancelled.can_advance_to(JobState::Complete));
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_string(&JobState::Processing).unwrap(), "\"PROCESSING\"");
        let state: JobState = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(state, JobState::Cancelled);
    }

    #[test]
    fn test_completion() {
        let mut record = JobRecord::new(JobId::from("a"), "site", "c", false, Utc::now());
        assert_eq!(record.completion(), None);

        record.total_pages = Some(4);
        record.pages = 1;
        assert_eq!(record.completion(), Some(0.25));

        record.total_pages = None;
        record.state = JobState::Complete;
        assert_eq!(record.completion(), Some(1.0));
    }
}
