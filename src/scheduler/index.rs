use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::{Result, SchedulerError};
use super::job::{JobId, JobRecord, JobSnapshot, JobState};

/// Collision retries before id allocation gives up
pub const MAX_ID_ATTEMPTS: u32 = 10;

const ID_BYTES: usize = 12;

/// Outcome of a cancellation request
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CancelOutcome {
    /// The job had not started and is now `CANCELLED`
    Finalized(JobSnapshot),
    /// The running worker will stop at its next page checkpoint
    Flagged,
    /// Saving, already flagged, or already finished
    Refused,
    Unknown,
}

/// Active jobs plus the history of finished ones
///
/// A job id lives in exactly one of the two maps.
#[derive(Debug, Default)]
pub struct JobIndex {
    active: HashMap<JobId, JobRecord>,
    history: HashMap<JobId, JobSnapshot>,
}

impl JobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `CREATED` job
    pub fn allocate(&mut self, site: &str, chapter: &str, register_mark: bool, created: DateTime<Utc>) -> Result<JobId> {
        let target = format!("{site}/{chapter}");

        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = derive_id(created, &target, attempt);
            if self.contains(&id) {
                debug!(%id, attempt, "Job id collision");
                continue;
            }
            self.active
                .insert(id.clone(), JobRecord::new(id.clone(), site, chapter, register_mark, created));
            return Ok(id);
        }

        Err(SchedulerError::IdExhausted {
            target,
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.active.contains_key(id) || self.history.contains_key(id)
    }

    pub fn is_active(&self, id: &JobId) -> bool {
        self.active.contains_key(id)
    }

    pub fn state_of(&self, id: &JobId) -> Option<JobState> {
        self.active
            .get(id)
            .map(|record| record.state)
            .or_else(|| self.history.get(id).map(|snapshot| snapshot.status))
    }

    /// Move an active job forward to a non-terminal state; returns whether it moved
    pub fn advance(&mut self, id: &JobId, next: JobState) -> bool {
        if next.is_terminal() {
            warn!(%id, state = %next, "Terminal states are reached through finalize");
            return false;
        }
        match self.active.get_mut(id) {
            Some(record) if record.state.can_advance_to(next) => {
                debug!(%id, from = %record.state, to = %next, "Job transition");
                record.state = next;
                true
            }
            Some(record) => {
                warn!(%id, from = %record.state, to = %next, "Rejected job transition");
                false
            }
            None => false,
        }
    }

    /// Enter `PROCESSING` once the archive file is known
    pub(crate) fn begin(&mut self, id: &JobId, file: String, now: DateTime<Utc>) -> bool {
        if !self.advance(id, JobState::Processing) {
            return false;
        }
        if let Some(record) = self.active.get_mut(id) {
            record.begin = Some(now);
            record.file = Some(file);
        }
        true
    }

    pub(crate) fn set_total_pages(&mut self, id: &JobId, total: usize) {
        if let Some(record) = self.active.get_mut(id) {
            record.total_pages = Some(total);
        }
    }

    /// Account one written page; returns true when the worker should stop
    pub(crate) fn record_page(&mut self, id: &JobId, bytes: u64) -> bool {
        match self.active.get_mut(id) {
            Some(record) => {
                record.pages += 1;
                record.bytes += bytes;
                record.cancel_requested
            }
            None => true,
        }
    }

    /// Enter `SAVING` unless a cancellation is pending
    pub(crate) fn begin_saving(&mut self, id: &JobId) -> bool {
        match self.active.get(id) {
            Some(record) if !record.cancel_requested => self.advance(id, JobState::Saving),
            _ => false,
        }
    }

    pub(crate) fn request_cancel(&mut self, id: &JobId, now: DateTime<Utc>) -> CancelOutcome {
        let Some((state, flagged)) = self
            .active
            .get(id)
            .map(|record| (record.state, record.cancel_requested))
        else {
            return if self.history.contains_key(id) {
                CancelOutcome::Refused
            } else {
                CancelOutcome::Unknown
            };
        };

        match state {
            JobState::Created | JobState::Queued => match self.finalize(id, JobState::Cancelled, None, now) {
                Some(snapshot) => CancelOutcome::Finalized(snapshot),
                None => CancelOutcome::Refused,
            },
            JobState::Processing if !flagged => {
                if let Some(record) = self.active.get_mut(id) {
                    record.cancel_requested = true;
                }
                CancelOutcome::Flagged
            }
            _ => CancelOutcome::Refused,
        }
    }

    /// Move an active job into history in a terminal state
    ///
    /// Returns `None` when the job is not active, for instance because it
    /// was already finalized.
    pub fn finalize(
        &mut self,
        id: &JobId,
        state: JobState,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<JobSnapshot> {
        if !state.is_terminal() {
            warn!(%id, %state, "Finalize requires a terminal state");
            return None;
        }

        let Some(mut record) = self.active.remove(id) else {
            if let Some(previous) = self.history.get(id) {
                warn!(%id, previous = %previous.status, requested = %state, "Job already finalized");
            }
            return None;
        };

        record.state = state;
        let snapshot = record.snapshot(Some(now), error);
        self.history.insert(id.clone(), snapshot.clone());
        Some(snapshot)
    }

    pub(crate) fn register_mark(&self, id: &JobId) -> bool {
        self.active.get(id).is_some_and(|record| record.register_mark)
    }

    pub fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.active
            .get(id)
            .map(|record| record.snapshot(None, None))
            .or_else(|| self.history.get(id).cloned())
    }

    /// All known jobs, oldest first
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let mut all: Vec<JobSnapshot> = self
            .active
            .values()
            .map(|record| record.snapshot(None, None))
            .chain(self.history.values().cloned())
            .collect();
        all.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forget finished jobs; returns how many were dropped
    pub fn clear_history(&mut self) -> usize {
        let cleared = self.history.len();
        self.history.clear();
        cleared
    }
}

fn derive_id(created: DateTime<Utc>, target: &str, attempt: u32) -> JobId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&created.timestamp_micros().to_le_bytes());
    hasher.update(target.as_bytes());
    hasher.update(&attempt.to_le_bytes());
    let hash = hasher.finalize();
    JobId::from(URL_SAFE_NO_PAD.encode(&hash.as_bytes()[..ID_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(index: &mut JobIndex, chapter: &str) -> JobId {
        let id = index.allocate("site", chapter, false, Utc::now()).unwrap();
        assert!(index.advance(&id, JobState::Queued));
        id
    }

    #[test]
    fn test_ids_are_distinct_for_same_target() {
        let mut index = JobIndex::new();
        let now = Utc::now();
        let a = index.allocate("site", "c1", false, now).unwrap();
        let b = index.allocate("site", "c1", false, now).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert_eq!(index.state_of(&a), Some(JobState::Created));
    }

    #[test]
    fn test_id_exhaustion() {
        let mut index = JobIndex::new();
        let now = Utc::now();
        for _ in 0..MAX_ID_ATTEMPTS {
            index.allocate("site", "c1", false, now).unwrap();
        }
        let err = index.allocate("site", "c1", false, now).unwrap_err();
        assert!(matches!(err, SchedulerError::IdExhausted { attempts: MAX_ID_ATTEMPTS, .. }));

        // another target still fits
        assert!(index.allocate("site", "c2", false, now).is_ok());
    }

    #[test]
    fn test_no_backward_transition() {
        let mut index = JobIndex::new();
        let id = queued(&mut index, "c1");
        assert!(index.begin(&id, "file.cbz".into(), Utc::now()));
        assert!(!index.advance(&id, JobState::Queued));
        assert!(index.begin_saving(&id));
        assert!(!index.begin(&id, "file.cbz".into(), Utc::now()));
        assert_eq!(index.state_of(&id), Some(JobState::Saving));
    }

    #[test]
    fn test_finalize_once() {
        let mut index = JobIndex::new();
        let id = queued(&mut index, "c1");

        let snapshot = index.finalize(&id, JobState::Failed, Some("boom".into()), Utc::now()).unwrap();
        assert_eq!(snapshot.status, JobState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
        assert!(snapshot.end.is_some());

        assert!(index.finalize(&id, JobState::Complete, None, Utc::now()).is_none());
        assert_eq!(index.state_of(&id), Some(JobState::Failed));
        assert_eq!(index.active_len(), 0);
        assert_eq!(index.history_len(), 1);
    }

    #[test]
    fn test_cancel_outcomes() {
        let mut index = JobIndex::new();
        let waiting = queued(&mut index, "c1");
        let running = queued(&mut index, "c2");
        index.begin(&running, "c2.cbz".into(), Utc::now());

        assert!(matches!(
            index.request_cancel(&waiting, Utc::now()),
            CancelOutcome::Finalized(ref s) if s.status == JobState::Cancelled
        ));
        assert_eq!(index.request_cancel(&waiting, Utc::now()), CancelOutcome::Refused);

        assert_eq!(index.request_cancel(&running, Utc::now()), CancelOutcome::Flagged);
        assert_eq!(index.request_cancel(&running, Utc::now()), CancelOutcome::Refused);
        assert!(index.record_page(&running, 10));
        assert!(!index.begin_saving(&running));

        assert_eq!(index.request_cancel(&JobId::from("nope"), Utc::now()), CancelOutcome::Unknown);
    }

    #[test]
    fn test_saving_is_not_cancellable() {
        let mut index = JobIndex::new();
        let id = queued(&mut index, "c1");
        index.begin(&id, "c1.cbz".into(), Utc::now());
        assert!(index.begin_saving(&id));
        assert_eq!(index.request_cancel(&id, Utc::now()), CancelOutcome::Refused);
    }

    #[test]
    fn test_progress_and_snapshots() {
        let mut index = JobIndex::new();
        let id = queued(&mut index, "c1");
        index.begin(&id, "c1.cbz".into(), Utc::now());
        index.set_total_pages(&id, 2);
        assert!(!index.record_page(&id, 100));

        let snapshot = index.snapshot(&id).unwrap();
        assert_eq!(snapshot.completion, Some(0.5));
        assert_eq!(snapshot.bytes, 100);
        assert_eq!(snapshot.file.as_deref(), Some("c1.cbz"));
        assert!(snapshot.begin.is_some());

        let other = queued(&mut index, "c2");
        index.finalize(&other, JobState::Cancelled, None, Utc::now());
        assert_eq!(index.snapshots().len(), 2);

        assert_eq!(index.clear_history(), 1);
        assert!(index.snapshot(&other).is_none());
        assert!(index.snapshot(&id).is_some());
    }
}
