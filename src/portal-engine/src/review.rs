//! Two-step decision workflow: persist the verdict, then notify the
//! applicant. The persisted decision is authoritative; notification is
//! best-effort and never rolls it back.

use crate::notify::{EvalNotice, Notifier};
use crate::sync::SubmissionSyncStore;
use db::repo::SubmissionsRepo;
use db::schema::{Decision, SubmissionId, SubmissionPatch};
use log::warn;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DecideError {
    #[error("submission {0} is not in the working set")]
    UnknownSubmission(SubmissionId),
    #[error("a decision for submission {0} is already being saved")]
    AlreadySaving(SubmissionId),
    #[error("failed to persist decision")]
    Persist(#[source] anyhow::Error),
}

/// `SavedNotNotified` must be surfaced distinctly: the decision is stored,
/// and retrying the whole operation would re-send the notification.
#[derive(Debug)]
#[must_use]
pub enum DecideOutcome {
    Saved,
    SavedNotNotified { cause: anyhow::Error },
}

pub struct ReviewWorkflow {
    subs: Arc<dyn SubmissionsRepo>,
    notifier: Arc<dyn Notifier>,
    persist_limit: Duration,
    in_flight: Mutex<HashSet<SubmissionId>>,
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<SubmissionId>>,
    id: SubmissionId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.id);
    }
}

impl ReviewWorkflow {
    pub fn new(
        subs: Arc<dyn SubmissionsRepo>,
        notifier: Arc<dyn Notifier>,
        persist_limit: Duration,
    ) -> ReviewWorkflow {
        ReviewWorkflow {
            subs,
            notifier,
            persist_limit,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Records a verdict for one submission.
    ///
    /// The feedback text is read from the caller's working set, not
    /// re-fetched: an in-flight draft edit must be the text this decision
    /// ships with. A second decision for the same id is rejected while one
    /// is being saved; decisions for distinct ids run independently.
    pub async fn decide(
        &self,
        store: &SubmissionSyncStore,
        id: SubmissionId,
        decision: Decision,
    ) -> Result<DecideOutcome, DecideError> {
        let current = store.get(id).ok_or(DecideError::UnknownSubmission(id))?;
        let feedback = current.feedback.clone().unwrap_or_default();

        if !self.in_flight.lock().unwrap().insert(id) {
            return Err(DecideError::AlreadySaving(id));
        }
        let _saving = InFlight {
            set: &self.in_flight,
            id,
        };

        let patch = SubmissionPatch {
            status: Some(decision),
            feedback: Some(feedback.clone()),
        };
        crate::with_deadline(
            self.persist_limit,
            "decision persist",
            self.subs.sub_update(id, patch),
        )
        .await
        .map_err(DecideError::Persist)?;

        let notice = EvalNotice {
            to_email: current.email.clone(),
            full_name: current.full_name.clone(),
            status: decision,
            feedback,
        };
        match self.notifier.send(notice).await {
            Ok(()) => Ok(DecideOutcome::Saved),
            Err(cause) => {
                warn!(
                    "decision for {} saved, but notification failed: {:#}",
                    id, cause
                );
                Ok(DecideOutcome::SavedNotNotified { cause })
            }
        }
    }
}
