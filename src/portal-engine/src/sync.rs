//! The evaluator's working set of submissions: one bulk load fused with a
//! live change feed. No periodic re-fetch; the feed is the only source of
//! updates after the load.

use anyhow::Context as _;
use db::repo::{ChangeEvent, SubmissionsRepo, Subscription};
use db::schema::{Submission, SubmissionId};
use log::debug;

pub struct SubmissionSyncStore {
    items: Vec<Submission>,
    feed: Option<Subscription>,
}

impl SubmissionSyncStore {
    /// Subscribes, then bulk-loads the current rows newest-first.
    ///
    /// If the load fails the subscription is released and the error is
    /// returned; the set stays empty, never partially populated.
    pub async fn open(repo: &dyn SubmissionsRepo) -> anyhow::Result<SubmissionSyncStore> {
        let feed = repo
            .sub_watch()
            .await
            .context("change subscription failed")?;
        let items = match repo.sub_select(None, None).await {
            Ok(rows) => rows,
            Err(err) => {
                feed.cancel();
                return Err(err.context("initial load failed"));
            }
        };
        Ok(SubmissionSyncStore {
            items,
            feed: Some(feed),
        })
    }

    /// Current working set, newest first.
    pub fn records(&self) -> &[Submission] {
        &self.items
    }

    pub fn get(&self, id: SubmissionId) -> Option<&Submission> {
        self.items.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Applies one change event.
    ///
    /// An update for an id outside the working set is dropped: the row is
    /// outside the loaded window, so there is nothing to reconcile.
    pub fn apply(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Inserted(sub) => {
                // a row committed between subscribe and bulk load shows up
                // twice; the loaded copy wins
                if self.items.iter().any(|s| s.id == sub.id) {
                    debug!("dropping insert for already-loaded submission {}", sub.id);
                } else {
                    // events arrive in creation order, so the newcomer is newest
                    self.items.insert(0, sub);
                }
            }
            ChangeEvent::Updated(sub) => {
                match self.items.iter_mut().find(|s| s.id == sub.id) {
                    Some(slot) => *slot = sub,
                    None => debug!("dropping update for unknown submission {}", sub.id),
                }
            }
            ChangeEvent::Deleted(id) => {
                self.items.retain(|s| s.id != id);
            }
        }
    }

    /// Waits for the next event and applies it. `None` once the feed is
    /// gone (store closed, or the publisher shut down).
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        let feed = self.feed.as_mut()?;
        let event = feed.next_event().await?;
        self.apply(event.clone());
        Some(event)
    }

    /// Applies every already-delivered event; returns how many were applied.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let event = match self.feed.as_mut().and_then(|feed| feed.try_next()) {
                Some(event) => event,
                None => break,
            };
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Edits the feedback draft in the working copy only; it is persisted
    /// by the review workflow at decision time.
    pub fn set_feedback(&mut self, id: SubmissionId, text: &str) {
        if let Some(slot) = self.items.iter_mut().find(|s| s.id == id) {
            slot.feedback = Some(text.to_string());
        }
    }

    /// Releases the subscription. Idempotent; `Drop` calls it too, so the
    /// feed is torn down exactly once on every exit path.
    pub fn close(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.cancel();
        }
    }
}

impl Drop for SubmissionSyncStore {
    fn drop(&mut self) {
        self.close();
    }
}
