mod memory;

pub use memory::MemoryRepo;

use crate::schema::*;
use anyhow::{bail, Result};
use async_trait::async_trait;

/// Insert hit a uniqueness constraint in the backing table.
#[derive(Debug, thiserror::Error)]
#[error("unique constraint violated: {table}/{key}")]
pub struct UniqueViolation {
    pub table: &'static str,
    pub key: String,
}

pub fn is_unique_violation(err: &crate::Error) -> bool {
    err.downcast_ref::<UniqueViolation>().is_some()
}

/// Insert/update/delete notification for one submissions row, delivered
/// over a live subscription in commit order.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Inserted(Submission),
    Updated(Submission),
    Deleted(SubmissionId),
}

/// Receiving half of a change subscription.
///
/// Dropping (or `cancel`ing) the subscription unsubscribes; the repo prunes
/// the sending half on its next publish.
pub struct Subscription {
    rx: tokio::sync::mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    fn new(rx: tokio::sync::mpsc::UnboundedReceiver<ChangeEvent>) -> Subscription {
        Subscription { rx }
    }

    /// Waits for the next event. `None` means the publisher went away.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Returns an already-delivered event, if any.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Unsubscribes. Consumes self, so release happens exactly once.
    pub fn cancel(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

#[async_trait]
pub trait ProfilesRepo: Send + Sync {
    /// Fails with [`UniqueViolation`] if a profile for this user id exists.
    async fn profile_new(&self, data: NewProfile) -> Result<Profile>;
    async fn profile_try_load(&self, id: UserId) -> Result<Option<Profile>>;
}

#[async_trait]
pub trait SubmissionsRepo: Send + Sync {
    async fn sub_new(&self, data: NewSubmission) -> Result<Submission>;
    async fn sub_try_load(&self, id: SubmissionId) -> Result<Option<Submission>>;
    async fn sub_load(&self, id: SubmissionId) -> Result<Submission> {
        match self.sub_try_load(id).await? {
            Some(sub) => Ok(sub),
            None => bail!("sub_load: unknown submission id"),
        }
    }
    async fn sub_update(&self, id: SubmissionId, patch: SubmissionPatch) -> Result<()>;
    async fn sub_delete(&self, id: SubmissionId) -> Result<()>;
    /// Rows ordered by creation time, newest first.
    async fn sub_select(
        &self,
        user_id: Option<UserId>,
        limit: Option<u32>,
    ) -> Result<Vec<Submission>>;
    /// Opens a live change feed over the submissions table. The feed carries
    /// every mutation committed after this call, in commit order, until the
    /// subscription is cancelled.
    async fn sub_watch(&self) -> Result<Subscription>;
}

pub trait Repo: ProfilesRepo + SubmissionsRepo {}
