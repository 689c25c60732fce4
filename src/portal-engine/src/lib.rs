//! Access-control and review-synchronization core of the internship
//! application portal.
//!
//! Durable rows live in an external table store (consumed through the `db`
//! crate's repo traits), sessions in an external identity provider, uploads
//! in a key-addressed blob store. This crate owns the logic in between:
//! role provisioning, route gating, the evaluator's live working set and
//! the two-step review decision.

pub mod artifacts;
pub mod config;
pub mod guard;
pub mod identity;
pub mod intake;
pub mod notify;
pub mod provision;
pub mod review;
pub mod storage;
pub mod sync;

use std::time::Duration;

/// Bounds an outbound call. An elapsed deadline surfaces as the caller's
/// ordinary failure mode rather than an unbounded "checking"/"saving" state.
pub(crate) async fn with_deadline<T>(
    limit: Duration,
    what: &'static str,
    fut: impl std::future::Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!("{} timed out after {:?}", what, limit)),
    }
}
