// This file is included in many tests, and some helpers are not used in all tests
#![allow(dead_code)]

use async_trait::async_trait;
use db::repo::{MemoryRepo, ProfilesRepo, SubmissionsRepo, Subscription};
use db::schema::{
    NewProfile, NewSubmission, Profile, Role, Submission, SubmissionId, SubmissionPatch, UserId,
};
use portal_engine::config::StoreConfig;
use portal_engine::guard::RouteGuard;
use portal_engine::identity::{AuthError, Identity, IdentityGateway, MemorySessions};
use portal_engine::notify::{EvalNotice, Notifier};
use portal_engine::provision::ProfileProvisioner;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LIMIT: Duration = Duration::from_secs(5);

pub struct Env {
    pub repo: Arc<MemoryRepo>,
    pub sessions: Arc<MemorySessions>,
}

impl Env {
    pub fn new() -> Env {
        simple_logger::SimpleLogger::new().init().ok();
        Env {
            repo: Arc::new(MemoryRepo::new()),
            sessions: Arc::new(MemorySessions::new()),
        }
    }

    /// Environment with an identity already in the session.
    pub fn signed_in(role_hint: Option<Role>) -> (Env, Identity) {
        let env = Env::new();
        let identity = Identity {
            id: UserId::new_v4(),
            email: "user@example.com".to_string(),
            role_hint,
        };
        env.sessions.force(identity.clone());
        (env, identity)
    }

    pub fn provisioner(&self) -> ProfileProvisioner {
        ProfileProvisioner::new(self.sessions.clone(), self.repo.clone(), LIMIT)
    }

    pub fn guard(&self) -> RouteGuard {
        RouteGuard::new(self.sessions.clone(), self.repo.clone(), LIMIT)
    }

    pub async fn seed_submission(&self, full_name: &str) -> Submission {
        self.repo
            .sub_new(new_submission(UserId::new_v4(), full_name))
            .await
            .unwrap()
    }
}

pub fn store_config() -> StoreConfig {
    StoreConfig {
        base_url: "https://portal.example.com".to_string(),
        bucket: "uploads".to_string(),
    }
}

pub fn new_submission(user_id: UserId, full_name: &str) -> NewSubmission {
    NewSubmission {
        user_id,
        full_name: full_name.to_string(),
        email: format!("{}@example.com", full_name),
        phone: "555-0100".to_string(),
        location: "Riga".to_string(),
        hobby: Some("chess".to_string()),
        profile_picture: Some("profile-pics/1.jpg".to_string()),
        zip_file: Some("source-zips/1.zip".to_string()),
    }
}

/// Identity gateway that must never be consulted.
pub struct PanickingIdentity;

#[async_trait]
impl IdentityGateway for PanickingIdentity {
    async fn current_user(&self) -> anyhow::Result<Option<Identity>> {
        panic!("identity must not be consulted here");
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<Identity, AuthError> {
        panic!("identity must not be consulted here");
    }

    async fn signup(
        &self,
        _email: &str,
        _password: &str,
        _role_hint: Option<Role>,
    ) -> Result<(), AuthError> {
        panic!("identity must not be consulted here");
    }

    async fn logout(&self) {
        panic!("identity must not be consulted here");
    }
}

/// Notifier double: records notices, optionally failing instead.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<EvalNotice>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: EvalNotice) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("notification relay down");
        }
        self.sent.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Notifier whose first send blocks until released, for exercising the
/// in-flight guard.
pub struct GatedNotifier {
    gate: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    pub sent: Mutex<Vec<EvalNotice>>,
}

impl GatedNotifier {
    pub fn new() -> (GatedNotifier, tokio::sync::oneshot::Sender<()>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let notifier = GatedNotifier {
            gate: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
        };
        (notifier, tx)
    }
}

#[async_trait]
impl Notifier for GatedNotifier {
    async fn send(&self, notice: EvalNotice) -> anyhow::Result<()> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.await.ok();
        }
        self.sent.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Submissions repo wrapper with switchable failure injection.
pub struct FlakySubs {
    pub inner: Arc<MemoryRepo>,
    pub fail_select: AtomicBool,
    pub fail_update: AtomicBool,
}

impl FlakySubs {
    pub fn new(inner: Arc<MemoryRepo>) -> FlakySubs {
        FlakySubs {
            inner,
            fail_select: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SubmissionsRepo for FlakySubs {
    async fn sub_new(&self, data: NewSubmission) -> anyhow::Result<Submission> {
        self.inner.sub_new(data).await
    }

    async fn sub_try_load(&self, id: SubmissionId) -> anyhow::Result<Option<Submission>> {
        self.inner.sub_try_load(id).await
    }

    async fn sub_update(&self, id: SubmissionId, patch: SubmissionPatch) -> anyhow::Result<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            anyhow::bail!("table store rejected the update");
        }
        self.inner.sub_update(id, patch).await
    }

    async fn sub_delete(&self, id: SubmissionId) -> anyhow::Result<()> {
        self.inner.sub_delete(id).await
    }

    async fn sub_select(
        &self,
        user_id: Option<UserId>,
        limit: Option<u32>,
    ) -> anyhow::Result<Vec<Submission>> {
        if self.fail_select.load(Ordering::SeqCst) {
            anyhow::bail!("table store unavailable");
        }
        self.inner.sub_select(user_id, limit).await
    }

    async fn sub_watch(&self) -> anyhow::Result<Subscription> {
        self.inner.sub_watch().await
    }
}

/// Profiles repo whose first read misses, reproducing the window where two
/// first logins race to insert.
pub struct RacyProfiles {
    pub inner: Arc<MemoryRepo>,
    hide_first_read: AtomicBool,
}

impl RacyProfiles {
    pub fn new(inner: Arc<MemoryRepo>) -> RacyProfiles {
        RacyProfiles {
            inner,
            hide_first_read: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ProfilesRepo for RacyProfiles {
    async fn profile_new(&self, data: NewProfile) -> anyhow::Result<Profile> {
        self.inner.profile_new(data).await
    }

    async fn profile_try_load(&self, id: UserId) -> anyhow::Result<Option<Profile>> {
        if self.hide_first_read.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.profile_try_load(id).await
    }
}
