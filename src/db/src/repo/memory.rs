use super::{
    ChangeEvent, ProfilesRepo, Repo, SubmissionsRepo, Subscription, UniqueViolation,
};
use crate::schema::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::{
    convert::TryFrom,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;

#[derive(Default)]
struct Data {
    profiles: Vec<Profile>,
    // None if submission was deleted
    subs: Vec<Option<Submission>>,
    watchers: Vec<mpsc::UnboundedSender<ChangeEvent>>,
}

impl Data {
    // Called with the data lock held, so watchers observe commit order.
    fn publish(&mut self, event: ChangeEvent) {
        self.watchers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepo {
    conn: Arc<Mutex<Data>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemoryRepo").finish()
    }
}

#[async_trait]
impl ProfilesRepo for MemoryRepo {
    async fn profile_new(&self, data: NewProfile) -> Result<Profile> {
        let mut conn = self.conn.lock().unwrap();
        if conn.profiles.iter().any(|p| p.id == data.id) {
            return Err(anyhow::Error::new(UniqueViolation {
                table: "profiles",
                key: data.id.to_string(),
            }));
        }
        let profile = Profile {
            id: data.id,
            role: data.role,
            full_name: data.full_name,
        };
        conn.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn profile_try_load(&self, id: UserId) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.profiles.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl SubmissionsRepo for MemoryRepo {
    async fn sub_new(&self, data: NewSubmission) -> Result<Submission> {
        let mut conn = self.conn.lock().unwrap();
        let id = conn.subs.len() as SubmissionId;
        let sub = Submission {
            id,
            user_id: data.user_id,
            full_name: data.full_name,
            email: data.email,
            phone: data.phone,
            location: data.location,
            hobby: data.hobby,
            profile_picture: data.profile_picture,
            zip_file: data.zip_file,
            feedback: None,
            status: None,
            created_at: chrono::Utc::now(),
        };
        conn.subs.push(Some(sub.clone()));
        conn.publish(ChangeEvent::Inserted(sub.clone()));
        Ok(sub)
    }

    async fn sub_try_load(&self, id: SubmissionId) -> Result<Option<Submission>> {
        let conn = self.conn.lock().unwrap();
        let idx = id as usize;
        Ok(conn.subs.get(idx).cloned().unwrap_or(None))
    }

    async fn sub_update(&self, id: SubmissionId, patch: SubmissionPatch) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let idx = id as usize;
        let cur = match conn.subs.get_mut(idx) {
            Some(Some(x)) => x,
            None | Some(None) => bail!("sub_update@memory: unknown submission id"),
        };
        if let Some(new_status) = patch.status {
            cur.status = Some(new_status);
        }
        if let Some(new_feedback) = patch.feedback {
            cur.feedback = Some(new_feedback);
        }
        let updated = cur.clone();
        conn.publish(ChangeEvent::Updated(updated));
        Ok(())
    }

    async fn sub_delete(&self, id: SubmissionId) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let cur = match conn.subs.get_mut(id as usize) {
            Some(x) => x,
            None => bail!("sub_delete@memory: unknown submission id"),
        };
        if cur.take().is_some() {
            conn.publish(ChangeEvent::Deleted(id));
            Ok(())
        } else {
            bail!("sub_delete@memory: submission already deleted")
        }
    }

    async fn sub_select(
        &self,
        user_id: Option<UserId>,
        limit: Option<u32>,
    ) -> Result<Vec<Submission>> {
        let lim = limit
            .map(|x| usize::try_from(x).unwrap())
            .unwrap_or(usize::max_value());
        if lim == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();
        let mut rows: Vec<Submission> = conn
            .subs
            .iter()
            .filter_map(|x| x.clone())
            .filter(|sub| match user_id {
                Some(user_id) => user_id == sub.user_id,
                None => true,
            })
            .collect();
        // newest first; id breaks ties between same-instant inserts
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(lim);
        Ok(rows)
    }

    async fn sub_watch(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut conn = self.conn.lock().unwrap();
        conn.watchers.push(tx);
        Ok(Subscription::new(rx))
    }
}

impl Repo for MemoryRepo {}
