//! Facade over the external identity/session provider.
//!
//! The session is process-wide and read-only from the core's point of view:
//! components ask "who is signed in" and never mutate session state.

use async_trait::async_trait;
use db::schema::{Role, UserId};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    /// Role attached at signup time; provisioning falls back to it when the
    /// user has no profile yet.
    pub role_hint: Option<Role>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown user")]
    UnknownUser,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("email already registered")]
    EmailTaken,
    #[error("identity backend failure")]
    Backend(#[source] anyhow::Error),
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Who is signed in right now, if anyone.
    async fn current_user(&self) -> anyhow::Result<Option<Identity>>;
    async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    /// Registers credentials; the role hint becomes signup metadata.
    async fn signup(
        &self,
        email: &str,
        password: &str,
        role_hint: Option<Role>,
    ) -> Result<(), AuthError>;
    async fn logout(&self);
}

struct Account {
    id: UserId,
    email: String,
    password: String,
    role_hint: Option<Role>,
}

#[derive(Default)]
struct Accounts {
    users: Vec<Account>,
    current: Option<Identity>,
}

/// In-process session provider standing in for the hosted identity service
/// in tests and development. Credentials are held in plain text; do not use
/// outside of that.
#[derive(Clone, Default)]
pub struct MemorySessions {
    state: Arc<Mutex<Accounts>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts an identity into the session without a credentials check.
    pub fn force(&self, identity: Identity) {
        self.state.lock().unwrap().current = Some(identity);
    }
}

impl std::fmt::Debug for MemorySessions {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemorySessions").finish()
    }
}

#[async_trait]
impl IdentityGateway for MemorySessions {
    async fn current_user(&self) -> anyhow::Result<Option<Identity>> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let mut state = self.state.lock().unwrap();
        let identity = match state.users.iter().find(|a| a.email == email) {
            None => return Err(AuthError::UnknownUser),
            Some(account) => {
                if account.password != password {
                    return Err(AuthError::IncorrectPassword);
                }
                Identity {
                    id: account.id,
                    email: account.email.clone(),
                    role_hint: account.role_hint,
                }
            }
        };
        state.current = Some(identity.clone());
        Ok(identity)
    }

    async fn signup(
        &self,
        email: &str,
        password: &str,
        role_hint: Option<Role>,
    ) -> Result<(), AuthError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|a| a.email == email) {
            return Err(AuthError::EmailTaken);
        }
        state.users.push(Account {
            id: UserId::new_v4(),
            email: email.to_string(),
            password: password.to_string(),
            role_hint,
        });
        Ok(())
    }

    async fn logout(&self) {
        self.state.lock().unwrap().current = None;
    }
}
