//! Lazy, exactly-once provisioning of the per-user role record.

use crate::identity::IdentityGateway;
use db::repo::{is_unique_violation, ProfilesRepo};
use db::schema::{NewProfile, Role};
use log::{debug, warn};
use std::{sync::Arc, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("no authenticated user")]
    NoUser,
    #[error("no role selected and none attached to the identity")]
    MissingRole,
    #[error("failed to read profile")]
    Read(#[source] anyhow::Error),
    #[error("failed to insert profile")]
    Insert(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provisioned {
    pub created: bool,
    pub role: Role,
}

pub struct ProfileProvisioner {
    identity: Arc<dyn IdentityGateway>,
    profiles: Arc<dyn ProfilesRepo>,
    lookup_limit: Duration,
}

impl ProfileProvisioner {
    pub fn new(
        identity: Arc<dyn IdentityGateway>,
        profiles: Arc<dyn ProfilesRepo>,
        lookup_limit: Duration,
    ) -> ProfileProvisioner {
        ProfileProvisioner {
            identity,
            profiles,
            lookup_limit,
        }
    }

    /// Guarantees exactly one profile for the current user.
    ///
    /// An existing record always wins: the explicit choice and the signup
    /// hint only matter the first time, so calling this on every protected
    /// mount can never flip a role.
    pub async fn ensure_profile(&self, choice: Option<Role>) -> Result<Provisioned, ProvisionError> {
        let user = match crate::with_deadline(
            self.lookup_limit,
            "identity lookup",
            self.identity.current_user(),
        )
        .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return Err(ProvisionError::NoUser),
            Err(err) => {
                warn!("identity lookup failed during provisioning: {:#}", err);
                return Err(ProvisionError::NoUser);
            }
        };

        let existing = crate::with_deadline(
            self.lookup_limit,
            "profile read",
            self.profiles.profile_try_load(user.id),
        )
        .await
        .map_err(ProvisionError::Read)?;
        if let Some(profile) = existing {
            return Ok(Provisioned {
                created: false,
                role: profile.role,
            });
        }

        let role = match choice.or(user.role_hint) {
            Some(role) => role,
            None => return Err(ProvisionError::MissingRole),
        };

        let insert = self.profiles.profile_new(NewProfile {
            id: user.id,
            role,
            full_name: String::new(),
        });
        match crate::with_deadline(self.lookup_limit, "profile insert", insert).await {
            Ok(_) => {
                debug!("provisioned {} as {}", user.id, role);
                Ok(Provisioned {
                    created: true,
                    role,
                })
            }
            Err(err) if is_unique_violation(&err) => {
                // lost a first-login race; the winner's record is authoritative
                let profile = crate::with_deadline(
                    self.lookup_limit,
                    "profile re-read",
                    self.profiles.profile_try_load(user.id),
                )
                .await
                .map_err(ProvisionError::Read)?
                .ok_or_else(|| {
                    ProvisionError::Read(anyhow::anyhow!(
                        "profile missing again after duplicate-key insert"
                    ))
                })?;
                Ok(Provisioned {
                    created: false,
                    role: profile.role,
                })
            }
            Err(err) => Err(ProvisionError::Insert(err)),
        }
    }
}
