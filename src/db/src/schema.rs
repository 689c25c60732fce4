use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = uuid::Uuid;
pub type SubmissionId = i64;

/// Per-user role binding. Set exactly once; this crate never reassigns it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Evaluator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Role::Developer => "developer",
            Role::Evaluator => "evaluator",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub role: Role,
    pub full_name: String,
}

pub struct NewProfile {
    pub id: UserId,
    pub role: Role,
    pub full_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub hobby: Option<String>,
    /// Object key in the uploads bucket (may be a legacy URL in old rows).
    pub profile_picture: Option<String>,
    pub zip_file: Option<String>,
    pub feedback: Option<String>,
    pub status: Option<Decision>,
    pub created_at: DateTime<Utc>,
}

pub struct NewSubmission {
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub hobby: Option<String>,
    pub profile_picture: Option<String>,
    pub zip_file: Option<String>,
}

#[derive(Default)]
pub struct SubmissionPatch {
    pub status: Option<Decision>,
    pub feedback: Option<String>,
}
