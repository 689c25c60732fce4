//! Applicant-side operations: submit an application, read back the latest
//! one. Review fields are never touched here; everything else is
//! write-once per record.

use crate::identity::IdentityGateway;
use crate::storage::BlobStore;
use db::repo::SubmissionsRepo;
use db::schema::{NewSubmission, Submission, UserId};
use log::debug;

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("no authenticated user")]
    NoUser,
    #[error("both profile picture and source archive are required")]
    MissingArtifact,
    #[error("source archive must be a zip file")]
    NotZip,
    #[error("failed to upload {what}")]
    Upload {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to save submission")]
    Insert(#[source] anyhow::Error),
}

pub struct ArtifactUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct ApplicationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub hobby: Option<String>,
    pub profile_picture: Option<ArtifactUpload>,
    pub source_zip: Option<ArtifactUpload>,
}

/// Uploads both artifacts and inserts the submission row. Only bare object
/// keys are stored; links are reconstructed per view by the resolver.
pub async fn submit_application(
    identity: &dyn IdentityGateway,
    subs: &dyn SubmissionsRepo,
    blobs: &dyn BlobStore,
    form: ApplicationForm,
) -> Result<Submission, IntakeError> {
    let (pic, zip) = match (form.profile_picture, form.source_zip) {
        (Some(pic), Some(zip)) => (pic, zip),
        _ => return Err(IntakeError::MissingArtifact),
    };
    if !zip.file_name.to_lowercase().ends_with(".zip") {
        return Err(IntakeError::NotZip);
    }

    let user = identity
        .current_user()
        .await
        .ok()
        .flatten()
        .ok_or(IntakeError::NoUser)?;

    let stamp = chrono::Utc::now().timestamp_millis();
    let pic_ext = match pic.file_name.rsplit('.').next() {
        Some(ext) if !ext.is_empty() => ext,
        _ => "jpg",
    };
    let pic_key = format!("profile-pics/{}.{}", stamp, pic_ext);
    let zip_key = format!("source-zips/{}.zip", stamp);

    blobs
        .upload(&pic_key, pic.bytes, true)
        .await
        .map_err(|source| IntakeError::Upload {
            what: "profile picture",
            source,
        })?;
    blobs
        .upload(&zip_key, zip.bytes, true)
        .await
        .map_err(|source| IntakeError::Upload {
            what: "source archive",
            source,
        })?;

    let row = subs
        .sub_new(NewSubmission {
            user_id: user.id,
            full_name: form.full_name,
            email: form.email,
            phone: form.phone,
            location: form.location,
            hobby: form.hobby,
            profile_picture: Some(pic_key),
            zip_file: Some(zip_key),
        })
        .await
        .map_err(IntakeError::Insert)?;
    debug!("stored submission {} for {}", row.id, row.user_id);
    Ok(row)
}

/// The applicant-facing view surfaces only the newest record.
pub async fn latest_submission(
    subs: &dyn SubmissionsRepo,
    user_id: UserId,
) -> anyhow::Result<Option<Submission>> {
    let mut rows = subs.sub_select(Some(user_id), Some(1)).await?;
    Ok(rows.pop())
}
