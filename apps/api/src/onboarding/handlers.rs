use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{get_profile, CandidateProfile, ProfileRow};
use crate::resume::extract::extract_text;
use crate::resume::sections::{extract_sections, ResumeSections};
use crate::state::AppState;

#[derive(Debug, Default)]
struct OnboardForm {
    name: String,
    target_company: String,
    job_role: String,
    job_description: String,
    programming_language: String,
    resume: Bytes,
    resume_filename: String,
    resume_content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnboardResponse {
    pub profile_id: Uuid,
    pub resume_key: String,
    /// Extracted sections echoed back so the client can show what the
    /// system prompt will be personalized with.
    pub sections: ResumeSections,
}

/// POST /api/v1/onboard (multipart)
///
/// Form fields plus the résumé file. Extraction, validation, the S3 upload
/// and the profile INSERT run in that order; any failure short-circuits
/// before the INSERT, so a failed onboarding leaves no partial record.
pub async fn handle_onboard(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OnboardResponse>, AppError> {
    let form = read_form(&mut multipart).await?;

    if form.resume.is_empty() {
        return Err(AppError::Validation("Resume file is required".to_string()));
    }

    let text = extract_text(&form.resume)?;
    let sections = extract_sections(&text);

    let profile = CandidateProfile::new(
        form.name,
        form.target_company,
        form.job_role,
        form.job_description,
        form.programming_language,
        sections.clone(),
    )?;

    let profile_id = Uuid::new_v4();
    let resume_key = format!("resumes/{}/{}", profile_id, form.resume_filename);

    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&resume_key)
        .body(ByteStream::from(form.resume.to_vec()))
        .content_type(
            form.resume_content_type
                .as_deref()
                .unwrap_or("application/octet-stream"),
        )
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("Resume upload failed: {e}")))?;

    info!("Uploaded resume to s3://{}/{}", state.config.s3_bucket, resume_key);

    sqlx::query(
        r#"
        INSERT INTO profiles
            (id, name, target_company, job_role, job_description,
             programming_language, experience, education, projects, resume_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(profile_id)
    .bind(&profile.name)
    .bind(&profile.target_company)
    .bind(&profile.job_role)
    .bind(&profile.job_description)
    .bind(&profile.programming_language)
    .bind(&profile.experience)
    .bind(&profile.education)
    .bind(&profile.projects)
    .bind(&resume_key)
    .execute(&state.db)
    .await?;

    info!("Created profile {profile_id} for {}", profile.name);

    Ok(Json(OnboardResponse {
        profile_id,
        resume_key,
        sections,
    }))
}

/// GET /api/v1/profiles/:id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileRow>, AppError> {
    Ok(Json(get_profile(&state.db, id).await?))
}

async fn read_form(multipart: &mut Multipart) -> Result<OnboardForm, AppError> {
    let mut form = OnboardForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("name") => form.name = text_field(field).await?,
            Some("target_company") => form.target_company = text_field(field).await?,
            Some("job_role") => form.job_role = text_field(field).await?,
            Some("job_description") => form.job_description = text_field(field).await?,
            Some("programming_language") => form.programming_language = text_field(field).await?,
            Some("resume") => {
                form.resume_filename = field
                    .file_name()
                    .unwrap_or("resume")
                    .to_string();
                form.resume_content_type = field.content_type().map(str::to_string);
                form.resume = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read resume: {e}")))?;
            }
            // Unknown fields are ignored rather than rejected.
            _ => {}
        }
    }

    Ok(form)
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form field: {e}")))
}
