use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::resume::sections::ResumeSections;

/// Persisted onboarding record: form fields plus the résumé-derived spans
/// and the S3 key of the uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub name: String,
    pub target_company: String,
    pub job_role: String,
    pub job_description: String,
    pub programming_language: String,
    pub experience: String,
    pub education: String,
    pub projects: String,
    pub resume_key: String,
    pub created_at: DateTime<Utc>,
}

/// Validated candidate profile used to personalize the system prompt.
/// Built once at onboarding and read-only for the life of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: String,
    pub target_company: String,
    pub job_role: String,
    pub job_description: String,
    pub programming_language: String,
    pub experience: String,
    pub education: String,
    pub projects: String,
}

impl CandidateProfile {
    /// Builds a profile from form input plus extracted résumé sections,
    /// validating required fields up front rather than at point of use.
    pub fn new(
        name: String,
        target_company: String,
        job_role: String,
        job_description: String,
        programming_language: String,
        sections: ResumeSections,
    ) -> Result<Self, AppError> {
        for (field, value) in [
            ("name", &name),
            ("target_company", &target_company),
            ("job_role", &job_role),
            ("programming_language", &programming_language),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "Required profile field '{field}' is missing"
                )));
            }
        }

        Ok(Self {
            name,
            target_company,
            job_role,
            job_description,
            programming_language,
            experience: sections.experience,
            education: sections.education,
            projects: sections.projects,
        })
    }
}

/// Fetches a persisted profile by id.
pub async fn get_profile(pool: &sqlx::PgPool, id: Uuid) -> Result<ProfileRow, AppError> {
    let row: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| AppError::NotFound(format!("Profile {id} not found")))
}

impl From<ProfileRow> for CandidateProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            name: row.name,
            target_company: row.target_company,
            job_role: row.job_role,
            job_description: row.job_description,
            programming_language: row.programming_language,
            experience: row.experience,
            education: row.education,
            projects: row.projects,
        }
    }
}
