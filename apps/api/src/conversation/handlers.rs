use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::composer::{ComposeError, PromptComposer};
use crate::conversation::segment::{segment, Segment};
use crate::conversation::store::Turn;
use crate::errors::AppError;
use crate::models::profile::{get_profile, CandidateProfile};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub profile_id: Uuid,
    /// Current value of the client's recognized-speech buffer.
    pub utterance: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub reply: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileIdQuery {
    pub profile_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub turns: Vec<Turn>,
}

/// POST /api/v1/conversation/generate
///
/// Runs one voice exchange. Replies 204 when the completion resolved after
/// the conversation was cleared (the result is dropped, not persisted), and
/// 409 when a generate is already in flight for this session.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, AppError> {
    let lock = state.locks.for_session(req.profile_id);
    let Ok(_guard) = lock.try_lock() else {
        return Err(AppError::Conflict(
            "A generation is already in flight for this conversation".to_string(),
        ));
    };

    let profile = CandidateProfile::from(get_profile(&state.db, req.profile_id).await?);

    let composer = PromptComposer::new(state.llm.clone(), state.conversations.clone());
    match composer
        .generate(req.profile_id, &req.utterance, &profile)
        .await
    {
        Ok(Some(reply)) => {
            let segments = segment(&reply);
            Ok(Json(GenerateResponse { reply, segments }).into_response())
        }
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(ComposeError::Validation(msg)) => Err(AppError::Validation(msg)),
        Err(ComposeError::Llm(e)) => Err(AppError::Llm(e)),
        Err(ComposeError::Store(e)) => Err(AppError::Store(e)),
    }
}

/// GET /api/v1/conversation?profile_id=
pub async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<ProfileIdQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let snapshot = state.conversations.load(params.profile_id).await?;
    Ok(Json(HistoryResponse {
        turns: snapshot.turns,
    }))
}

/// DELETE /api/v1/conversation?profile_id=
///
/// Clears the persisted history. Does not cancel an in-flight completion;
/// the epoch bump makes its eventual result stale instead.
pub async fn handle_clear(
    State(state): State<AppState>,
    Query(params): Query<ProfileIdQuery>,
) -> Result<StatusCode, AppError> {
    state.conversations.clear(params.profile_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
