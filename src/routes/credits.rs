use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::db::credit_queries;
use crate::error::ApiError;
use crate::models::restoration::CreditsResponse;
use crate::services::auth::AuthUser;

/// GET /api/v1/credits — Current balance for the authenticated user.
pub async fn get_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let credits = credit_queries::get_credits(&state.db, user.user_id)
        .await?
        .unwrap_or(0);

    Ok(Json(CreditsResponse { credits }))
}
