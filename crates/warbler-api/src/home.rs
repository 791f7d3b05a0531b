use axum::{
    extract::State,
    response::{IntoResponse, Response},
};

use warbler_types::models::PAGE_SIZE;

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::state::{AppState, with_db};
use crate::views;

/// GET /: landing page for visitors, timeline for logged-in users.
pub async fn homepage(State(state): State<AppState>, viewer: Viewer) -> Result<Response, AppError> {
    let Some(me) = viewer.user_id() else {
        return Ok(views::home_anon(&viewer).into_response());
    };

    let (user, stats, messages, liked) = with_db(&state, move |db| {
        let Some(user) = db.get_user_by_id(me)? else {
            return Ok(None);
        };
        Ok(Some((
            user,
            db.user_stats(me)?,
            db.timeline(me, PAGE_SIZE)?,
            db.liked_message_ids(me)?,
        )))
    })
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(views::home(&viewer, &user, &stats, &messages, &liked).into_response())
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    AppError::NotFound
}
