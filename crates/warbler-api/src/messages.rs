use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use tracing::{info, warn};

use warbler_types::forms::{FieldErrors, MessageForm};
use warbler_types::models::{CurrentUser, Flash};

use crate::error::{AppError, IdPath};
use crate::middleware::{Viewer, unauthorized};
use crate::session;
use crate::state::{AppState, with_db};
use crate::views;

/// GET /messages/new
pub async fn new_form(viewer: Viewer) -> impl IntoResponse {
    views::new_message(&viewer, &MessageForm::default(), &FieldErrors::new())
}

/// POST /messages/new
pub async fn create(
    State(state): State<AppState>,
    viewer: Viewer,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, views::new_message(&viewer, &form, &errors)).into_response());
    }

    let me = current.id;
    let text = form.text.trim().to_string();
    let message_id = with_db(&state, move |db| db.insert_message(me, &text)).await?;

    info!(user_id = me, message_id, "Message posted");
    Ok(Redirect::to(&format!("/users/{}", me)).into_response())
}

/// GET /messages/{id}
pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    WithRejection(Path(message_id), _): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = viewer.user_id();
    let (message, like_count, liked) = with_db(&state, move |db| {
        let Some(message) = db.get_message(message_id)? else {
            return Ok(None);
        };
        let like_count = db.like_count(message_id)?;
        let liked = match viewer_id {
            Some(me) => db.liked_message_ids(me)?.contains(&message_id),
            None => false,
        };
        Ok(Some((message, like_count, liked)))
    })
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(views::message_show(&viewer, &message, like_count, liked))
}

/// POST /messages/{id}/delete: only the author may delete.
pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    WithRejection(Path(message_id), _): IdPath,
) -> Result<Response, AppError> {
    let message = with_db(&state, move |db| db.get_message(message_id))
        .await?
        .ok_or(AppError::NotFound)?;

    if message.user_id != current.id {
        warn!(user_id = current.id, message_id, "Delete of someone else's message");
        return Ok(unauthorized(jar));
    }

    with_db(&state, move |db| db.delete_message(message_id)).await?;

    info!(user_id = current.id, message_id, "Message deleted");
    Ok(Redirect::to(&format!("/users/{}", current.id)).into_response())
}

/// POST /messages/{id}/like: like if not yet liked, otherwise unlike.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    WithRejection(Path(message_id), _): IdPath,
) -> Result<Response, AppError> {
    let message = with_db(&state, move |db| db.get_message(message_id))
        .await?
        .ok_or(AppError::NotFound)?;

    if message.user_id == current.id {
        let jar = session::set_flash(jar, &Flash::danger("You cannot like your own warble."));
        return Ok((jar, Redirect::to("/")).into_response());
    }

    let me = current.id;
    let added = with_db(&state, move |db| db.toggle_like(me, message_id)).await?;
    info!(user_id = me, message_id, added, "Like toggled");

    Ok(Redirect::to("/").into_response())
}
