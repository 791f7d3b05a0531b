use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use serde::Deserialize;
use tracing::{info, warn};

use warbler_db::DbError;
use warbler_db::models::{ProfileUpdate, UserRow, UserStats};
use warbler_types::forms::{EditProfileForm, FieldErrors};
use warbler_types::models::{CurrentUser, Flash, PAGE_SIZE};

use crate::auth::{authenticate, capitalize};
use crate::error::{AppError, IdPath};
use crate::middleware::Viewer;
use crate::session;
use crate::state::{AppState, with_db};
use crate::views::{self, ProfileView};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Profile owner, their stats, and whether the viewer follows them.
struct Profile {
    user: UserRow,
    stats: UserStats,
    viewer_follows: Option<bool>,
}

impl Profile {
    fn view(&self) -> ProfileView<'_> {
        ProfileView {
            user: &self.user,
            stats: &self.stats,
            viewer_follows: self.viewer_follows,
        }
    }
}

async fn load_profile(state: &AppState, user_id: i64, viewer_id: Option<i64>) -> Result<Profile, AppError> {
    with_db(state, move |db| {
        let Some(user) = db.get_user_by_id(user_id)? else {
            return Ok(None);
        };
        let stats = db.user_stats(user_id)?;
        let viewer_follows = match viewer_id {
            Some(me) if me != user_id => Some(db.is_following(me, user_id)?),
            _ => None,
        };
        Ok(Some(Profile { user, stats, viewer_follows }))
    })
    .await?
    .ok_or(AppError::NotFound)
}

/// GET /users: list everyone, or search by `?q=`.
pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let q = query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
    let search = q.clone();
    let users = with_db(&state, move |db| db.search_users(search.as_deref())).await?;
    Ok(views::users_index(&viewer, &users, q.as_deref()))
}

/// GET /users/{id}
pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let profile = load_profile(&state, user_id, viewer.user_id()).await?;
    let viewer_id = viewer.user_id();
    let (messages, liked) = with_db(&state, move |db| {
        let messages = db.messages_by_user(user_id, PAGE_SIZE)?;
        let liked = match viewer_id {
            Some(me) => db.liked_message_ids(me)?,
            None => Default::default(),
        };
        Ok((messages, liked))
    })
    .await?;

    Ok(views::user_profile(&viewer, &profile.view(), &messages, &liked))
}

pub async fn following(
    State(state): State<AppState>,
    viewer: Viewer,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let profile = load_profile(&state, user_id, viewer.user_id()).await?;
    let users = with_db(&state, move |db| db.following(user_id)).await?;
    Ok(views::follow_list(&viewer, &profile.view(), "Following", &users))
}

pub async fn followers(
    State(state): State<AppState>,
    viewer: Viewer,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let profile = load_profile(&state, user_id, viewer.user_id()).await?;
    let users = with_db(&state, move |db| db.followers(user_id)).await?;
    Ok(views::follow_list(&viewer, &profile.view(), "Followers", &users))
}

pub async fn likes(
    State(state): State<AppState>,
    viewer: Viewer,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let profile = load_profile(&state, user_id, Some(current.id)).await?;
    let me = current.id;
    let (messages, liked) = with_db(&state, move |db| {
        Ok((db.liked_messages(user_id, PAGE_SIZE)?, db.liked_message_ids(me)?))
    })
    .await?;
    Ok(views::likes(&viewer, &profile.view(), &messages, &liked))
}

/// POST /users/follow/{id}
pub async fn follow(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    WithRejection(Path(followed_id), _): IdPath,
) -> Result<Response, AppError> {
    if followed_id == current.id {
        warn!(user_id = current.id, "Attempted self-follow");
        let jar = session::set_flash(jar, &Flash::danger("You cannot follow yourself."));
        return Ok((jar, Redirect::to(&format!("/users/{}", current.id))).into_response());
    }

    let me = current.id;
    let found = with_db(&state, move |db| {
        if db.get_user_by_id(followed_id)?.is_none() {
            return Ok(false);
        }
        db.follow(me, followed_id)?;
        Ok(true)
    })
    .await?;
    if !found {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&format!("/users/{}/following", current.id)).into_response())
}

/// POST /users/stop-following/{id}
pub async fn stop_following(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Path(followed_id), _): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let me = current.id;
    with_db(&state, move |db| db.unfollow(me, followed_id)).await?;
    Ok(Redirect::to(&format!("/users/{}/following", current.id)))
}

/// GET /users/profile
pub async fn edit_profile_form(
    State(state): State<AppState>,
    viewer: Viewer,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let me = current.id;
    let user = with_db(&state, move |db| db.get_user_by_id(me))
        .await?
        .ok_or(AppError::NotFound)?;

    let form = EditProfileForm {
        username: user.username,
        email: user.email,
        image_url: user.image_url,
        header_image_url: user.header_image_url,
        bio: user.bio.unwrap_or_default(),
        location: user.location.unwrap_or_default(),
        password: String::new(),
    };
    Ok(views::edit_profile(&viewer, &form, &FieldErrors::new()))
}

/// POST /users/profile: requires the current password.
pub async fn edit_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, AppError> {
    let mut errors = form.validate();
    if !errors.is_empty() {
        return Ok(rerender(&viewer, &form, &errors));
    }

    if authenticate(&state, &current.username, &form.password).await?.is_none() {
        warn!(user_id = current.id, "Profile edit with wrong password");
        errors.add("password", "Wrong password, please try again.");
        return Ok(rerender(&viewer, &form, &errors));
    }

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    let image_url = form.image_url().map(str::to_string);
    let header_image_url = form.header_image_url().map(str::to_string);
    let bio = form.bio().map(str::to_string);
    let location = form.location().map(str::to_string);
    let me = current.id;
    let name = username.clone();

    let updated = with_db(&state, move |db| {
        db.update_profile(
            me,
            &ProfileUpdate {
                username: &name,
                email: &email,
                image_url: image_url.as_deref(),
                header_image_url: header_image_url.as_deref(),
                bio: bio.as_deref(),
                location: location.as_deref(),
            },
        )
    })
    .await;

    match updated {
        Ok(()) => {}
        Err(AppError::Db(DbError::Conflict(field))) => {
            errors.add(field, format!("{} already taken.", capitalize(field)));
            return Ok(rerender(&viewer, &form, &errors));
        }
        Err(e) => return Err(e),
    }

    info!(user_id = me, %username, "Profile updated");

    // The session names the user by id, so a rename keeps it valid.
    let jar = session::set_flash(jar, &Flash::success("Profile updated."));
    Ok((jar, Redirect::to(&format!("/users/{}", me))).into_response())
}

fn rerender(viewer: &Viewer, form: &EditProfileForm, errors: &FieldErrors) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, views::edit_profile(viewer, form, errors)).into_response()
}

/// POST /users/delete: removes the account and everything it owns.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let me = current.id;
    with_db(&state, move |db| db.delete_user(me)).await?;

    info!(user_id = me, username = %current.username, "User deleted");

    let jar = session::log_out(jar);
    let jar = session::set_flash(jar, &Flash::info("Your account has been deleted."));
    Ok((jar, Redirect::to("/signup")))
}
