use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use rand_core::OsRng;
use tracing::{info, warn};

use warbler_db::DbError;
use warbler_db::models::{NewUser, UserRow};
use warbler_types::forms::{FieldErrors, LoginForm, SignupForm};
use warbler_types::models::Flash;

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::session;
use crate::state::{AppState, with_db};
use crate::views;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(AppError::internal)?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Look the user up by name and check the password.
/// Returns `None` for an unknown user or a wrong password alike.
pub async fn authenticate(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<Option<UserRow>, AppError> {
    let name = username.to_string();
    let user = with_db(state, move |db| db.get_user_by_username(&name)).await?;
    Ok(user.filter(|u| verify_password(password, &u.password)))
}

fn start_session(state: &AppState, jar: CookieJar, user_id: i64) -> Result<CookieJar, AppError> {
    let token = session::create_token(&state.secret_key, user_id, state.session_ttl)
        .map_err(AppError::internal)?;
    Ok(session::log_in(jar, token))
}

pub async fn signup_form(viewer: Viewer) -> impl IntoResponse {
    views::signup(&viewer, &SignupForm::default(), &FieldErrors::new())
}

pub async fn signup(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let mut errors = form.validate();
    if !errors.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, views::signup(&viewer, &form, &errors)).into_response());
    }

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();

    // Check if username/email are taken
    let (name, mail) = (username.clone(), email.clone());
    let (by_name, by_email) = with_db(&state, move |db| {
        Ok((db.get_user_by_username(&name)?, db.get_user_by_email(&mail)?))
    })
    .await?;
    if by_name.is_some() {
        errors.add("username", "Username already taken.");
    }
    if by_email.is_some() {
        errors.add("email", "Email already taken.");
    }
    if !errors.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, views::signup(&viewer, &form, &errors)).into_response());
    }

    let password_hash = hash_password(&form.password)?;
    let image_url = form.image_url().map(str::to_string);
    let (name, mail) = (username.clone(), email);
    let created = with_db(&state, move |db| {
        db.create_user(&NewUser {
            username: &name,
            email: &mail,
            password_hash: &password_hash,
            image_url: image_url.as_deref(),
        })
    })
    .await;

    let user_id = match created {
        Ok(id) => id,
        // Lost a race with a concurrent signup
        Err(AppError::Db(DbError::Conflict(field))) => {
            errors.add(field, format!("{} already taken.", capitalize(field)));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, views::signup(&viewer, &form, &errors)).into_response());
        }
        Err(e) => return Err(e),
    };

    info!(user_id, %username, "User signed up");

    let jar = start_session(&state, jar, user_id)?;
    let jar = session::set_flash(jar, &Flash::success(format!("Welcome to Warbler, {}!", username)));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn login_form(viewer: Viewer) -> impl IntoResponse {
    views::login(&viewer, &LoginForm::default(), &FieldErrors::new())
}

pub async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, views::login(&viewer, &form, &errors)).into_response());
    }

    let Some(user) = authenticate(&state, form.username.trim(), &form.password).await? else {
        warn!(username = %form.username, "Failed login");
        let viewer = viewer.with_flash(Flash::danger("Invalid credentials."));
        return Ok((StatusCode::UNAUTHORIZED, views::login(&viewer, &form, &errors)).into_response());
    };

    info!(user_id = user.id, username = %user.username, "User logged in");

    let jar = start_session(&state, jar, user.id)?;
    let jar = session::set_flash(jar, &Flash::success(format!("Hello, {}!", user.username)));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn logout(viewer: Viewer, jar: CookieJar) -> impl IntoResponse {
    if let Some(user) = &viewer.user {
        info!(user_id = user.id, "User logged out");
    }
    let jar = session::log_out(jar);
    let jar = session::set_flash(jar, &Flash::success("You have successfully logged out."));
    (jar, Redirect::to("/login"))
}

pub(crate) fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("password").unwrap();
        assert_ne!(hash, "password");
        assert!(verify_password("password", &hash));
        assert!(!verify_password("password100", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("password", "HASHED_PASSWORD"));
    }

    #[test]
    fn capitalize_field_names() {
        assert_eq!(capitalize("email"), "Email");
        assert_eq!(capitalize(""), "");
    }
}
