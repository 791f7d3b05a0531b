use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use warbler_types::models::{CurrentUser, Flash};

use crate::session::{self, FLASH_COOKIE, SESSION_COOKIE};
use crate::state::{AppState, with_db};

/// Who is looking at the page, plus any pending flash notice.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Same viewer with a flash rendered in place rather than via cookie.
    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// Resolve the session cookie to a user and pick up the pending flash.
///
/// Inserts `Viewer` on every request and `CurrentUser` when logged in.
/// A session pointing at a deleted user, or carrying a bad token, is cleared.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let session_cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let claims = session_cookie
        .as_deref()
        .and_then(|token| session::decode_token(&state.secret_key, token));

    let user = match claims {
        Some(claims) => match with_db(&state, move |db| db.get_user_by_id(claims.sub)).await {
            Ok(row) => row.map(|u| CurrentUser {
                id: u.id,
                username: u.username,
                image_url: u.image_url,
            }),
            Err(e) => return e.into_response(),
        },
        None => None,
    };
    let stale_session = session_cookie.is_some() && user.is_none();
    if stale_session {
        debug!("dropping stale session cookie");
    }

    let flash_cookie = jar.get(FLASH_COOKIE).map(|c| c.value().to_string());
    let flash = flash_cookie.as_deref().and_then(session::decode_flash);

    if let Some(user) = &user {
        req.extensions_mut().insert(user.clone());
    }
    req.extensions_mut().insert(Viewer { user, flash });

    let response = next.run(req).await;

    let mut jar = jar;
    if flash_cookie.is_some()
        && !response.status().is_redirection()
        && !sets_cookie(&response, FLASH_COOKIE)
    {
        jar = session::clear_flash(jar);
    }
    if stale_session && !sets_cookie(&response, SESSION_COOKIE) {
        jar = session::log_out(jar);
    }

    (jar, response).into_response()
}

/// Gate for routes that need a logged-in user.
pub async fn require_auth(jar: CookieJar, req: Request, next: Next) -> Response {
    if req.extensions().get::<CurrentUser>().is_some() {
        return next.run(req).await;
    }

    warn!("Unauthorized {} {}", req.method(), req.uri().path());
    unauthorized(jar)
}

/// Bounce to the homepage with "Access unauthorized."
pub fn unauthorized(jar: CookieJar) -> Response {
    (
        session::set_flash(jar, &Flash::danger("Access unauthorized.")),
        Redirect::to("/"),
    )
        .into_response()
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split('=').next() == Some(name))
}
