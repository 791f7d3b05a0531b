use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::{load_session, require_auth};
use crate::state::AppState;
use crate::{auth, home, messages, users};

/// Every application route, with session loading applied.
/// Static assets and HTTP tracing are layered on by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(home::homepage))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", get(users::index))
        .route("/users/{user_id}", get(users::show))
        .route("/messages/{message_id}", get(messages::show));

    let protected_routes = Router::new()
        .route("/users/{user_id}/following", get(users::following))
        .route("/users/{user_id}/followers", get(users::followers))
        .route("/users/{user_id}/likes", get(users::likes))
        .route("/users/follow/{user_id}", post(users::follow))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route("/users/profile", get(users::edit_profile_form).post(users::edit_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/messages/new", get(messages::new_form).post(messages::create))
        .route("/messages/{message_id}/delete", post(messages::delete))
        .route("/messages/{message_id}/like", post(messages::toggle_like))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(home::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .with_state(state)
}
