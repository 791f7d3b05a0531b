#![allow(dead_code)]

use std::collections::BTreeMap;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use axum_extra::extract::cookie::Cookie;
use tower::util::ServiceExt; // for `oneshot`

use warbler_api::auth::hash_password;
use warbler_api::session::{self, SESSION_COOKIE};
use warbler_api::{AppState, AppStateInner};
use warbler_db::Database;
use warbler_db::models::NewUser;

pub const SECRET: &str = "test-secret";

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Router plus a cookie jar, so a test can act like a browser.
pub struct TestClient {
    pub app: Router,
    pub state: AppState,
    cookies: BTreeMap<String, String>,
}

impl TestClient {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, SECRET, chrono::Duration::days(1));
        Self {
            app: warbler_api::router(state.clone()),
            state,
            cookies: BTreeMap::new(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Create a user directly in the store, bypassing the signup form.
    pub fn create_user(&self, username: &str, password: &str) -> i64 {
        let hash = hash_password(password).unwrap();
        self.db()
            .create_user(&NewUser {
                username,
                email: &format!("{username}@test.com"),
                password_hash: &hash,
                image_url: None,
            })
            .unwrap()
    }

    /// Put a valid session cookie in the jar for `user_id`.
    pub fn log_in_as(&mut self, user_id: i64) {
        let token = session::create_token(SECRET, user_id, chrono::Duration::days(1)).unwrap();
        self.cookies.insert(SESSION_COOKIE.to_string(), token);
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::builder().method("GET").uri(uri);
        self.send(request, Body::empty()).await
    }

    pub async fn post(&mut self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(encode_form(form))).await
    }

    /// GET the redirect target, the way a browser would.
    pub async fn follow(&mut self, response: &TestResponse) -> TestResponse {
        assert!(
            response.status.is_redirection(),
            "expected a redirect, got {}",
            response.status
        );
        let location = response.location.clone().expect("redirect without location");
        self.get(&location).await
    }

    async fn send(&mut self, mut request: axum::http::request::Builder, body: Body) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(header::COOKIE, cookie);
        }

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(set_cookie.to_str().unwrap().to_string()).unwrap();
            let expired = cookie.max_age().is_some_and(|age| age.is_zero());
            if expired || cookie.value().is_empty() {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}

fn encode_form(form: &[(&str, &str)]) -> String {
    form.iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Count `<li class="stat">` entries and return their numbers in order.
pub fn stats(body: &str) -> Vec<i64> {
    body.split(r#"<li class="stat">"#)
        .skip(1)
        .map(|chunk| {
            let end = chunk.find("</li>").unwrap();
            let item = &chunk[..end];
            let close = item.rfind("</a>").unwrap();
            let open = item[..close].rfind('>').unwrap();
            item[open + 1..close].parse().unwrap()
        })
        .collect()
}
