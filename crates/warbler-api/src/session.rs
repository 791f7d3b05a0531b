//! Session and flash cookies.
//!
//! The session cookie carries a signed JWT naming the logged-in user. Flash
//! notices ride in a second cookie until a page renders them.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use warbler_types::models::Flash;

pub const SESSION_COOKIE: &str = "warbler_session";
pub const FLASH_COOKIE: &str = "warbler_flash";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
}

pub fn create_token(secret: &str, user_id: i64, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// `None` for a forged, malformed or expired token.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

fn base_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn log_in(jar: CookieJar, token: String) -> CookieJar {
    jar.add(base_cookie(SESSION_COOKIE, token))
}

pub fn log_out(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub fn set_flash(jar: CookieJar, flash: &Flash) -> CookieJar {
    jar.add(base_cookie(FLASH_COOKIE, encode_flash(flash)))
}

pub fn clear_flash(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(FLASH_COOKIE).path("/"))
}

pub fn encode_flash(flash: &Flash) -> String {
    // Serializing a struct of strings cannot fail.
    let json = serde_json::to_vec(flash).unwrap_or_default();
    B64.encode(json)
}

pub fn decode_flash(value: &str) -> Option<Flash> {
    let bytes = B64.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}
