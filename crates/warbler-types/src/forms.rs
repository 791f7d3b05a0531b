//! Incoming form bodies and their validation rules.
//!
//! Every field is `#[serde(default)]` so a missing field reaches `validate()`
//! and becomes a field error instead of an extractor rejection.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::models::MAX_MESSAGE_LEN;

pub const MAX_USERNAME_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern compiles")
});

/// Field name -> messages, rendered next to the matching input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
        false
    } else {
        true
    }
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    if require(errors, "username", username) && username.trim().chars().count() > MAX_USERNAME_LEN {
        errors.add(
            "username",
            format!("Username must be at most {} characters.", MAX_USERNAME_LEN),
        );
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if require(errors, "email", email) && !EMAIL_RE.is_match(email.trim()) {
        errors.add("email", "Invalid email address.");
    }
}

fn check_password_length(errors: &mut FieldErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters.", MIN_PASSWORD_LEN),
        );
    }
}

/// Treats blank optional inputs as absent.
fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
}

impl SignupForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_username(&mut errors, &self.username);
        check_email(&mut errors, &self.email);
        check_password_length(&mut errors, &self.password);
        errors
    }

    pub fn image_url(&self) -> Option<&str> {
        non_blank(&self.image_url)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "username", &self.username);
        check_password_length(&mut errors, &self.password);
        errors
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct MessageForm {
    pub text: String,
}

impl MessageForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if !require(&mut errors, "text", &self.text) {
            return errors;
        }
        let text = self.text.trim();
        if text.chars().count() > MAX_MESSAGE_LEN {
            errors.add(
                "text",
                format!("Warbles are limited to {} characters.", MAX_MESSAGE_LEN),
            );
        }
        // SQLite's length() stops at NUL, so such text would fail the table CHECK.
        if text.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t')) {
            errors.add("text", "Warbles cannot contain control characters.");
        }
        errors
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EditProfileForm {
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub location: String,
    pub password: String,
}

impl EditProfileForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_username(&mut errors, &self.username);
        check_email(&mut errors, &self.email);
        require(&mut errors, "password", &self.password);
        errors
    }

    pub fn image_url(&self) -> Option<&str> {
        non_blank(&self.image_url)
    }

    pub fn header_image_url(&self) -> Option<&str> {
        non_blank(&self.header_image_url)
    }

    pub fn bio(&self) -> Option<&str> {
        non_blank(&self.bio)
    }

    pub fn location(&self) -> Option<&str> {
        non_blank(&self.location)
    }
}
