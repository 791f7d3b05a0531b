use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

/// Longest warble, counted in characters.
pub const MAX_MESSAGE_LEN: usize = 140;

/// How many warbles the timeline and profile pages show.
pub const PAGE_SIZE: u32 = 100;

/// The logged-in user as seen by handlers and views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Danger,
}

impl FlashCategory {
    /// CSS class suffix used by the layout.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Danger => "danger",
        }
    }
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { category: FlashCategory::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { category: FlashCategory::Info, message: message.into() }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self { category: FlashCategory::Danger, message: message.into() }
    }
}
