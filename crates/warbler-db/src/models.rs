/// Database row types. These map directly to SQLite rows and stay
/// independent of the form types in warbler-types.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

/// A message joined with its author.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    pub user_id: i64,
    pub username: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    /// `None` keeps the column default.
    pub image_url: Option<&'a str>,
}

/// Profile edit. `None` image fields reset to the defaults.
pub struct ProfileUpdate<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub image_url: Option<&'a str>,
    pub header_image_url: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
}
