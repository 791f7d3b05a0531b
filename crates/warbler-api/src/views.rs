//! Server-side HTML.
//!
//! Pages are plain `format!` output wrapped in one shared layout. Every value
//! that came from a user goes through `escape` first.

use std::collections::HashSet;
use std::fmt::Write;

use axum::response::Html;

use warbler_db::models::{MessageRow, UserRow, UserStats};
use warbler_types::forms::{EditProfileForm, FieldErrors, LoginForm, MessageForm, SignupForm};
use warbler_types::models::{CurrentUser, Flash, MAX_MESSAGE_LEN};

use crate::middleware::Viewer;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// "2024-03-01T12:00:00.000000Z" -> "01 March 2024". Unparseable input is shown as-is.
pub fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%d %B %Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn layout(title: &str, viewer: &Viewer, body: &str) -> Html<String> {
    let nav = nav_links(viewer);
    let flash = viewer
        .flash
        .as_ref()
        .map(render_flash)
        .unwrap_or_default();
    page(title, &nav, &flash, body)
}

fn nav_links(viewer: &Viewer) -> String {
    match &viewer.user {
        Some(user) => format!(
            r#"<li><form class="navbar-search" action="/users"><input name="q" placeholder="Search Warbler"><button>Search</button></form></li>
      <li><a href="/users/{id}"><img class="nav-avatar" src="{img}" alt="{name}"></a></li>
      <li><a href="/messages/new">New Message</a></li>
      <li><form method="POST" action="/logout"><button class="btn-link">Log out</button></form></li>"#,
            id = user.id,
            img = escape(&user.image_url),
            name = escape(&user.username),
        ),
        None => r#"<li><a href="/signup">Sign up</a></li>
      <li><a href="/login">Log in</a></li>"#
            .to_string(),
    }
}

fn page(title: &str, nav: &str, flash: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title} | Warbler</title>
  <link rel="stylesheet" href="/static/stylesheets/style.css">
</head>
<body>
  <nav class="navbar">
    <a href="/" class="navbar-brand"><span>Warbler</span></a>
    <ul class="nav">
      {nav}
    </ul>
  </nav>
  <div class="container">
    {flash}
    {body}
  </div>
</body>
</html>
"#,
        title = escape(title),
    ))
}

fn render_flash(flash: &Flash) -> String {
    format!(
        r#"<div class="alert alert-{}">{}</div>"#,
        flash.category.as_str(),
        escape(&flash.message)
    )
}

// -- Form helpers --

fn field_errors(errors: &FieldErrors, name: &str) -> String {
    errors
        .get(name)
        .iter()
        .map(|msg| format!(r#"<span class="form-error">{}</span>"#, escape(msg)))
        .collect()
}

fn input(kind: &str, name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<div class="form-group">
      <label for="{name}">{label}</label>
      <input type="{kind}" id="{name}" name="{name}" value="{value}">
      {errs}
    </div>"#,
        value = escape(value),
        errs = field_errors(errors, name),
    )
}

fn textarea(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<div class="form-group">
      <label for="{name}">{label}</label>
      <textarea id="{name}" name="{name}">{value}</textarea>
      {errs}
    </div>"#,
        value = escape(value),
        errs = field_errors(errors, name),
    )
}

// -- Pages --

pub fn home_anon(viewer: &Viewer) -> Html<String> {
    layout(
        "Home",
        viewer,
        r#"<div class="home-hero">
      <h1>What's Happening?</h1>
      <h4>New to Warbler?</h4>
      <a href="/signup" class="btn btn-primary">Sign up now</a>
    </div>"#,
    )
}

pub fn home(
    viewer: &Viewer,
    user: &UserRow,
    stats: &UserStats,
    messages: &[MessageRow],
    liked: &HashSet<i64>,
) -> Html<String> {
    let body = format!(
        r#"<div class="row">
      <aside class="user-card">
        <a href="/users/{id}"><img src="{img}" alt="{name}" class="card-image"></a>
        <p><a href="/users/{id}">@{name}</a></p>
        <ul class="user-stats">
          <li>Messages <a href="/users/{id}">{messages}</a></li>
          <li>Following <a href="/users/{id}/following">{following}</a></li>
          <li>Followers <a href="/users/{id}/followers">{followers}</a></li>
        </ul>
      </aside>
      {list}
    </div>"#,
        id = user.id,
        img = escape(&user.image_url),
        name = escape(&user.username),
        messages = stats.messages,
        following = stats.following,
        followers = stats.followers,
        list = message_list(messages, viewer.user.as_ref(), liked),
    );
    layout("Home", viewer, &body)
}

pub fn signup(viewer: &Viewer, form: &SignupForm, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        r#"<div class="auth-form">
    <h2>Join Warbler today.</h2>
    <form method="POST" action="/signup" id="user_form">
      {username}
      {email}
      {password}
      {image}
      <button class="btn btn-primary">Sign me up!</button>
    </form>
  </div>"#,
        username = input("text", "username", "Username", &form.username, errors),
        email = input("email", "email", "E-mail", &form.email, errors),
        password = input("password", "password", "Password", "", errors),
        image = input("text", "image_url", "(Optional) Image URL", &form.image_url, errors),
    );
    layout("Sign up", viewer, &body)
}

pub fn login(viewer: &Viewer, form: &LoginForm, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        r#"<div class="auth-form">
    <h2>Welcome back.</h2>
    <form method="POST" action="/login" id="user_form">
      {username}
      {password}
      <button class="btn btn-primary">Log in</button>
    </form>
  </div>"#,
        username = input("text", "username", "Username", &form.username, errors),
        password = input("password", "password", "Password", "", errors),
    );
    layout("Log in", viewer, &body)
}

pub fn new_message(viewer: &Viewer, form: &MessageForm, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        r#"<div class="message-form">
    <form method="POST" action="/messages/new">
      {text}
      <p class="text-muted">Up to {max} characters.</p>
      <button class="btn btn-primary">Add my message!</button>
    </form>
  </div>"#,
        text = textarea("text", "What's happening?", &form.text, errors),
        max = MAX_MESSAGE_LEN,
    );
    layout("New message", viewer, &body)
}

pub fn edit_profile(viewer: &Viewer, form: &EditProfileForm, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        r#"<div class="auth-form">
    <h2>Edit Your Profile.</h2>
    <form method="POST" action="/users/profile" id="user_form">
      {username}
      {email}
      {image}
      {header}
      {bio}
      {location}
      {password}
      <button class="btn btn-success">Edit this user!</button>
    </form>
    <form method="POST" action="/users/delete" class="delete-account">
      <button class="btn btn-danger">Delete Profile</button>
    </form>
  </div>"#,
        username = input("text", "username", "Username", &form.username, errors),
        email = input("email", "email", "E-mail", &form.email, errors),
        image = input("text", "image_url", "Image URL", &form.image_url, errors),
        header = input("text", "header_image_url", "Header Image URL", &form.header_image_url, errors),
        bio = textarea("bio", "Bio", &form.bio, errors),
        location = input("text", "location", "Location", &form.location, errors),
        password = input("password", "password", "Enter Password to complete changes", "", errors),
    );
    layout("Edit profile", viewer, &body)
}

pub fn users_index(viewer: &Viewer, users: &[UserRow], q: Option<&str>) -> Html<String> {
    let body = if users.is_empty() {
        match q {
            Some(q) => format!(r#"<h3 class="empty">Sorry, no users found matching "{}".</h3>"#, escape(q)),
            None => r#"<h3 class="empty">No users yet.</h3>"#.to_string(),
        }
    } else {
        user_cards(users)
    };
    layout("Users", viewer, &body)
}

pub struct ProfileView<'a> {
    pub user: &'a UserRow,
    pub stats: &'a UserStats,
    /// `Some` when a logged-in viewer is looking at someone else.
    pub viewer_follows: Option<bool>,
}

pub fn user_profile(
    viewer: &Viewer,
    profile: &ProfileView<'_>,
    messages: &[MessageRow],
    liked: &HashSet<i64>,
) -> Html<String> {
    let body = format!(
        "{}\n{}",
        profile_header(viewer, profile),
        message_list(messages, viewer.user.as_ref(), liked)
    );
    layout(&format!("@{}", profile.user.username), viewer, &body)
}

pub fn follow_list(
    viewer: &Viewer,
    profile: &ProfileView<'_>,
    heading: &str,
    users: &[UserRow],
) -> Html<String> {
    let body = format!(
        "{}\n<h3>{}</h3>\n{}",
        profile_header(viewer, profile),
        escape(heading),
        user_cards(users)
    );
    layout(heading, viewer, &body)
}

pub fn likes(
    viewer: &Viewer,
    profile: &ProfileView<'_>,
    messages: &[MessageRow],
    liked: &HashSet<i64>,
) -> Html<String> {
    let body = format!(
        "{}\n<h3>Liked warbles</h3>\n{}",
        profile_header(viewer, profile),
        message_list(messages, viewer.user.as_ref(), liked)
    );
    layout("Likes", viewer, &body)
}

pub fn message_show(viewer: &Viewer, message: &MessageRow, like_count: i64, liked: bool) -> Html<String> {
    let mut actions = String::new();
    if let Some(user) = &viewer.user {
        if user.id == message.user_id {
            let _ = write!(
                actions,
                r#"<form method="POST" action="/messages/{}/delete"><button class="btn btn-danger">Delete</button></form>"#,
                message.id
            );
        } else {
            actions.push_str(&like_button(message.id, liked));
        }
    }

    let body = format!(
        r#"<div class="message-detail">
    <a href="/users/{uid}"><img src="{img}" alt="{name}" class="timeline-image"></a>
    <a href="/users/{uid}">@{name}</a>
    <span class="text-muted">{date}</span>
    <p class="single-message">{text}</p>
    <p class="like-count">{like_count} {noun}</p>
    {actions}
  </div>"#,
        uid = message.user_id,
        img = escape(&message.image_url),
        name = escape(&message.username),
        date = format_timestamp(&message.timestamp),
        text = escape(&message.text),
        noun = if like_count == 1 { "like" } else { "likes" },
    );
    layout("Warble", viewer, &body)
}

pub fn not_found() -> Html<String> {
    error_page("Not found", "The page you are looking for does not exist.")
}

pub fn server_error() -> Html<String> {
    error_page("Server error", "Something went wrong. Please try again later.")
}

/// Rendered without the viewer, so the navbar is empty.
pub fn error_page(title: &str, message: &str) -> Html<String> {
    let body = format!(
        r#"<div class="error-page"><h1>{}</h1><p>{}</p><a href="/">Home</a></div>"#,
        escape(title),
        escape(message)
    );
    page(title, "", "", &body)
}

// -- Fragments --

fn like_button(message_id: i64, liked: bool) -> String {
    format!(
        r#"<form method="POST" action="/messages/{message_id}/like" class="messages-like">
        <button class="btn btn-sm {class}">{label}</button>
      </form>"#,
        class = if liked { "btn-primary" } else { "btn-secondary" },
        label = if liked { "Unlike" } else { "Like" },
    )
}

fn message_list(messages: &[MessageRow], viewer: Option<&CurrentUser>, liked: &HashSet<i64>) -> String {
    if messages.is_empty() {
        return r#"<p class="empty">No warbles yet.</p>"#.to_string();
    }

    let mut out = String::from(r#"<ul class="list-group" id="messages">"#);
    for m in messages {
        let like = match viewer {
            Some(v) if v.id != m.user_id => like_button(m.id, liked.contains(&m.id)),
            _ => String::new(),
        };
        let _ = write!(
            out,
            r#"
    <li class="list-group-item">
      <a href="/users/{uid}"><img src="{img}" alt="{name}" class="timeline-image"></a>
      <div class="message-area">
        <a href="/users/{uid}">@{name}</a>
        <span class="text-muted"><a href="/messages/{id}">{date}</a></span>
        <p>{text}</p>
      </div>
      {like}
    </li>"#,
            id = m.id,
            uid = m.user_id,
            img = escape(&m.image_url),
            name = escape(&m.username),
            date = format_timestamp(&m.timestamp),
            text = escape(&m.text),
        );
    }
    out.push_str("\n</ul>");
    out
}

fn user_cards(users: &[UserRow]) -> String {
    let mut out = String::from(r#"<div class="user-cards">"#);
    for u in users {
        let _ = write!(
            out,
            r#"
    <div class="card user-card">
      <a href="/users/{id}"><img src="{img}" alt="{name}" class="card-image"></a>
      <p><a href="/users/{id}">@{name}</a></p>
      <p class="card-bio">{bio}</p>
    </div>"#,
            id = u.id,
            img = escape(&u.image_url),
            name = escape(&u.username),
            bio = escape(u.bio.as_deref().unwrap_or("")),
        );
    }
    out.push_str("\n</div>");
    out
}

fn profile_header(viewer: &Viewer, profile: &ProfileView<'_>) -> String {
    let user = profile.user;
    let stats = profile.stats;

    let action = match (viewer.user_id(), profile.viewer_follows) {
        (Some(me), _) if me == user.id => {
            r#"<a href="/users/profile" class="btn btn-outline">Edit Profile</a>"#.to_string()
        }
        (Some(_), Some(true)) => format!(
            r#"<form method="POST" action="/users/stop-following/{}"><button class="btn btn-primary">Unfollow</button></form>"#,
            user.id
        ),
        (Some(_), _) => format!(
            r#"<form method="POST" action="/users/follow/{}"><button class="btn btn-outline">Follow</button></form>"#,
            user.id
        ),
        (None, _) => String::new(),
    };

    format!(
        r#"<div class="profile-header">
    <img src="{header}" alt="" class="profile-hero">
    <img src="{img}" alt="{name}" class="profile-avatar">
    <h4 class="profile-username">@{name}</h4>
    <p class="profile-bio">{bio}</p>
    <p class="profile-location">{location}</p>
    <ul class="user-stats">
      <li class="stat"><p class="small">Messages</p><h4><a href="/users/{id}">{messages}</a></h4></li>
      <li class="stat"><p class="small">Following</p><h4><a href="/users/{id}/following">{following}</a></h4></li>
      <li class="stat"><p class="small">Followers</p><h4><a href="/users/{id}/followers">{followers}</a></h4></li>
      <li class="stat"><p class="small">Likes</p><h4><a href="/users/{id}/likes">{likes}</a></h4></li>
    </ul>
    {action}
  </div>"#,
        id = user.id,
        header = escape(&user.header_image_url),
        img = escape(&user.image_url),
        name = escape(&user.username),
        bio = escape(user.bio.as_deref().unwrap_or("")),
        location = escape(user.location.as_deref().unwrap_or("")),
        messages = stats.messages,
        following = stats.following,
        followers = stats.followers,
        likes = stats.likes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#x27;y&#x27;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn timestamps_render_as_dates() {
        assert_eq!(format_timestamp("2024-03-01T12:00:00.000000Z"), "01 March 2024");
        assert_eq!(format_timestamp("garbage"), "garbage");
    }

    #[test]
    fn flash_is_rendered_with_category() {
        let viewer = Viewer::default().with_flash(Flash::danger("Invalid credentials."));
        let Html(page) = layout("Log in", &viewer, "");
        assert!(page.contains(r#"<div class="alert alert-danger">Invalid credentials.</div>"#));
    }

    #[test]
    fn anonymous_layout_offers_signup_and_login() {
        let Html(page) = home_anon(&Viewer::default());
        assert!(page.contains(r#"href="/signup""#));
        assert!(page.contains(r#"href="/login""#));
        assert!(!page.contains("/logout"));
    }

    #[test]
    fn error_pages_show_no_login_state() {
        let Html(page) = not_found();
        assert!(!page.contains("/signup"));
        assert!(!page.contains("/logout"));
        assert!(page.contains(r#"href="/""#));
    }

    #[test]
    fn header_image_stays_inside_an_attribute() {
        let user = UserRow {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: String::new(),
            image_url: "/a.png".into(),
            header_image_url: "x'),url('https://evil/t".into(),
            bio: None,
            location: None,
        };
        let profile = ProfileView {
            user: &user,
            stats: &UserStats::default(),
            viewer_follows: None,
        };
        let html = profile_header(&Viewer::default(), &profile);
        assert!(!html.contains("style="));
        assert!(html.contains(r#"src="x&#x27;),url(&#x27;https://evil/t""#));
    }

    #[test]
    fn form_errors_are_listed_by_field() {
        let mut errors = FieldErrors::new();
        errors.add("text", "This field is required.");
        let Html(page) = new_message(&Viewer::default(), &MessageForm::default(), &errors);
        assert!(page.contains(r#"<span class="form-error">This field is required.</span>"#));
    }
}
