mod common;

use axum::http::StatusCode;

use common::{TestClient, stats};
use warbler_api::session::SESSION_COOKIE;

/// testuser plus three others; testuser follows u1, u1 and u2 follow testuser.
fn seed(client: &TestClient) -> (i64, i64, i64, i64) {
    let me = client.create_user("testuser", "testuser");
    let u1 = client.create_user("abc", "password");
    let u2 = client.create_user("efg", "password");
    let u3 = client.create_user("hij", "password");

    let db = client.db();
    db.follow(me, u1).unwrap();
    db.follow(u1, me).unwrap();
    db.follow(u2, me).unwrap();
    (me, u1, u2, u3)
}

#[tokio::test]
async fn index_lists_every_user() {
    let mut client = TestClient::new();
    seed(&client);

    let resp = client.get("/users").await;
    assert_eq!(resp.status, StatusCode::OK);
    for name in ["@testuser", "@abc", "@efg", "@hij"] {
        assert!(resp.body.contains(name), "missing {name}");
    }
}

#[tokio::test]
async fn search_filters_by_username() {
    let mut client = TestClient::new();
    client.create_user("testuser", "password");
    client.create_user("user1", "password");

    let resp = client.get("/users?q=test").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("@testuser"));
    assert!(!resp.body.contains("@user1"));

    let none = client.get("/users?q=zzz").await;
    assert!(none.body.contains("Sorry, no users found"));
}

#[tokio::test]
async fn profile_is_public() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);

    let resp = client.get(&format!("/users/{me}")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("@testuser"));
    assert_eq!(stats(&resp.body), vec![0, 1, 2, 0]);
}

#[tokio::test]
async fn missing_user_is_404() {
    let mut client = TestClient::new();
    let resp = client.get("/users/9999").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_stats_count_likes() {
    let mut client = TestClient::new();
    let (me, u1, ..) = seed(&client);
    let db = client.db();
    db.insert_message(me, "my own warble").unwrap();
    let m1 = db.insert_message(u1, "likable").unwrap();
    let m2 = db.insert_message(u1, "also likable").unwrap();
    db.toggle_like(me, m1).unwrap();
    db.toggle_like(me, m2).unwrap();

    let resp = client.get(&format!("/users/{me}")).await;
    assert_eq!(stats(&resp.body), vec![1, 1, 2, 2]);
}

#[tokio::test]
async fn following_and_followers_pages_list_the_right_users() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let following = client.get(&format!("/users/{me}/following")).await;
    assert_eq!(following.status, StatusCode::OK);
    assert!(following.body.contains("@abc"));
    assert!(!following.body.contains("@efg"));
    assert!(!following.body.contains("@hij"));

    let followers = client.get(&format!("/users/{me}/followers")).await;
    assert_eq!(followers.status, StatusCode::OK);
    assert!(followers.body.contains("@abc"));
    assert!(followers.body.contains("@efg"));
    assert!(!followers.body.contains("@hij"));
}

#[tokio::test]
async fn follow_pages_require_login() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);

    for page in ["following", "followers", "likes"] {
        let resp = client.get(&format!("/users/{me}/{page}")).await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
        assert_eq!(resp.location.as_deref(), Some("/"));
        let home = client.follow(&resp).await;
        assert!(home.body.contains("Access unauthorized."));
        assert!(!home.body.contains("@abc"));
    }
}

#[tokio::test]
async fn following_someone_puts_their_warbles_on_the_timeline() {
    let mut client = TestClient::new();
    let (me, _, _, u3) = seed(&client);
    client.db().insert_message(u3, "hello from hij").unwrap();
    client.log_in_as(me);

    let before = client.get("/").await;
    assert!(!before.body.contains("hello from hij"));

    let resp = client.post(&format!("/users/follow/{u3}"), &[]).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location, Some(format!("/users/{me}/following")));
    assert!(client.db().is_following(me, u3).unwrap());

    let after = client.get("/").await;
    assert!(after.body.contains("hello from hij"));

    client.post(&format!("/users/stop-following/{u3}"), &[]).await;
    assert!(!client.db().is_following(me, u3).unwrap());
    let again = client.get("/").await;
    assert!(!again.body.contains("hello from hij"));
}

#[tokio::test]
async fn cannot_follow_yourself() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let resp = client.post(&format!("/users/follow/{me}"), &[]).await;
    let page = client.follow(&resp).await;
    assert!(page.body.contains("You cannot follow yourself."));
    assert!(!client.db().is_following(me, me).unwrap());
}

#[tokio::test]
async fn following_missing_user_is_404() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let resp = client.post("/users/follow/9999", &[]).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_follow_is_unauthorized() {
    let mut client = TestClient::new();
    let (me, _, _, u3) = seed(&client);

    let resp = client.post(&format!("/users/follow/{u3}"), &[]).await;
    assert_eq!(resp.location.as_deref(), Some("/"));
    assert!(!client.db().is_following(me, u3).unwrap());
}

#[tokio::test]
async fn likes_page_lists_liked_warbles() {
    let mut client = TestClient::new();
    let (me, u1, ..) = seed(&client);
    let m = client.db().insert_message(u1, "liked by testuser").unwrap();
    client.db().insert_message(u1, "not liked").unwrap();
    client.db().toggle_like(me, m).unwrap();
    client.log_in_as(me);

    let resp = client.get(&format!("/users/{me}/likes")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("liked by testuser"));
    assert!(!resp.body.contains("not liked"));
}

#[tokio::test]
async fn edit_profile_with_correct_password() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let form = client.get("/users/profile").await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains(r#"value="testuser@test.com""#));

    let resp = client
        .post(
            "/users/profile",
            &[
                ("username", "renamed"),
                ("email", "renamed@test.com"),
                ("image_url", ""),
                ("header_image_url", ""),
                ("bio", "Birds are great"),
                ("location", "Nest"),
                ("password", "testuser"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location, Some(format!("/users/{me}")));

    let user = client.db().get_user_by_id(me).unwrap().unwrap();
    assert_eq!(user.username, "renamed");
    assert_eq!(user.bio.as_deref(), Some("Birds are great"));
    assert_eq!(user.location.as_deref(), Some("Nest"));
    assert_eq!(user.image_url, "/static/images/default-pic.png");

    let profile = client.follow(&resp).await;
    assert!(profile.body.contains("Profile updated."));
    assert!(profile.body.contains("@renamed"));
}

#[tokio::test]
async fn edit_profile_with_wrong_password_changes_nothing() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let resp = client
        .post(
            "/users/profile",
            &[
                ("username", "renamed"),
                ("email", "renamed@test.com"),
                ("password", "not-the-password"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Wrong password, please try again."));
    let user = client.db().get_user_by_id(me).unwrap().unwrap();
    assert_eq!(user.username, "testuser");
}

#[tokio::test]
async fn edit_profile_to_taken_username_is_rejected() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let resp = client
        .post(
            "/users/profile",
            &[
                ("username", "abc"),
                ("email", "testuser@test.com"),
                ("password", "testuser"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Username already taken."));
}

#[tokio::test]
async fn deleting_account_removes_user_and_their_data() {
    let mut client = TestClient::new();
    let (me, u1, ..) = seed(&client);
    let mine = client.db().insert_message(me, "gone soon").unwrap();
    let theirs = client.db().insert_message(u1, "stays").unwrap();
    client.db().toggle_like(me, theirs).unwrap();
    client.log_in_as(me);

    let resp = client.post("/users/delete", &[]).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/signup"));
    assert!(!client.has_cookie(SESSION_COOKIE));

    let db = client.db();
    assert!(db.get_user_by_id(me).unwrap().is_none());
    assert!(db.get_message(mine).unwrap().is_none());
    assert!(db.get_message(theirs).unwrap().is_some());
    assert_eq!(db.like_count(theirs).unwrap(), 0);
    assert!(db.followers(u1).unwrap().is_empty());

    let page = client.follow(&resp).await;
    assert!(page.body.contains("Your account has been deleted."));
}

#[tokio::test]
async fn non_numeric_user_id_is_404_page() {
    let mut client = TestClient::new();
    let resp = client.get("/users/abc").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.body.contains("<h1>Not found</h1>"));
}

#[tokio::test]
async fn error_page_for_logged_in_user_has_no_signup_link() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);

    let resp = client.get("/users/9999").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(!resp.body.contains(r#"href="/signup""#));
    assert!(!resp.body.contains(r#"href="/login""#));
}

#[tokio::test]
async fn rename_keeps_the_same_session() {
    let mut client = TestClient::new();
    let (me, ..) = seed(&client);
    client.log_in_as(me);
    let before = client.cookie(SESSION_COOKIE).map(str::to_string);

    let resp = client
        .post(
            "/users/profile",
            &[
                ("username", "renamed"),
                ("email", "testuser@test.com"),
                ("password", "testuser"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(client.cookie(SESSION_COOKIE).map(str::to_string), before);

    let page = client.get("/messages/new").await;
    assert_eq!(page.status, StatusCode::OK);
}
