//! Request-level behaviour of the public site.

mod support;

use axum::http::StatusCode;
use sqlx::PgPool;
use support::post_path;
use yatube::cache::CacheConfig;

#[sqlx::test(migrations = "./migrations")]
async fn public_pages_render(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    let group = app.group("Cats", "cats").await;
    let post = app.publish(&author, "Purring", Some(group.id)).await;

    for path in ["/", "/group/cats/", "/leo/", post_path(&post).as_str()] {
        let response = app.get(path, None).await;
        assert_eq!(response.status, StatusCode::OK, "GET {path}");
        assert!(response.body.contains("Purring"), "GET {path} shows the post");
    }

    let login = app.get("/auth/login/", None).await;
    assert_eq!(login.status, StatusCode::OK);
    let signup = app.get("/auth/signup/", None).await;
    assert_eq!(signup.status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_pages_answer_not_found(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    let post = app.publish(&author, "hello", None).await;

    let paths = [
        "/nobody/".to_string(),
        "/group/missing/".to_string(),
        format!("/leo/{}/", uuid::Uuid::new_v4()),
        "/leo/not-a-uuid/".to_string(),
        format!("/someone-else/{}/", post.id),
        "/no/such/route/here/".to_string(),
    ];
    for path in paths {
        let response = app.get(&path, None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "GET {path}");
        assert!(response.body.contains("Page Not Found"));
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn anonymous_writers_are_sent_to_login(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    let post = app.publish(&author, "hello", None).await;

    let new_post = app.get("/new/", None).await;
    assert_eq!(new_post.status, StatusCode::SEE_OTHER);
    assert_eq!(new_post.location.as_deref(), Some("/auth/login/?next=/new/"));

    let edit_path = format!("{}edit/", post_path(&post));
    let edit = app.get(&edit_path, None).await;
    assert_eq!(
        edit.location.as_deref(),
        Some(format!("/auth/login/?next={edit_path}").as_str())
    );

    let follow = app.get("/follow/", None).await;
    assert_eq!(follow.location.as_deref(), Some("/auth/login/?next=/follow/"));

    let comment = app
        .post_form(&format!("{}comment/", post_path(&post)), None, "text=hi")
        .await;
    assert_eq!(comment.status, StatusCode::SEE_OTHER);
    assert!(
        comment
            .location
            .as_deref()
            .is_some_and(|location| location.starts_with("/auth/login/?next="))
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn signup_then_login_sets_a_session(pool: PgPool) {
    let app = support::app(pool);

    let signup = app
        .post_form(
            "/auth/signup/",
            None,
            "first_name=Leo&last_name=Tolstoy&username=leo&email=leo%40example.com\
             &password1=war-and-peace-1869&password2=war-and-peace-1869",
        )
        .await;
    assert_eq!(signup.status, StatusCode::SEE_OTHER);
    assert_eq!(signup.location.as_deref(), Some("/auth/login/"));

    let rejected = app
        .post_form("/auth/login/", None, "username=leo&password=wrong&next=")
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert!(rejected.body.contains("class=\"errors\""));

    let login = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=war-and-peace-1869&next=%2Fnew%2F",
        )
        .await;
    assert_eq!(login.status, StatusCode::SEE_OTHER);
    assert_eq!(login.location.as_deref(), Some("/new/"));
}

#[sqlx::test(migrations = "./migrations")]
async fn new_post_is_listed_on_its_pages(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    let group = app.group("Cats", "cats").await;
    let cookie = app.login("leo").await;

    let form = app.get("/new/", Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Cats"));

    let created = app
        .post_form(
            "/new/",
            Some(&cookie),
            &format!("text=Fresh+post&group={}", group.id),
        )
        .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    assert_eq!(created.location.as_deref(), Some("/"));

    let profile = app.get("/leo/", None).await;
    assert!(profile.body.contains("Fresh post"));
    assert!(profile.body.contains("Posts: 1"));
    let group_page = app.get("/group/cats/", None).await;
    assert!(group_page.body.contains("Fresh post"));

    let listing = app
        .state
        .feed
        .profile(&author.username, None, Default::default())
        .await
        .unwrap();
    assert_eq!(listing.posts.items[0].group.as_ref().map(|g| g.id), Some(group.id));
}

#[sqlx::test(migrations = "./migrations")]
async fn invalid_post_form_is_redisplayed_without_writing(pool: PgPool) {
    let app = support::app(pool);
    app.signup("leo").await;
    let cookie = app.login("leo").await;

    let response = app
        .post_form("/new/", Some(&cookie), "text=+++&group=")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("This field is required."));

    let bogus_group = app
        .post_form(
            "/new/",
            Some(&cookie),
            &format!("text=hello&group={}", uuid::Uuid::new_v4()),
        )
        .await;
    assert_eq!(bogus_group.status, StatusCode::OK);
    assert!(bogus_group.body.contains("Select a valid choice."));

    let profile = app.get("/leo/", None).await;
    assert!(profile.body.contains("Posts: 0"));
}

#[sqlx::test(migrations = "./migrations")]
async fn author_edit_moves_post_between_groups(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    let cats = app.group("Cats", "cats").await;
    let dogs = app.group("Dogs", "dogs").await;
    let post = app.publish(&author, "Original", Some(cats.id)).await;
    let cookie = app.login("leo").await;

    let edit_path = format!("{}edit/", post_path(&post));
    let form = app.get(&edit_path, Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Original"));

    let saved = app
        .post_form(
            &edit_path,
            Some(&cookie),
            &format!("text=Edited&group={}", dogs.id),
        )
        .await;
    assert_eq!(saved.status, StatusCode::SEE_OTHER);
    assert_eq!(saved.location.as_deref(), Some(post_path(&post).as_str()));

    let detail = app.get(&post_path(&post), None).await;
    assert!(detail.body.contains("Edited"));
    assert!(!app.get("/group/cats/", None).await.body.contains("Edited"));
    assert!(app.get("/group/dogs/", None).await.body.contains("Edited"));

    let edited = app
        .state
        .feed
        .require_post("leo", post.id)
        .await
        .expect("edited post");
    assert_eq!(edited.pub_date, post.pub_date);
    assert_eq!(edited.group.map(|group| group.slug).as_deref(), Some("dogs"));
}

#[sqlx::test(migrations = "./migrations")]
async fn non_author_edit_redirects_to_the_post(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    app.signup("fyodor").await;
    let post = app.publish(&author, "Mine", None).await;
    let cookie = app.login("fyodor").await;

    let edit_path = format!("{}edit/", post_path(&post));
    let page = app.get(&edit_path, Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some(post_path(&post).as_str()));

    let submit = app
        .post_form(&edit_path, Some(&cookie), "text=Hijacked")
        .await;
    assert_eq!(submit.location.as_deref(), Some(post_path(&post).as_str()));

    let detail = app.get(&post_path(&post), None).await;
    assert!(detail.body.contains("Mine"));
    assert!(!detail.body.contains("Hijacked"));
}

#[sqlx::test(migrations = "./migrations")]
async fn image_attached_on_edit_shows_everywhere(pool: PgPool) {
    let app = support::app_with_cache(pool, CacheConfig::disabled());
    let author = app.signup("leo").await;
    let group = app.group("Cats", "cats").await;
    let post = app.publish(&author, "Picture", Some(group.id)).await;
    let cookie = app.login("leo").await;

    let edit_path = format!("{}edit/", post_path(&post));
    let saved = app
        .post_with_image(&edit_path, &cookie, "Picture", "small.gif", support::TINY_GIF)
        .await;
    assert_eq!(saved.status, StatusCode::SEE_OTHER);

    for path in ["/", "/leo/", "/group/cats/", post_path(&post).as_str()] {
        let page = app.get(path, None).await;
        assert!(page.body.contains("<img"), "GET {path} shows the image");
    }

    let stored = app
        .state
        .feed
        .require_post("leo", post.id)
        .await
        .unwrap()
        .image
        .expect("image saved on the post");
    let media = app.get(&format!("/media/{stored}"), None).await;
    assert_eq!(media.status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn non_image_upload_is_rejected(pool: PgPool) {
    let app = support::app(pool);
    app.signup("leo").await;
    let cookie = app.login("leo").await;

    let response = app
        .post_with_image("/new/", &cookie, "Not a picture", "notes.txt", b"plain text")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Upload a valid image."));
    assert!(app.get("/leo/", None).await.body.contains("Posts: 0"));
}

#[sqlx::test(migrations = "./migrations")]
async fn comments_need_text_and_then_appear(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("leo").await;
    app.signup("fyodor").await;
    let post = app.publish(&author, "Discuss", None).await;
    let cookie = app.login("fyodor").await;
    let comment_path = format!("{}comment/", post_path(&post));

    let blank = app.post_form(&comment_path, Some(&cookie), "text=").await;
    assert_eq!(blank.status, StatusCode::OK);
    assert!(blank.body.contains("This field is required."));

    let added = app
        .post_form(&comment_path, Some(&cookie), "text=Nice+one")
        .await;
    assert_eq!(added.status, StatusCode::SEE_OTHER);
    assert_eq!(added.location.as_deref(), Some(post_path(&post).as_str()));

    let detail = app.get(&post_path(&post), None).await;
    assert!(detail.body.contains("Nice one"));

    let via_get = app.get(&comment_path, Some(&cookie)).await;
    assert_eq!(via_get.location.as_deref(), Some(post_path(&post).as_str()));
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_feed_shows_followed_authors(pool: PgPool) {
    let app = support::app(pool);
    app.signup("author").await;
    app.signup("follower").await;
    app.signup("bystander").await;
    let follower = app.login("follower").await;
    let bystander = app.login("bystander").await;
    let author = app.login("author").await;

    let follow = app.get("/author/follow", Some(&follower)).await;
    assert_eq!(follow.status, StatusCode::SEE_OTHER);
    assert_eq!(follow.location.as_deref(), Some("/author/"));

    app.post_form("/new/", Some(&author), "text=hello").await;

    assert!(app.get("/follow/", Some(&follower)).await.body.contains("hello"));
    assert!(!app.get("/follow/", Some(&bystander)).await.body.contains("hello"));

    let unfollow = app.post_form("/author/unfollow", Some(&follower), "").await;
    assert_eq!(unfollow.location.as_deref(), Some("/author/"));
    assert!(!app.get("/follow/", Some(&follower)).await.body.contains("hello"));
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_routes_are_idempotent_and_refuse_self(pool: PgPool) {
    let app = support::app(pool);
    let author = app.signup("author").await;
    let follower = app.signup("follower").await;
    let cookie = app.login("follower").await;

    app.get("/author/follow/", Some(&cookie)).await;
    app.get("/author/follow/", Some(&cookie)).await;
    assert_eq!(app.state.follows.follower_count(author.id).await.unwrap(), 1);

    let selfish = app.get("/follower/follow/", Some(&cookie)).await;
    assert_eq!(selfish.location.as_deref(), Some("/follower/"));
    assert_eq!(app.state.follows.following_count(follower.id).await.unwrap(), 1);

    let profile = app.get("/author/", Some(&cookie)).await;
    assert!(profile.body.contains("Followers: 1"));
    assert!(profile.body.contains("Unfollow"));

    let unknown = app.get("/ghost/follow/", Some(&cookie)).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn page_past_the_end_shows_the_last_page(pool: PgPool) {
    let app = support::app(pool);
    app.signup("author").await;
    app.signup("reader").await;
    let reader = app.login("reader").await;
    let author = app.login("author").await;

    app.get("/author/follow/", Some(&reader)).await;
    app.post_form("/new/", Some(&author), "text=only+post").await;

    let page = app.get("/follow/?page=999", Some(&reader)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("only post"));

    let profile = app.get("/author/?page=999", None).await;
    assert!(profile.body.contains("only post"));
}

#[sqlx::test(migrations = "./migrations")]
async fn health_endpoint_pings_the_database(pool: PgPool) {
    let app = support::app(pool);
    let response = app.get("/_health/db", None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "./migrations")]
async fn server_errors_render_the_error_page(pool: PgPool) {
    let app = support::app(pool.clone());
    let author = app.signup("leo").await;
    let post = app.publish(&author, "Doomed", None).await;

    sqlx::query("DROP TABLE comments")
        .execute(&pool)
        .await
        .expect("drop comments");

    let response = app.get(&post_path(&post), None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body.contains("Server Error"));
    assert!(response.body.contains("Back to home"));
    assert!(!response.body.contains("Doomed"));
}

#[sqlx::test(migrations = "./migrations")]
async fn images_with_very_long_names_are_saved(pool: PgPool) {
    let app = support::app(pool);
    app.signup("leo").await;
    let cookie = app.login("leo").await;
    let filename = format!("{}.gif", "k".repeat(210));

    let response = app
        .post_with_image("/new/", &cookie, "long name", &filename, support::TINY_GIF)
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/"));

    let profile = app.get("/leo/", None).await;
    assert!(profile.body.contains("long name"));
    assert!(profile.body.contains("Posts: 1"));
    assert_eq!(app.media_files().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_post_write_leaves_no_image_behind(pool: PgPool) {
    let app = support::app(pool.clone());
    app.signup("leo").await;
    let cookie = app.login("leo").await;

    sqlx::query("ALTER TABLE posts ADD CONSTRAINT posts_text_not_rejected CHECK (text <> 'rejected')")
        .execute(&pool)
        .await
        .expect("add check");

    let response = app
        .post_with_image("/new/", &cookie, "rejected", "cat.gif", support::TINY_GIF)
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.media_files().is_empty());

    let profile = app.get("/leo/", None).await;
    assert!(profile.body.contains("Posts: 0"));
}
