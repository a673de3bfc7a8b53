//! Follow graph and feed composition against a real database.

mod support;

use sqlx::PgPool;
use yatube::application::{
    feed::FeedError, follow::FollowOutcome, pagination::PageRequest,
};

#[sqlx::test(migrations = "./migrations")]
async fn feed_contains_posts_of_followed_authors_only(pool: PgPool) {
    let app = support::app(pool);
    let reader = app.signup("reader").await;
    let followed = app.signup("followed").await;
    let stranger = app.signup("stranger").await;

    app.publish(&followed, "hello", None).await;
    app.publish(&stranger, "not for you", None).await;

    let outcome = app.state.follows.follow(reader.id, followed.id).await.unwrap();
    assert_eq!(outcome, FollowOutcome::Created);

    let feed = app
        .state
        .feed
        .following_feed(reader.id, PageRequest::First)
        .await
        .unwrap();
    let texts: Vec<_> = feed.items.iter().map(|post| post.text.as_str()).collect();
    assert_eq!(texts, vec!["hello"]);

    let strangers_feed = app
        .state
        .feed
        .following_feed(stranger.id, PageRequest::First)
        .await
        .unwrap();
    assert!(strangers_feed.items.is_empty());
    assert_eq!(strangers_feed.num_pages, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn unfollow_empties_the_feed(pool: PgPool) {
    let app = support::app(pool);
    let reader = app.signup("reader").await;
    let author = app.signup("author").await;
    app.publish(&author, "hello", None).await;

    app.state.follows.follow(reader.id, author.id).await.unwrap();
    assert!(app.state.follows.unfollow(reader.id, author.id).await.unwrap());

    let feed = app
        .state
        .feed
        .following_feed(reader.id, PageRequest::First)
        .await
        .unwrap();
    assert_eq!(feed.total_count, 0);
    assert_eq!(app.state.follows.follower_count(author.id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_follow_is_a_no_op(pool: PgPool) {
    let app = support::app(pool.clone());
    let reader = app.signup("reader").await;
    let author = app.signup("author").await;

    app.state.follows.follow(reader.id, author.id).await.unwrap();
    let again = app.state.follows.follow(reader.id, author.id).await.unwrap();
    assert_eq!(again, FollowOutcome::AlreadyFollowing);

    let (edges,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(edges, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_follows_of_one_pair_write_one_edge(pool: PgPool) {
    let app = support::app(pool.clone());
    let reader = app.signup("reader").await;
    let author = app.signup("author").await;

    let attempts = (0..8).map(|_| {
        let follows = app.state.follows.clone();
        let (user, target) = (reader.id, author.id);
        tokio::spawn(async move { follows.follow(user, target).await })
    });

    let mut created = 0;
    for attempt in attempts {
        if attempt.await.unwrap().unwrap() == FollowOutcome::Created {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(app.state.follows.follower_count(author.id).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn self_follow_never_reaches_the_table(pool: PgPool) {
    let app = support::app(pool.clone());
    let user = app.signup("narcissus").await;

    let outcome = app.state.follows.follow(user.id, user.id).await.unwrap();
    assert_eq!(outcome, FollowOutcome::SelfFollowRejected);

    let inserted = sqlx::query("INSERT INTO follows (id, user_id, author_id) VALUES ($1, $2, $2)")
        .bind(uuid::Uuid::new_v4())
        .bind(user.id)
        .execute(&pool)
        .await;
    assert!(inserted.is_err(), "check constraint refuses self edges");
}

#[sqlx::test(migrations = "./migrations")]
async fn feed_is_newest_first_and_paged_by_ten(pool: PgPool) {
    let app = support::app(pool);
    let reader = app.signup("reader").await;
    let author = app.signup("author").await;
    app.state.follows.follow(reader.id, author.id).await.unwrap();

    for n in 0..13 {
        app.publish(&author, &format!("post {n}"), None).await;
    }

    let first = app
        .state
        .feed
        .following_feed(reader.id, PageRequest::First)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.num_pages, 2);
    assert_eq!(first.items[0].text, "post 12");

    let second = app
        .state
        .feed
        .following_feed(reader.id, PageRequest::Number(2))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 3);
    assert_eq!(second.items[2].text, "post 0");
}

#[sqlx::test(migrations = "./migrations")]
async fn out_of_range_page_falls_back_to_the_last(pool: PgPool) {
    let app = support::app(pool);
    let reader = app.signup("reader").await;
    let author = app.signup("author").await;
    app.state.follows.follow(reader.id, author.id).await.unwrap();
    app.publish(&author, "only post", None).await;

    let page = app
        .state
        .feed
        .following_feed(reader.id, PageRequest::parse(Some("999")))
        .await
        .unwrap();
    assert_eq!(page.number, 1);
    assert_eq!(page.items.len(), 1);

    let garbage = app
        .state
        .feed
        .following_feed(reader.id, PageRequest::parse(Some("abc")))
        .await
        .unwrap();
    assert_eq!(garbage.number, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn profile_reports_follow_counts_and_viewer_state(pool: PgPool) {
    let app = support::app(pool);
    let reader = app.signup("reader").await;
    let author = app.signup("author").await;
    app.publish(&author, "hello", None).await;
    app.state.follows.follow(reader.id, author.id).await.unwrap();

    let listing = app
        .state
        .feed
        .profile("author", Some(reader.id), PageRequest::First)
        .await
        .unwrap();
    assert!(listing.following);
    assert!(!listing.is_self);
    assert_eq!(listing.stats.followers, 1);
    assert_eq!(listing.stats.following, 0);
    assert_eq!(listing.posts.total_count, 1);

    let missing = app
        .state
        .feed
        .profile("nobody", None, PageRequest::First)
        .await;
    assert!(matches!(missing, Err(FeedError::UnknownUser(_))));
}
