//! Session lifetime against a real database.

mod support;

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

async fn session_count(pool: &PgPool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
        .fetch_one(pool)
        .await
        .expect("count sessions");
    count
}

#[sqlx::test(migrations = "./migrations")]
async fn login_removes_expired_sessions(pool: PgPool) {
    let app = support::app(pool.clone());
    let leo = app.signup("leo").await;
    let fyodor = app.signup("fyodor").await;

    let past = OffsetDateTime::now_utc() - Duration::days(1);
    for (user, prefix) in [(leo.id, "stale0000001"), (fyodor.id, "stale0000002")] {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, prefix, hashed_secret, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(prefix)
        .bind(vec![0u8; 32])
        .bind(past - Duration::days(14))
        .bind(past)
        .execute(&pool)
        .await
        .expect("insert stale session");
    }
    let live = app.login("fyodor").await;
    assert_eq!(session_count(&pool).await, 1, "stale rows of every user are gone");

    app.login("leo").await;
    assert_eq!(session_count(&pool).await, 2);

    let token = live
        .strip_prefix("yatube_session=")
        .expect("session cookie");
    let viewer = app.state.accounts.authenticate(token).await.expect("lookup");
    assert_eq!(viewer.map(|user| user.username).as_deref(), Some("fyodor"));
}
