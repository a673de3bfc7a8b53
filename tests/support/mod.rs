//! Shared fixtures for the Postgres-backed integration tests.
//!
//! Each test gets a fresh database from `#[sqlx::test]`; [`TestApp`] wires the
//! real repositories and services into the router the binary serves.

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION},
    },
};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use yatube::{
    application::{
        accounts::AccountService,
        comments::CommentService,
        feed::{FeedService, PageSizes},
        follow::FollowService,
        groups::{CreateGroupCommand, GroupService},
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo, SessionsRepo,
            UsersRepo,
        },
    },
    cache::{CacheConfig, PageCache},
    domain::{
        entities::{GroupRecord, PostRecord, UserRecord},
        validation::SignupInput,
    },
    infra::{
        db::PostgresRepositories,
        http::{HttpState, SESSION_COOKIE, build_router},
        media::MediaStorage,
    },
};

pub const PASSWORD: &str = "correct-horse-battery";
const MEDIA_LIMIT_BYTES: u64 = 1024 * 1024;

/// A 1x1 transparent GIF.
pub const TINY_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub struct TestApp {
    pub state: HttpState,
    pub router: Router,
    pub repositories: Arc<PostgresRepositories>,
    media_root: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

pub fn app(pool: PgPool) -> TestApp {
    app_with_cache(pool, CacheConfig::default())
}

pub fn app_with_cache(pool: PgPool, cache: CacheConfig) -> TestApp {
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();

    let media_root = TempDir::new().expect("media tempdir");
    let media = MediaStorage::new(media_root.path().to_path_buf(), MEDIA_LIMIT_BYTES)
        .expect("media storage");

    let follows = FollowService::new(follows_repo);
    let feed = FeedService::new(
        posts_repo.clone(),
        users_repo.clone(),
        groups_repo.clone(),
        comments_repo.clone(),
        follows.clone(),
        PageSizes::default(),
    );

    let state = HttpState {
        feed: Arc::new(feed),
        follows: Arc::new(follows),
        posts: Arc::new(PostService::new(
            posts_repo.clone(),
            posts_write_repo,
            groups_repo,
        )),
        comments: Arc::new(CommentService::new(posts_repo, comments_repo)),
        accounts: Arc::new(AccountService::new(
            users_repo,
            sessions_repo,
            std::time::Duration::from_secs(3600),
        )),
        page_cache: Arc::new(PageCache::new(cache)),
        media: Arc::new(media),
        health: repositories.clone(),
        secure_cookies: false,
    };

    TestApp {
        router: build_router(state.clone()),
        state,
        repositories,
        media_root,
    }
}

impl TestApp {
    pub async fn signup(&self, username: &str) -> UserRecord {
        let email = format!("{username}@example.com");
        self.state
            .accounts
            .signup(&SignupInput {
                username,
                email: &email,
                first_name: "",
                last_name: "",
                password1: PASSWORD,
                password2: PASSWORD,
            })
            .await
            .expect("signup")
    }

    /// `Cookie` header value carrying a fresh session for `username`.
    pub async fn login(&self, username: &str) -> String {
        let session = self
            .state
            .accounts
            .login(username, PASSWORD)
            .await
            .expect("login");
        format!("{SESSION_COOKIE}={}", session.token)
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        let groups: Arc<dyn GroupsRepo> = self.repositories.clone();
        GroupService::new(groups)
            .create(CreateGroupCommand {
                title: title.to_string(),
                slug: Some(slug.to_string()),
                description: format!("All about {title}"),
            })
            .await
            .expect("create group")
    }

    pub async fn publish(&self, author: &UserRecord, text: &str, group: Option<Uuid>) -> PostRecord {
        let group = group.map(|id| id.to_string());
        let draft = self
            .state
            .posts
            .validate(text, group.as_deref())
            .await
            .expect("valid post");
        self.state
            .posts
            .create(author.id, draft, None)
            .await
            .expect("create post")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, path: &str, cookie: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    /// Submit the post form as multipart with an attached image.
    pub async fn post_with_image(
        &self,
        path: &str,
        cookie: &str,
        text: &str,
        filename: &str,
        image: &[u8],
    ) -> TestResponse {
        const BOUNDARY: &str = "yatube-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: image/gif\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(COOKIE, cookie)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    /// Every file currently stored below the media root.
    pub fn media_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, found);
                } else {
                    found.push(path);
                }
            }
        }

        let mut found = Vec::new();
        walk(self.media_root.path(), &mut found);
        found
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

pub fn post_path(post: &PostRecord) -> String {
    format!("/{}/{}/", post.author.username, post.id)
}
