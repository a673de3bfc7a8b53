use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        accounts::AccountService,
        comments::CommentService,
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follow::FollowService,
        pagination::PageRequest,
        posts::PostService,
    },
    cache::{FragmentKey, PageCache},
    infra::media::{MediaError, MediaStorage},
    presentation::views::{
        CommentFormView, FollowTemplate, GroupTemplate, IndexTemplate, LayoutContext,
        ListingView, PostDetailView, PostListFragment, PostTemplate, ProfileTemplate,
        ProfileView, render_fragment, render_not_found_response, render_template_response,
    },
};

use super::{
    HealthCheck,
    auth::{self, CurrentUser, Viewer},
    db_health_response,
    middleware::{load_viewer, log_responses, render_error_pages, set_request_context},
    posts,
};

/// Room for the non-file fields of a multipart post form.
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follows: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub accounts: Arc<AccountService>,
    pub page_cache: Arc<PageCache>,
    pub media: Arc<MediaStorage>,
    pub health: Arc<dyn HealthCheck>,
    pub secure_cookies: bool,
}

pub fn build_router(state: HttpState) -> Router {
    let body_limit = usize::try_from(state.media.max_bytes().saturating_add(FORM_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(index))
        .route(
            "/new/",
            get(posts::new_post_page).post(posts::new_post_submit),
        )
        .route("/follow/", get(follow_index))
        .route("/group/{slug}/", get(group_posts))
        .route(
            "/auth/login/",
            get(auth::login_page).post(auth::login_submit),
        )
        .route(
            "/auth/signup/",
            get(auth::signup_page).post(auth::signup_submit),
        )
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(public_health))
        .route("/{username}/", get(profile))
        .route("/{username}/follow", get(profile_follow))
        .route("/{username}/follow/", get(profile_follow))
        .route("/{username}/unfollow", post(profile_unfollow))
        .route("/{username}/unfollow/", post(profile_unfollow))
        .route("/{username}/{post_id}/", get(post_detail))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::edit_page).post(posts::edit_submit),
        )
        .route(
            "/{username}/{post_id}/comment/",
            get(posts::comment_redirect).post(posts::comment_submit),
        )
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(render_error_pages))
        .layer(middleware::from_fn_with_state(state.clone(), load_viewer))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref())
    }
}

/// The post list of the index is served from the page cache and only the
/// layout around it is rendered per request.
async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let number = match state.feed.resolve_index_page(query.request()).await {
        Ok(number) => number,
        Err(err) => return feed_error_response(err, &viewer),
    };

    let ttl = state.page_cache.config().index_ttl;
    let feed = state.feed.clone();
    let fragment = state
        .page_cache
        .get_or_render(
            FragmentKey::Index { page: number },
            || async move {
                let page = feed.index(PageRequest::Number(number as i64)).await?;
                render_fragment(PostListFragment::from_page(&page, "No posts yet."))
            },
            ttl,
        )
        .await;

    match fragment {
        Ok(posts_html) => {
            let content = ListingView {
                heading: "Latest updates".to_string(),
                description: None,
                posts_html,
            };
            let view = LayoutContext::new(viewer.chrome(), "Latest updates", content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let listing = match state.feed.group_posts(&slug, query.request()).await {
        Ok(listing) => listing,
        Err(err) => return feed_error_response(err, &viewer),
    };

    let fragment = PostListFragment::from_page(&listing.posts, "No posts in this group yet.")
        .without_groups();
    match render_fragment(fragment) {
        Ok(posts_html) => {
            let title = listing.group.title.clone();
            let view = LayoutContext::new(
                viewer.chrome(),
                title,
                ListingView::group(&listing, posts_html),
            );
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let listing = match state
        .feed
        .profile(&username, viewer.id(), query.request())
        .await
    {
        Ok(listing) => listing,
        Err(err) => return feed_error_response(err, &viewer),
    };

    match render_fragment(PostListFragment::from_page(&listing.posts, "No posts yet.")) {
        Ok(posts_html) => {
            let title = listing.author.display_name();
            let content = ProfileView::new(&listing, viewer.user().is_some(), posts_html);
            let view = LayoutContext::new(viewer.chrome(), title, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = match state.feed.following_feed(user.id, query.request()).await {
        Ok(page) => page,
        Err(err) => return feed_error_response(err, &viewer),
    };

    match render_fragment(PostListFragment::from_page(
        &page,
        "Authors you follow have not posted anything yet.",
    )) {
        Ok(posts_html) => {
            let content = ListingView {
                heading: "Following".to_string(),
                description: None,
                posts_html,
            };
            let view = LayoutContext::new(viewer.chrome(), "Following", content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    let author = match state.feed.require_user(&username).await {
        Ok(author) => author,
        Err(err) => return feed_error_response(err, &viewer),
    };

    // Repeated and self follows land on the profile like a fresh follow.
    match state.follows.follow(user.id, author.id).await {
        Ok(_) => Redirect::to(&format!("/{}/", author.username)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    let author = match state.feed.require_user(&username).await {
        Ok(author) => author,
        Err(err) => return feed_error_response(err, &viewer),
    };

    match state.follows.unfollow(user.id, author.id).await {
        Ok(_) => Redirect::to(&format!("/{}/", author.username)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(viewer.chrome());
    };
    render_post_detail(
        &state,
        &viewer,
        &username,
        post_id,
        CommentFormView::default(),
        StatusCode::OK,
    )
    .await
}

/// Render the single-post page; also used to redisplay a rejected comment.
pub(super) async fn render_post_detail(
    state: &HttpState,
    viewer: &Viewer,
    username: &str,
    post_id: Uuid,
    comment_form: CommentFormView,
    status: StatusCode,
) -> Response {
    match state.feed.post_detail(username, post_id, viewer.id()).await {
        Ok(detail) => {
            let content = PostDetailView::new(&detail, viewer.user(), comment_form);
            let title = format!("Post by {}", detail.post.author.display_name());
            let view = LayoutContext::new(viewer.chrome(), title, content);
            render_template_response(PostTemplate { view }, status)
        }
        Err(err) => feed_error_response(err, viewer),
    }
}

/// Post ids in paths that are not uuids name no post.
pub(super) fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

pub(super) fn feed_error_response(err: FeedError, viewer: &Viewer) -> Response {
    match err {
        FeedError::UnknownUser(_) | FeedError::UnknownGroup(_) | FeedError::UnknownPost => {
            let mut response = render_not_found_response(viewer.chrome());
            ErrorReport::from_message(
                "infra::http::feed_error_response",
                StatusCode::NOT_FOUND,
                err.to_string(),
            )
            .attach(&mut response);
            response
        }
        err => HttpError::from(err).into_response(),
    }
}

async fn fallback(viewer: Viewer) -> Response {
    render_not_found_response(viewer.chrome())
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(MediaError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
