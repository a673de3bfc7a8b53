use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{GroupListing, PostDetail, ProfileListing};
use crate::application::follow::FollowStats;
use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::validation::FieldErrors;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};
use uuid::Uuid;

const SITE_TITLE: &str = "Yatube";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_fragment(template).map(Html)
}

/// Render a template to a bare string, for fragments embedded in other pages.
pub fn render_fragment<T: Template>(template: T) -> Result<String, HttpError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, "Page not found", content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The templated page shown for 5xx responses.
pub fn render_server_error_response(chrome: LayoutChrome, status: StatusCode) -> Response {
    let view = LayoutContext::new(chrome, "Server error", ErrorPageView::server_error());
    render_template_response(ErrorTemplate { view }, status)
}

#[derive(Clone)]
pub struct ViewerBadge {
    pub username: String,
    pub display_name: String,
}

/// Per-request page furniture: site title and who is signed in.
#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub viewer: Option<ViewerBadge>,
    pub year: i32,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        Self {
            site_title: SITE_TITLE.to_string(),
            viewer: viewer.map(|user| ViewerBadge {
                username: user.username.clone(),
                display_name: user.display_name(),
            }),
            year: OffsetDateTime::now_utc().year(),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub viewer: Option<ViewerBadge>,
    pub year: i32,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            viewer: chrome.viewer,
            year: chrome.year,
            title: title.into(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub slug: String,
    pub title: String,
    pub href: String,
}

/// One post as shown in listings. Holds nothing viewer-specific, so a list of
/// cards can be cached and served to anyone.
#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub text: String,
    pub author_username: String,
    pub author_name: String,
    pub author_href: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub comment_count: u64,
    pub href: String,
}

impl PostCard {
    pub fn from_record(post: &PostRecord) -> Self {
        let href = post_href(&post.author.username, post.id);
        Self {
            id: post.id.to_string(),
            text: post.text.clone(),
            author_username: post.author.username.clone(),
            author_name: post.author.display_name(),
            author_href: format!("/{}/", post.author.username),
            published: format_date(post.pub_date),
            iso_date: format_iso(post.pub_date),
            group: post.group.as_ref().map(|group| GroupBadge {
                slug: group.slug.clone(),
                title: group.title.clone(),
                href: format!("/group/{}/", group.slug),
            }),
            image_url: post.image.as_deref().map(media_url),
            comment_count: post.comment_count,
            href,
        }
    }
}

#[derive(Clone)]
pub struct PageLink {
    pub number: u64,
    pub href: String,
    pub current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub has_other_pages: bool,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    /// First, last and the pages near the current one; `None` marks a gap.
    pub pages: Vec<Option<PageLink>>,
}

/// Pages linked on each side of the current one.
const PAGE_LINK_RADIUS: u64 = 2;

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            has_other_pages: page.has_other_pages(),
            previous_href: page.previous_page_number().map(page_href),
            next_href: page.next_page_number().map(page_href),
            pages: page_links(page.number, page.num_pages),
        }
    }
}

fn page_links(current: u64, num_pages: u64) -> Vec<Option<PageLink>> {
    let low = current.saturating_sub(PAGE_LINK_RADIUS).max(1);
    let high = current.saturating_add(PAGE_LINK_RADIUS).min(num_pages);

    let mut numbers = vec![1];
    numbers.extend(low..=high);
    numbers.push(num_pages);
    numbers.sort_unstable();
    numbers.dedup();

    let mut links = Vec::with_capacity(numbers.len() + 2);
    let mut previous = 0;
    for number in numbers {
        if number > previous + 1 && previous != 0 {
            links.push(None);
        }
        links.push(Some(PageLink {
            number,
            href: page_href(number),
            current: number == current,
        }));
        previous = number;
    }
    links
}

/// The paginated list of post cards shared by every listing page.
#[derive(Template)]
#[template(path = "partials/post_list.html")]
pub struct PostListFragment {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub empty_message: &'static str,
    pub show_groups: bool,
}

impl PostListFragment {
    pub fn from_page(page: &Page<PostRecord>, empty_message: &'static str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from_record).collect(),
            paginator: PaginatorView::from_page(page),
            empty_message,
            show_groups: true,
        }
    }

    pub fn without_groups(self) -> Self {
        Self {
            show_groups: false,
            ..self
        }
    }
}

pub struct ListingView {
    pub heading: String,
    pub description: Option<String>,
    pub posts_html: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingView>,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<ListingView>,
}

impl ListingView {
    pub fn group(listing: &GroupListing, posts_html: String) -> Self {
        Self {
            heading: listing.group.title.clone(),
            description: Some(listing.group.description.clone()),
            posts_html,
        }
    }
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<ListingView>,
}

pub struct AuthorCard {
    pub username: String,
    pub display_name: String,
    pub href: String,
    pub post_count: u64,
    pub followers: u64,
    pub following: u64,
    /// Follow controls are shown to signed-in viewers other than the author.
    pub show_follow_controls: bool,
    pub viewer_follows: bool,
    pub follow_href: String,
    pub unfollow_href: String,
}

impl AuthorCard {
    fn new(
        username: &str,
        display_name: String,
        post_count: u64,
        stats: FollowStats,
        show_follow_controls: bool,
        viewer_follows: bool,
    ) -> Self {
        Self {
            username: username.to_string(),
            display_name,
            href: format!("/{username}/"),
            post_count,
            followers: stats.followers,
            following: stats.following,
            show_follow_controls,
            viewer_follows,
            follow_href: format!("/{username}/follow/"),
            unfollow_href: format!("/{username}/unfollow/"),
        }
    }
}

pub struct ProfileView {
    pub author: AuthorCard,
    pub posts_html: String,
}

impl ProfileView {
    pub fn new(listing: &ProfileListing, signed_in: bool, posts_html: String) -> Self {
        Self {
            author: AuthorCard::new(
                &listing.author.username,
                listing.author.display_name(),
                listing.posts.total_count,
                listing.stats,
                signed_in && !listing.is_self,
                listing.following,
            ),
            posts_html,
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_name: String,
    pub author_href: String,
    pub text: String,
    pub created: String,
}

impl CommentView {
    pub fn from_record(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author.username.clone(),
            author_name: comment.author.display_name(),
            author_href: format!("/{}/", comment.author.username),
            text: comment.text.clone(),
            created: format_date(comment.created),
        }
    }
}

#[derive(Default)]
pub struct CommentFormView {
    pub text: String,
    pub text_errors: Vec<String>,
}

impl CommentFormView {
    pub fn with_errors(text: &str, errors: &FieldErrors) -> Self {
        Self {
            text: text.to_string(),
            text_errors: errors.for_field("text"),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author: AuthorCard,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub edit_href: String,
    pub comment_action: String,
    pub show_comment_form: bool,
    pub comment_form: CommentFormView,
}

impl PostDetailView {
    pub fn new(detail: &PostDetail, viewer: Option<&UserRecord>, comment_form: CommentFormView) -> Self {
        let post = &detail.post;
        let viewer_id = viewer.map(|user| user.id);
        let base = post_href(&post.author.username, post.id);
        Self {
            post: PostCard::from_record(post),
            author: AuthorCard::new(
                &post.author.username,
                post.author.display_name(),
                detail.author_post_count,
                detail.stats,
                viewer_id.is_some_and(|id| id != post.author.id),
                detail.following,
            ),
            comments: detail.comments.iter().map(CommentView::from_record).collect(),
            can_edit: viewer_id == Some(post.author.id),
            edit_href: format!("{base}edit/"),
            comment_action: format!("{base}comment/"),
            show_comment_form: viewer.is_some(),
            comment_form,
        }
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormView {
    pub fn new(
        action: impl Into<String>,
        groups: &[GroupRecord],
        text: &str,
        selected_group: Option<&str>,
        errors: &FieldErrors,
    ) -> Self {
        let selected = selected_group.map(str::trim).unwrap_or("");
        Self {
            is_edit: false,
            action: action.into(),
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| {
                    let id = group.id.to_string();
                    GroupOption {
                        selected: id == selected,
                        id,
                        title: group.title.clone(),
                    }
                })
                .collect(),
            current_image: None,
            text_errors: errors.for_field("text"),
            group_errors: errors.for_field("group"),
            image_errors: errors.for_field("image"),
        }
    }

    /// Form pre-filled from an existing post.
    pub fn for_post(post: &PostRecord, groups: &[GroupRecord], errors: &FieldErrors) -> Self {
        let group_id = post.group.as_ref().map(|group| group.id.to_string());
        Self::new(
            format!("{}edit/", post_href(&post.author.username, post.id)),
            groups,
            &post.text,
            group_id.as_deref(),
            errors,
        )
        .editing(post.image.as_deref())
    }

    pub fn editing(self, current_image: Option<&str>) -> Self {
        Self {
            is_edit: true,
            current_image: current_image.map(media_url),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct LoginView {
    pub username: String,
    pub next: String,
    pub form_errors: Vec<String>,
    pub username_errors: Vec<String>,
    pub password_errors: Vec<String>,
}

impl LoginView {
    pub fn new(username: &str, next: &str, errors: &FieldErrors) -> Self {
        Self {
            username: username.to_string(),
            next: next.to_string(),
            form_errors: errors.for_field(crate::application::accounts::NON_FIELD_ERRORS),
            username_errors: errors.for_field("username"),
            password_errors: errors.for_field("password"),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub errors: Vec<String>,
}

pub struct SignupView {
    pub fields: Vec<FormField>,
}

impl SignupView {
    /// `values` are (first_name, last_name, username, email); passwords are
    /// never echoed back.
    pub fn new(values: [&str; 4], errors: &FieldErrors) -> Self {
        let [first_name, last_name, username, email] = values;
        let field = |name: &'static str, label: &'static str, input_type: &'static str, value: &str| {
            FormField {
                name,
                label,
                input_type,
                value: value.to_string(),
                errors: errors.for_field(name),
            }
        };
        Self {
            fields: vec![
                field("first_name", "First name", "text", first_name),
                field("last_name", "Last name", "text", last_name),
                field("username", "Username", "text", username),
                field("email", "Email address", "email", email),
                field("password1", "Password", "password", ""),
                field("password2", "Password confirmation", "password", ""),
            ],
        }
    }
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            title: "Server Error".to_string(),
            message: "Something went wrong on our side. Please try again later.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn post_href(username: &str, post_id: Uuid) -> String {
    format!("/{username}/{post_id}/")
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{}", stored_path.trim_start_matches('/'))
}

fn page_href(number: u64) -> String {
    format!("?page={number}")
}

fn format_date(value: OffsetDateTime) -> String {
    value
        .format(format_description!("[day] [month repr:short] [year]"))
        .unwrap_or_default()
}

fn format_iso(value: OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
