//! Writing handlers: new post, author-only edit and comments.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::application::comments::CommentError;
use crate::application::error::HttpError;
use crate::application::posts::{EditTarget, PostError};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::domain::validation::{FieldErrors, PostDraft};
use crate::infra::media::{MediaError, MediaStorage};
use crate::presentation::views::{
    CommentFormView, LayoutContext, PostFormTemplate, PostFormView, post_href,
    render_not_found_response, render_template_response,
};

use super::auth::{CurrentUser, Viewer};
use super::forms::PostForm;
use super::public::{HttpState, parse_post_id, render_post_detail};

const SOURCE: &str = "infra::http::posts";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A validated submission, or the errors to show on the redisplayed form.
enum Submission {
    Accepted {
        draft: PostDraft,
        image: Option<String>,
    },
    Rejected(FieldErrors),
}

/// Validate the fields, then store the image only once everything else passed.
async fn accept_submission(state: &HttpState, form: &PostForm) -> Result<Submission, HttpError> {
    let mut errors = FieldErrors::new();

    let draft = match state.posts.validate(&form.text, form.group.as_deref()).await {
        Ok(draft) => Some(draft),
        Err(PostError::Invalid(field_errors)) => {
            errors.extend(field_errors);
            None
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(image) = &form.image
        && !MediaStorage::is_image_name(&image.filename)
    {
        errors.push("image", INVALID_IMAGE);
    }

    let Some(draft) = draft.filter(|_| errors.is_empty()) else {
        return Ok(Submission::Rejected(errors));
    };

    let image = match &form.image {
        None => None,
        Some(upload) => match state
            .media
            .store_image(&upload.filename, upload.data.clone())
            .await
        {
            Ok(stored) => {
                info!(
                    target = SOURCE,
                    path = %stored.stored_path,
                    checksum = %stored.checksum,
                    size_bytes = stored.size_bytes,
                    "post image stored"
                );
                Some(stored.stored_path)
            }
            Err(MediaError::NotAnImage { .. } | MediaError::EmptyPayload) => {
                return Ok(Submission::Rejected(FieldErrors::single(
                    "image",
                    INVALID_IMAGE,
                )));
            }
            Err(MediaError::TooLarge { limit }) => {
                return Ok(Submission::Rejected(FieldErrors::single(
                    "image",
                    format!("The image may be at most {limit} bytes."),
                )));
            }
            Err(err) => {
                error!(target = SOURCE, error = %err, "failed to store post image");
                return Err(HttpError::internal(SOURCE, &err));
            }
        },
    };

    Ok(Submission::Accepted { draft, image })
}

/// Remove an image stored for a submission whose post was never saved.
async fn discard_image(state: &HttpState, stored_path: Option<&str>) {
    let Some(path) = stored_path else {
        return;
    };
    if let Err(err) = state.media.delete(path).await {
        warn!(target = SOURCE, error = %err, path, "failed to remove orphaned image");
    }
}

fn render_post_form(viewer: &Viewer, title: &str, form: PostFormView) -> Response {
    let view = LayoutContext::new(viewer.chrome(), title, form);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

async fn group_choices(state: &HttpState) -> Result<Vec<GroupRecord>, HttpError> {
    Ok(state.posts.group_choices().await?)
}

pub(super) async fn new_post_page(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(_user): CurrentUser,
) -> Result<Response, HttpError> {
    let groups = group_choices(&state).await?;
    let form = PostFormView::new("/new/", &groups, "", None, &FieldErrors::new());
    Ok(render_post_form(&viewer, "New post", form))
}

pub(super) async fn new_post_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    form: PostForm,
) -> Result<Response, HttpError> {
    match accept_submission(&state, &form).await? {
        Submission::Accepted { draft, image } => {
            match state.posts.create(user.id, draft, image.clone()).await {
                Ok(_) => Ok(Redirect::to("/").into_response()),
                Err(err) => {
                    discard_image(&state, image.as_deref()).await;
                    Err(err.into())
                }
            }
        }
        Submission::Rejected(errors) => {
            let groups = group_choices(&state).await?;
            let view = PostFormView::new("/new/", &groups, &form.text, form.group.as_deref(), &errors);
            Ok(render_post_form(&viewer, "New post", view))
        }
    }
}

/// Resolve the post behind an edit URL. Anything other than the author's own
/// post ends the request here.
async fn editable_post(
    state: &HttpState,
    viewer: &Viewer,
    user_id: uuid::Uuid,
    username: &str,
    raw_post_id: &str,
) -> Result<Result<PostRecord, Response>, HttpError> {
    let Some(post_id) = parse_post_id(raw_post_id) else {
        return Ok(Err(render_not_found_response(viewer.chrome())));
    };

    match state.posts.edit_target(user_id, username, post_id).await {
        Ok(EditTarget::Editable(post)) => Ok(Ok(post)),
        Ok(EditTarget::NotAuthor(post)) => Ok(Err(Redirect::to(&post_href(
            &post.author.username,
            post.id,
        ))
        .into_response())),
        Err(PostError::NotFound) => Ok(Err(render_not_found_response(viewer.chrome()))),
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn edit_page(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Response, HttpError> {
    let post = match editable_post(&state, &viewer, user.id, &username, &post_id).await? {
        Ok(post) => post,
        Err(response) => return Ok(response),
    };

    let groups = group_choices(&state).await?;
    let form = PostFormView::for_post(&post, &groups, &FieldErrors::new());
    Ok(render_post_form(&viewer, "Edit post", form))
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
    form: PostForm,
) -> Result<Response, HttpError> {
    let post = match editable_post(&state, &viewer, user.id, &username, &post_id).await? {
        Ok(post) => post,
        Err(response) => return Ok(response),
    };

    match accept_submission(&state, &form).await? {
        Submission::Accepted { draft, image } => {
            let replaced = image.is_some();
            let updated = match state.posts.update(&post, draft, image.clone()).await {
                Ok(updated) => updated,
                Err(err) => {
                    discard_image(&state, image.as_deref()).await;
                    return Err(err.into());
                }
            };
            if replaced
                && let Some(previous) = post.image.as_deref()
                && updated.image.as_deref() != Some(previous)
                && let Err(err) = state.media.delete(previous).await
            {
                error!(
                    target = SOURCE,
                    error = %err,
                    path = previous,
                    "failed to remove replaced image"
                );
            }
            Ok(Redirect::to(&post_href(&updated.author.username, updated.id)).into_response())
        }
        Submission::Rejected(errors) => {
            let groups = group_choices(&state).await?;
            let action = format!("{}edit/", post_href(&post.author.username, post.id));
            let view = PostFormView::new(action, &groups, &form.text, form.group.as_deref(), &errors)
                .editing(post.image.as_deref());
            Ok(render_post_form(&viewer, "Edit post", view))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

/// Comments are only accepted by POST; a GET lands on the post itself.
pub(super) async fn comment_redirect(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(_user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(viewer.chrome());
    };
    match state.feed.require_post(&username, post_id).await {
        Ok(post) => Redirect::to(&post_href(&post.author.username, post.id)).into_response(),
        Err(err) => super::public::feed_error_response(err, &viewer),
    }
}

pub(super) async fn comment_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    CurrentUser(user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(viewer.chrome());
    };

    match state
        .comments
        .add(user.id, &username, post_id, &form.text)
        .await
    {
        Ok(_) => Redirect::to(&post_href(&username, post_id)).into_response(),
        Err(CommentError::Invalid(errors)) => {
            render_post_detail(
                &state,
                &viewer,
                &username,
                post_id,
                CommentFormView::with_errors(&form.text, &errors),
                StatusCode::OK,
            )
            .await
        }
        Err(CommentError::UnknownPost) => render_not_found_response(viewer.chrome()),
        Err(err) => HttpError::from(err).into_response(),
    }
}
