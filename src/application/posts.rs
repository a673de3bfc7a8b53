//! Writing posts: creation, author-only edits and form choices.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::domain::validation::{FieldErrors, PostDraft, invalid_choice, validate_post};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of resolving a post for editing.
#[derive(Debug, Clone)]
pub enum EditTarget {
    Editable(PostRecord),
    /// The editor is not the author; callers send them to the read view.
    NotAuthor(PostRecord),
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
        }
    }

    /// Groups offered in the post form.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Validate submitted fields, including that a chosen group exists.
    pub async fn validate(&self, text: &str, group: Option<&str>) -> Result<PostDraft, PostError> {
        let draft = validate_post(text, group).map_err(PostError::Invalid)?;

        if let Some(group_id) = draft.group_id
            && self.groups.find_group_by_id(group_id).await?.is_none()
        {
            return Err(PostError::Invalid(FieldErrors::single(
                "group",
                invalid_choice(),
            )));
        }

        Ok(draft)
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        draft: PostDraft,
        image: Option<String>,
    ) -> Result<PostRecord, PostError> {
        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id,
                text: draft.text,
                group_id: draft.group_id,
                image,
            })
            .await?;

        info!(
            target = "yatube::posts",
            post_id = %post.id,
            author = %post.author.username,
            group = post.group.as_ref().map(|g| g.slug.as_str()).unwrap_or(""),
            "post created"
        );
        Ok(post)
    }

    pub async fn edit_target(
        &self,
        editor_id: Uuid,
        username: &str,
        post_id: Uuid,
    ) -> Result<EditTarget, PostError> {
        let post = match self.posts.find_post(post_id).await? {
            Some(post) if post.author.username == username => post,
            _ => return Err(PostError::NotFound),
        };

        if post.author.id == editor_id {
            Ok(EditTarget::Editable(post))
        } else {
            Ok(EditTarget::NotAuthor(post))
        }
    }

    /// Apply an edit. `image: None` keeps the current image.
    pub async fn update(
        &self,
        post: &PostRecord,
        draft: PostDraft,
        image: Option<String>,
    ) -> Result<PostRecord, PostError> {
        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                text: draft.text,
                group_id: draft.group_id,
                image: image.or_else(|| post.image.clone()),
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => PostError::NotFound,
                other => PostError::Repo(other),
            })?;

        info!(
            target = "yatube::posts",
            post_id = %updated.id,
            author = %updated.author.username,
            "post updated"
        );
        Ok(updated)
    }
}
