use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::validation::{FieldErrors, validate_comment};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("post not found")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    /// Attach a comment to the post at `/{username}/{post_id}/`.
    pub async fn add(
        &self,
        author_id: Uuid,
        username: &str,
        post_id: Uuid,
        text: &str,
    ) -> Result<CommentRecord, CommentError> {
        match self.posts.find_post(post_id).await? {
            Some(post) if post.author.username == username => {}
            _ => return Err(CommentError::UnknownPost),
        }

        let text = validate_comment(text).map_err(CommentError::Invalid)?;
        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id,
                text,
            })
            .await
            .map_err(|err| match err {
                // The post vanished between the lookup and the insert.
                RepoError::InvalidInput { .. } => CommentError::UnknownPost,
                other => CommentError::Repo(other),
            })?;

        info!(
            target = "yatube::comments",
            post_id = %post_id,
            comment_id = %comment.id,
            "comment added"
        );
        Ok(comment)
    }
}
