//! Group administration used by the command line.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugAsyncError, SlugError, unique_group_slug};
use crate::domain::validation::{FieldErrors, validate_group};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("group `{0}` not found")]
    NotFound(String),
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => Self::Slug(err),
            SlugAsyncError::Predicate(err) => Self::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let slug = match command.slug {
            Some(slug) => slug,
            None => {
                let groups = self.groups.clone();
                unique_group_slug(&command.title, |candidate| {
                    let groups = groups.clone();
                    let candidate = candidate.to_string();
                    async move { Ok(groups.find_group_by_slug(&candidate).await?.is_none()) }
                })
                .await?
            }
        };

        let draft = validate_group(&command.title, &slug, &command.description)
            .map_err(GroupError::Invalid)?;

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title: draft.title,
                slug: draft.slug.clone(),
                description: draft.description,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(draft.slug.clone()),
                other => GroupError::Repo(other),
            })?;

        info!(target = "yatube::groups", slug = %group.slug, "group created");
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Delete a group by slug. Its posts stay, detached from any group.
    pub async fn delete(&self, slug: &str) -> Result<GroupRecord, GroupError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| GroupError::NotFound(slug.to_string()))?;

        if !self.groups.delete_group(group.id).await? {
            return Err(GroupError::NotFound(slug.to_string()));
        }

        info!(target = "yatube::groups", slug = %group.slug, "group deleted");
        Ok(group)
    }
}
