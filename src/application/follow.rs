//! Follow graph: directed user → author subscriptions.
//!
//! All follow-state mutations go through [`FollowService`]. Edges are unique per
//! `(user, author)` pair and self-follow is refused here as well as by the
//! schema's check constraint.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowRejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowStats {
    pub followers: u64,
    pub following: u64,
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>) -> Self {
        Self { follows }
    }

    pub async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<FollowOutcome, FollowError> {
        if user_id == author_id {
            debug!(
                target = "yatube::follow",
                user_id = %user_id,
                "self-follow ignored"
            );
            return Ok(FollowOutcome::SelfFollowRejected);
        }

        let outcome = match self.follows.insert_follow(user_id, author_id).await {
            Ok(true) => FollowOutcome::Created,
            Ok(false) => FollowOutcome::AlreadyFollowing,
            // A concurrent insert of the same pair lost the race; same result.
            Err(RepoError::Duplicate { .. }) => FollowOutcome::AlreadyFollowing,
            Err(err) => return Err(err.into()),
        };

        debug!(
            target = "yatube::follow",
            user_id = %user_id,
            author_id = %author_id,
            outcome = ?outcome,
            "follow"
        );
        Ok(outcome)
    }

    /// Remove the edge if present. Returns whether anything was removed.
    pub async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, FollowError> {
        let removed = self.follows.delete_follow(user_id, author_id).await?;
        debug!(
            target = "yatube::follow",
            user_id = %user_id,
            author_id = %author_id,
            removed,
            "unfollow"
        );
        Ok(removed)
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, FollowError> {
        Ok(self.follows.follow_exists(user_id, author_id).await?)
    }

    pub async fn follower_count(&self, author_id: Uuid) -> Result<u64, FollowError> {
        Ok(self.follows.count_followers(author_id).await?)
    }

    pub async fn following_count(&self, user_id: Uuid) -> Result<u64, FollowError> {
        Ok(self.follows.count_following(user_id).await?)
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<FollowStats, FollowError> {
        Ok(FollowStats {
            followers: self.follower_count(user_id).await?,
            following: self.following_count(user_id).await?,
        })
    }

    /// Follow flag for an optional viewer; anonymous viewers follow no one.
    pub async fn viewer_follows(
        &self,
        viewer: Option<Uuid>,
        author_id: Uuid,
    ) -> Result<bool, FollowError> {
        match viewer {
            Some(user_id) if user_id != author_id => self.is_following(user_id, author_id).await,
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MemoryFollows {
        edges: Mutex<HashSet<(Uuid, Uuid)>>,
    }

    #[async_trait]
    impl FollowsRepo for MemoryFollows {
        async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
            Ok(self.edges.lock().unwrap().insert((user_id, author_id)))
        }

        async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
            Ok(self.edges.lock().unwrap().remove(&(user_id, author_id)))
        }

        async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
            Ok(self.edges.lock().unwrap().contains(&(user_id, author_id)))
        }

        async fn count_followers(&self, author_id: Uuid) -> Result<u64, RepoError> {
            let edges = self.edges.lock().unwrap();
            Ok(edges.iter().filter(|(_, author)| *author == author_id).count() as u64)
        }

        async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError> {
            let edges = self.edges.lock().unwrap();
            Ok(edges.iter().filter(|(user, _)| *user == user_id).count() as u64)
        }
    }

    /// Reports every insert as a lost race on the unique constraint.
    struct RacingFollows;

    #[async_trait]
    impl FollowsRepo for RacingFollows {
        async fn insert_follow(&self, _user_id: Uuid, _author_id: Uuid) -> Result<bool, RepoError> {
            Err(RepoError::Duplicate {
                constraint: "follows_user_author_key".to_string(),
            })
        }

        async fn delete_follow(&self, _user_id: Uuid, _author_id: Uuid) -> Result<bool, RepoError> {
            Ok(false)
        }

        async fn follow_exists(&self, _user_id: Uuid, _author_id: Uuid) -> Result<bool, RepoError> {
            Ok(true)
        }

        async fn count_followers(&self, _author_id: Uuid) -> Result<u64, RepoError> {
            Ok(1)
        }

        async fn count_following(&self, _user_id: Uuid) -> Result<u64, RepoError> {
            Ok(1)
        }
    }

    fn service() -> FollowService {
        FollowService::new(Arc::new(MemoryFollows::default()))
    }

    #[tokio::test]
    async fn repeated_follow_keeps_a_single_edge() {
        let follows = service();
        let (reader, author) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(
            follows.follow(reader, author).await.unwrap(),
            FollowOutcome::Created
        );
        assert_eq!(
            follows.follow(reader, author).await.unwrap(),
            FollowOutcome::AlreadyFollowing
        );

        assert!(follows.is_following(reader, author).await.unwrap());
        assert_eq!(follows.follower_count(author).await.unwrap(), 1);
        assert_eq!(follows.following_count(reader).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn self_follow_is_refused_without_touching_storage() {
        let follows = service();
        let user = Uuid::new_v4();

        assert_eq!(
            follows.follow(user, user).await.unwrap(),
            FollowOutcome::SelfFollowRejected
        );
        assert!(!follows.is_following(user, user).await.unwrap());
        assert_eq!(follows.stats(user).await.unwrap(), FollowStats::default());
    }

    #[tokio::test]
    async fn unfollow_reports_whether_an_edge_went_away() {
        let follows = service();
        let (reader, author) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(!follows.unfollow(reader, author).await.unwrap());

        follows.follow(reader, author).await.unwrap();
        assert!(follows.unfollow(reader, author).await.unwrap());
        assert!(!follows.is_following(reader, author).await.unwrap());
        assert_eq!(follows.follower_count(author).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn edges_are_directed() {
        let follows = service();
        let (reader, author) = (Uuid::new_v4(), Uuid::new_v4());

        follows.follow(reader, author).await.unwrap();

        assert!(!follows.is_following(author, reader).await.unwrap());
        assert_eq!(
            follows.stats(author).await.unwrap(),
            FollowStats {
                followers: 1,
                following: 0
            }
        );
    }

    #[tokio::test]
    async fn lost_insert_race_counts_as_already_following() {
        let follows = FollowService::new(Arc::new(RacingFollows));

        assert_eq!(
            follows.follow(Uuid::new_v4(), Uuid::new_v4()).await.unwrap(),
            FollowOutcome::AlreadyFollowing
        );
    }

    #[tokio::test]
    async fn anonymous_and_self_viewers_follow_no_one() {
        let follows = service();
        let (reader, author) = (Uuid::new_v4(), Uuid::new_v4());
        follows.follow(reader, author).await.unwrap();

        assert!(!follows.viewer_follows(None, author).await.unwrap());
        assert!(!follows.viewer_follows(Some(author), author).await.unwrap());
        assert!(follows.viewer_follows(Some(reader), author).await.unwrap());
    }
}
