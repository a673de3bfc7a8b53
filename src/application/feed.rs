//! Post listings: the site index, group and profile pages, the following feed
//! and the single-post view.

use std::num::NonZeroU32;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::follow::{FollowError, FollowService, FollowStats};
use crate::application::pagination::{Page, PageRequest, Paginator};
use crate::application::repos::{
    CommentsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown user `{0}`")]
    UnknownUser(String),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("post not found")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Follow(#[from] FollowError),
}

const DEFAULT_INDEX_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(15).unwrap();
const DEFAULT_GROUP_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();
const DEFAULT_PROFILE_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(5).unwrap();
const DEFAULT_FOLLOW_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Page size of each listing.
#[derive(Debug, Clone, Copy)]
pub struct PageSizes {
    pub index: NonZeroU32,
    pub group: NonZeroU32,
    pub profile: NonZeroU32,
    pub follow: NonZeroU32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX_PAGE_SIZE,
            group: DEFAULT_GROUP_PAGE_SIZE,
            profile: DEFAULT_PROFILE_PAGE_SIZE,
            follow: DEFAULT_FOLLOW_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub posts: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: UserRecord,
    pub stats: FollowStats,
    pub following: bool,
    pub is_self: bool,
    pub posts: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
    pub stats: FollowStats,
    pub following: bool,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: FollowService,
    sizes: PageSizes,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: FollowService,
        sizes: PageSizes,
    ) -> Self {
        Self {
            posts,
            users,
            groups,
            comments,
            follows,
            sizes,
        }
    }

    pub fn page_sizes(&self) -> PageSizes {
        self.sizes
    }

    /// Page number `request` resolves to on the index, without loading posts.
    pub async fn resolve_index_page(&self, request: PageRequest) -> Result<u64, FeedError> {
        let total = self.posts.count_posts(PostFilter::All).await?;
        Ok(Paginator::new(self.sizes.index).resolve(request, total))
    }

    /// Every post, newest first.
    pub async fn index(&self, request: PageRequest) -> Result<Page<PostRecord>, FeedError> {
        self.listing(PostFilter::All, self.sizes.index, request).await
    }

    pub async fn group_posts(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<GroupListing, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;

        let posts = self
            .listing(PostFilter::Group(group.id), self.sizes.group, request)
            .await?;

        Ok(GroupListing { group, posts })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        request: PageRequest,
    ) -> Result<ProfileListing, FeedError> {
        let author = self.require_user(username).await?;
        let posts = self
            .listing(PostFilter::Author(author.id), self.sizes.profile, request)
            .await?;
        let stats = self.follows.stats(author.id).await?;
        let following = self.follows.viewer_follows(viewer, author.id).await?;

        Ok(ProfileListing {
            is_self: viewer == Some(author.id),
            author,
            stats,
            following,
            posts,
        })
    }

    /// Posts by every author `user_id` follows, newest first. The follow
    /// relation is resolved inside the same query as the post selection.
    pub async fn following_feed(
        &self,
        user_id: Uuid,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, FeedError> {
        self.listing(PostFilter::FollowedBy(user_id), self.sizes.follow, request)
            .await
    }

    pub async fn post_detail(
        &self,
        username: &str,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<PostDetail, FeedError> {
        let post = self.require_post(username, post_id).await?;
        let comments = self.comments.list_comments(post.id).await?;
        let author_post_count = self
            .posts
            .count_posts(PostFilter::Author(post.author.id))
            .await?;
        let stats = self.follows.stats(post.author.id).await?;
        let following = self.follows.viewer_follows(viewer, post.author.id).await?;

        Ok(PostDetail {
            post,
            comments,
            author_post_count,
            stats,
            following,
        })
    }

    /// Load a post addressed as `/{username}/{post_id}/`; the author must match.
    pub async fn require_post(&self, username: &str, post_id: Uuid) -> Result<PostRecord, FeedError> {
        match self.posts.find_post(post_id).await? {
            Some(post) if post.author.username == username => Ok(post),
            _ => Err(FeedError::UnknownPost),
        }
    }

    pub async fn require_user(&self, username: &str) -> Result<UserRecord, FeedError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownUser(username.to_string()))
    }

    async fn listing(
        &self,
        filter: PostFilter,
        per_page: NonZeroU32,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, FeedError> {
        let paginator = Paginator::new(per_page);
        let total = self.posts.count_posts(filter).await?;
        let number = paginator.resolve(request, total);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(filter, paginator.window(number))
                .await?
        };
        Ok(paginator.page(number, total, items))
    }
}
