//! Application services layer: repository traits and the use cases built on them.

pub mod accounts;
pub mod comments;
pub mod error;
pub mod feed;
pub mod follow;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod repos;
