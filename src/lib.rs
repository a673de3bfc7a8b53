//! Yatube: a small social blogging service with posts, topical groups,
//! comments and author subscriptions.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
