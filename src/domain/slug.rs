//! Group slug derivation.
//!
//! `slug::slugify` transliterates non-ASCII titles (Cyrillic, CJK, accents)
//! before lowercasing and hyphenating, so "Мускул-кары" becomes
//! `muskul-kary`. Slugs are capped at the column width of `groups.slug`.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

use super::validation::GROUP_SLUG_MAX_LEN;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a slug from a group title.
pub fn derive_group_slug(title: &str) -> Result<String, SlugError> {
    if title.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = truncate(&slugify(title), GROUP_SLUG_MAX_LEN);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: title.to_string(),
        });
    }

    Ok(candidate)
}

/// Derive a slug that the async `is_free` predicate accepts, suffixing `-2`,
/// `-3`, ... on collisions. Suffixed candidates still fit the column.
pub async fn unique_group_slug<F, Fut, E>(
    title: &str,
    mut is_free: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_group_slug(title)?;

    if is_free(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let suffix = format!("-{attempt}");
        let stem = truncate(&base, GROUP_SLUG_MAX_LEN - suffix.len());
        let candidate = format!("{stem}{suffix}");
        if is_free(&candidate).await.map_err(SlugAsyncError::Predicate)? {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn truncate(slug: &str, max: usize) -> String {
    let cut: String = slug.chars().take(max).collect();
    cut.trim_end_matches('-').to_string()
}
