use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        accounts::AccountError, comments::CommentError, feed::FeedError, follow::FollowError,
        groups::GroupError, posts::PostError,
    },
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

/// Marks a response whose body is the bare public message of an [`HttpError`].
/// The HTTP layer swaps such server errors for the templated error page.
#[derive(Debug, Clone, Copy)]
pub struct UnstyledError;

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response.extensions_mut().insert(UnstyledError);
        response
    }
}

impl HttpError {
    pub fn not_found(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Not found", detail)
    }

    pub fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            error,
        )
    }
}

const SERVICE_ERROR_SOURCE: &str = "application::error::service_error_to_http";

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::UnknownUser(_) | FeedError::UnknownGroup(_) | FeedError::UnknownPost => {
                HttpError::not_found(SERVICE_ERROR_SOURCE, error.to_string())
            }
            FeedError::Repo(err) => HttpError::internal(SERVICE_ERROR_SOURCE, &err),
            FeedError::Follow(err) => HttpError::internal(SERVICE_ERROR_SOURCE, &err),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        HttpError::internal(SERVICE_ERROR_SOURCE, &error)
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        match error {
            PostError::NotFound => HttpError::not_found(SERVICE_ERROR_SOURCE, "post not found"),
            PostError::Invalid(errors) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid post",
                errors.to_string(),
            ),
            PostError::Repo(err) => HttpError::internal(SERVICE_ERROR_SOURCE, &err),
        }
    }
}

impl From<CommentError> for HttpError {
    fn from(error: CommentError) -> Self {
        match error {
            CommentError::UnknownPost => {
                HttpError::not_found(SERVICE_ERROR_SOURCE, "post not found")
            }
            CommentError::Invalid(errors) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid comment",
                errors.to_string(),
            ),
            CommentError::Repo(err) => HttpError::internal(SERVICE_ERROR_SOURCE, &err),
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::Invalid(errors) => HttpError::new(
                SERVICE_ERROR_SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid account details",
                errors.to_string(),
            ),
            other => HttpError::internal(SERVICE_ERROR_SOURCE, &other),
        }
    }
}

/// Failures surfaced by the binary's commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;

    #[test]
    fn unknown_records_map_to_not_found() {
        let response = HttpError::from(FeedError::UnknownGroup("cats".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["unknown group `cats`".to_string()]);
    }

    #[test]
    fn repository_failures_hide_details_from_clients() {
        let error = FeedError::Repo(RepoError::from_persistence("connection reset"));
        let response = HttpError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(
            report
                .messages
                .iter()
                .any(|message| message.contains("connection reset"))
        );
    }
}
