//! The post form arrives either as multipart (with an optional image) or as
//! a plain urlencoded body.

use axum::{
    Form,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use bytes::Bytes;
use serde::Deserialize;

use crate::application::error::HttpError;

const SOURCE: &str = "infra::http::forms::PostForm";

#[derive(Debug, Clone)]
pub(super) struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub(super) struct PostForm {
    pub text: String,
    pub group: Option<String>,
    /// `None` when no file was chosen.
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFields {
    text: String,
    group: Option<String>,
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            read_multipart(multipart)
                .await
                .map_err(IntoResponse::into_response)
        } else {
            let Form(fields) = Form::<PostFields>::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self {
                text: fields.text,
                group: fields.group,
                image: None,
            })
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<PostForm, HttpError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => form.text = field.text().await.map_err(multipart_error)?,
            "group" => form.group = Some(field.text().await.map_err(multipart_error)?),
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                // Browsers submit an empty, unnamed part for an untouched file input.
                if !filename.is_empty() || !data.is_empty() {
                    form.image = Some(ImageUpload { filename, data });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> HttpError {
    HttpError::new(SOURCE, err.status(), "Invalid form submission", err.body_text())
}
