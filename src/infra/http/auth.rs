//! Session cookies, viewer extractors and the account pages.

use std::convert::Infallible;

use axum::{
    Form,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;

use crate::application::accounts::{AccountError, IssuedSession};
use crate::application::error::HttpError;
use crate::domain::entities::UserRecord;
use crate::domain::validation::{FieldErrors, SignupInput};
use crate::presentation::views::{
    LayoutChrome, LayoutContext, LoginTemplate, LoginView, SignupTemplate, SignupView,
    render_template_response,
};

use super::public::HttpState;

pub const SESSION_COOKIE: &str = "yatube_session";

const LOGIN_PATH: &str = "/auth/login/";

/// The signed-in user, if any. Filled in by the `load_viewer` middleware.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|user| user.id)
    }

    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome::for_viewer(self.user())
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// A signed-in user. Anonymous requests are sent to the login page with a
/// `next` parameter pointing back at the requested path.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>().and_then(|viewer| viewer.0.clone()) {
            Some(user) => Ok(Self(user)),
            None => Err(login_redirect(&parts.uri)),
        }
    }
}

pub(super) fn login_redirect(uri: &Uri) -> Response {
    let next = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("{LOGIN_PATH}?next={}", encoded.replace("%2F", "/"))).into_response()
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

fn session_cookie(session: &IssuedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(session.expires_at)
        .build()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: String,
}

pub(super) async fn login_page(viewer: Viewer, Query(query): Query<NextQuery>) -> Response {
    let next = query.next.unwrap_or_default();
    render_login(&viewer, "", &next, &FieldErrors::new())
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&form.username, &form.password).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&session, state.secure_cookies));
            (jar, Redirect::to(safe_next(&form.next))).into_response()
        }
        Err(AccountError::Invalid(errors)) => {
            render_login(&viewer, &form.username, &form.next, &errors)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_login(viewer: &Viewer, username: &str, next: &str, errors: &FieldErrors) -> Response {
    let view = LayoutContext::new(viewer.chrome(), "Log in", LoginView::new(username, next, errors));
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password1: String,
    password2: String,
}

pub(super) async fn signup_page(viewer: Viewer) -> Response {
    render_signup(&viewer, &SignupForm::default(), &FieldErrors::new())
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    viewer: Viewer,
    Form(form): Form<SignupForm>,
) -> Response {
    let input = SignupInput {
        username: &form.username,
        email: &form.email,
        first_name: &form.first_name,
        last_name: &form.last_name,
        password1: &form.password1,
        password2: &form.password2,
    };

    match state.accounts.signup(&input).await {
        Ok(_) => Redirect::to(LOGIN_PATH).into_response(),
        Err(AccountError::Invalid(errors)) => render_signup(&viewer, &form, &errors),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_signup(viewer: &Viewer, form: &SignupForm, errors: &FieldErrors) -> Response {
    let content = SignupView::new(
        [
            form.first_name.as_str(),
            form.last_name.as_str(),
            form.username.as_str(),
            form.email.as_str(),
        ],
        errors,
    );
    let view = LayoutContext::new(viewer.chrome(), "Sign up", content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return HttpError::from(err).into_response();
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/")).into_response()
}
