use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::{ErrorReport, UnstyledError};
use crate::presentation::views::render_server_error_response;

use super::auth::{SESSION_COOKIE, Viewer};
use super::public::HttpState;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the session cookie once per request and expose the result as a
/// [`Viewer`] on both the request and the response.
pub async fn load_viewer(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.accounts.authenticate(cookie.value()).await {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    target = "yatube::http::auth",
                    error = %err,
                    "session lookup failed; treating request as anonymous"
                );
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Viewer(user.clone()));
    let mut response = next.run(request).await;
    response.extensions_mut().insert(Viewer(user));
    response
}

/// Swap the plain-text body of a failed handler for the error page, keeping
/// the status and the attached report.
pub async fn render_error_pages(viewer: Viewer, request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let unstyled = response.extensions_mut().remove::<UnstyledError>().is_some();
    if !unstyled || !response.status().is_server_error() {
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let mut page = render_server_error_response(viewer.chrome(), response.status());
    if let Some(report) = report {
        report.attach(&mut page);
    }
    page
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let viewer = response
            .extensions()
            .get::<Viewer>()
            .and_then(|viewer| viewer.0.as_ref())
            .map(|user| user.username.clone())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "client request error",
            );
        }
    }

    response
}
