use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::Claims;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Every route lives under `auth/`; the caller mounts them below `api/v1`.
pub fn routes(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::path("refresh")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(optional_bearer_token())
        .and(with(auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(bearer_token())
        .and(with(auth_service.clone()))
        .and_then(handler::logout);

    let logout_all = warp::path("logout-all")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_auth(auth_service.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::logout_all);

    let sessions = warp::path("sessions")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_auth(auth_service.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::sessions);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_auth(auth_service.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::me);

    let verify_email = warp::path("verify-email")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::verify_email);

    let resend_verification = warp::path("resend-verification")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_auth(auth_service.clone()))
        .and(with(auth_service))
        .and_then(handler::resend_verification);

    warp::path("auth").and(
        register
            .or(login)
            .or(refresh)
            .or(logout)
            .or(logout_all)
            .or(sessions)
            .or(me)
            .or(verify_email)
            .or(resend_verification),
    )
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// The token of an `Authorization: Bearer <token>` value, if well formed.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        None
    } else {
        Some(token)
    }
}

/// Raw bearer token; a missing or malformed header is rejected as unauthorized
/// before the request reaches the service.
fn bearer_token() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(
        |header: Option<String>| async move {
            header
                .as_deref()
                .and_then(parse_bearer)
                .map(str::to_string)
                .ok_or_else(|| reject::custom(ApiRejection::from(ApiErrorCode::Unauthorized)))
        },
    )
}

fn optional_bearer_token() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone
{
    warp::header::optional::<String>("authorization").map(
        |header: Option<String>| header.as_deref().and_then(parse_bearer).map(str::to_string),
    )
}

fn with_auth(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Claims,), Error = warp::Rejection> + Clone {
    bearer_token().and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            auth_service
                .authenticate(&token)
                .await
                .map_err(ApiRejection::from)
                .map_err(reject::custom)
        }
    })
}
