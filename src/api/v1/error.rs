use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use crate::logger::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::header::{HeaderValue, RETRY_AFTER};
use warp::http::StatusCode;
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let rejection = if let Some(rejection) = err.find::<ApiRejection>() {
        rejection.clone()
    } else if err.is_not_found() {
        ApiRejection::from(ApiErrorCode::NotFound)
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        ApiRejection::from(ApiErrorCode::Unauthorized)
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
        || err.find::<warp::reject::PayloadTooLarge>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        ApiRejection::from(ApiErrorCode::BadRequest)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiRejection::from(ApiErrorCode::MethodNotAllowed)
    } else {
        ApiRejection::from(ApiErrorCode::internal(format!("unhandled rejection: {:?}", err)))
    };

    let body = ApiResponse::<()>::err(
        rejection.code.clone(),
        rejection.code.to_string(),
        rejection.retry_after_secs,
    );
    let mut response =
        warp::reply::with_status(warp::reply::json(&body), rejection.code.status()).into_response();
    if let Some(secs) = rejection.retry_after_secs {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    #[error("Request body is invalid")]
    BadRequest,
    #[error("Request validation failed")]
    ValidationFailed,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Missing or malformed bearer token")]
    Unauthorized,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Account is inactive")]
    AccountInactive,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("User not found")]
    UserNotFound,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Email already verified")]
    AlreadyVerified,
    #[error("Verification token is invalid or expired")]
    InvalidVerificationToken,
    #[error("Account temporarily locked")]
    AccountLocked,
    #[error("Please wait before requesting another email")]
    ResendCooldown,
    #[error("Email verification is not available")]
    VerificationUnavailable,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::BadRequest
            | ApiErrorCode::ValidationFailed
            | ApiErrorCode::InvalidVerificationToken => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::Unauthorized
            | ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::AccountInactive | ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::UserNotFound | ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::UsernameTaken
            | ApiErrorCode::EmailTaken
            | ApiErrorCode::AlreadyVerified => StatusCode::CONFLICT,
            ApiErrorCode::AccountLocked => StatusCode::LOCKED,
            ApiErrorCode::ResendCooldown => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::VerificationUnavailable | ApiErrorCode::ServiceUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What handlers reject with: an error code plus, for lockout and cooldown,
/// how long the client should wait.
#[derive(Debug, Clone)]
pub struct ApiRejection {
    pub code: ApiErrorCode,
    pub retry_after_secs: Option<u64>,
}

impl reject::Reject for ApiRejection {}

impl From<ApiErrorCode> for ApiRejection {
    fn from(code: ApiErrorCode) -> Self {
        ApiRejection {
            code,
            retry_after_secs: None,
        }
    }
}

impl From<AuthError> for ApiRejection {
    fn from(error: AuthError) -> Self {
        let code = match error {
            AuthError::AccountLocked { remaining_secs } => {
                return ApiRejection {
                    code: ApiErrorCode::AccountLocked,
                    retry_after_secs: Some(remaining_secs),
                };
            }
            AuthError::ResendCooldown { remaining_secs } => {
                return ApiRejection {
                    code: ApiErrorCode::ResendCooldown,
                    retry_after_secs: Some(remaining_secs),
                };
            }
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::UserInactive => ApiErrorCode::AccountInactive,
            AuthError::InvalidToken => ApiErrorCode::InvalidToken,
            AuthError::InvalidOrExpiredVerificationToken => ApiErrorCode::InvalidVerificationToken,
            AuthError::AlreadyVerified => ApiErrorCode::AlreadyVerified,
            AuthError::Conflict { field: "email" } => ApiErrorCode::EmailTaken,
            AuthError::Conflict { .. } => ApiErrorCode::UsernameTaken,
            AuthError::UserNotFound => ApiErrorCode::UserNotFound,
            AuthError::Forbidden => ApiErrorCode::Forbidden,
            AuthError::Validation(reason) => {
                debug!("validation failed: {}", reason);
                ApiErrorCode::ValidationFailed
            }
            AuthError::VerificationUnavailable => ApiErrorCode::VerificationUnavailable,
            AuthError::StoreUnavailable(e) => {
                error!("store unavailable: {}", e);
                ApiErrorCode::ServiceUnavailable
            }
            AuthError::Internal(e) => ApiErrorCode::internal(e),
        };
        ApiRejection::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_carries_retry_after() {
        let rejection = ApiRejection::from(AuthError::AccountLocked { remaining_secs: 42 });
        assert_eq!(rejection.code, ApiErrorCode::AccountLocked);
        assert_eq!(rejection.code.status(), StatusCode::LOCKED);
        assert_eq!(rejection.retry_after_secs, Some(42));
    }

    #[test]
    fn conflicts_name_the_field() {
        let email = ApiRejection::from(AuthError::Conflict { field: "email" });
        let username = ApiRejection::from(AuthError::Conflict { field: "username" });
        assert_eq!(email.code, ApiErrorCode::EmailTaken);
        assert_eq!(username.code, ApiErrorCode::UsernameTaken);
    }

    #[test]
    fn store_outage_is_a_503_without_details() {
        let rejection = ApiRejection::from(AuthError::StoreUnavailable("redis down".into()));
        assert_eq!(rejection.code.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!rejection.code.to_string().contains("redis"));
    }

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let json = serde_json::to_string(&ApiErrorCode::InvalidVerificationToken).unwrap();
        assert_eq!(json, "\"INVALID_VERIFICATION_TOKEN\"");
    }
}
