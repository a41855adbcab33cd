use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde::de::DeserializeOwned;

use crate::payloads::ErrorBody;

/// A domain failure on its way out as an HTTP response.
///
/// The original error rides along in the response extensions so the
/// observing middleware can log it with the request method and path.
#[derive(Debug)]
pub struct ApiError {
    error: DomainError,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            error: DomainError::RateLimited,
            retry_after_secs: Some(retry_after_secs),
        }
    }

    pub fn status(&self) -> StatusCode {
        status_of(&self.error)
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self {
            error,
            retry_after_secs: None,
        }
    }
}

pub fn status_of(error: &DomainError) -> StatusCode {
    match error {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) | DomainError::DuplicateUsername | DomainError::DuplicateEmail => {
            StatusCode::CONFLICT
        }
        DomainError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.error {
            DomainError::Internal(_) => "the server encountered a problem".to_string(),
            other => other.to_string(),
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response.extensions_mut().insert(self.error);
        response
    }
}

/// `Json<T>` whose rejections answer in the API's error format.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

fn reject(rejection: JsonRejection) -> ApiError {
    DomainError::Validation(rejection.body_text()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_conflicts_with_specific_messages() {
        let response = ApiError::from(DomainError::DuplicateEmail).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.extensions().get::<DomainError>(),
            Some(&DomainError::DuplicateEmail)
        );
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = ApiError::rate_limited(5).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(status_of(&DomainError::NotFound("post")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(&DomainError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(&DomainError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(&DomainError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(&DomainError::Internal("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
