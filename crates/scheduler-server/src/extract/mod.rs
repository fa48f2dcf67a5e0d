//! Request extractors for the HTTP adapter.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use scheduler_core::UserId;

use crate::error::HttpError;

/// Extracts the caller's tenant identity from the `X-User-ID` header.
///
/// This is the adapter's entire notion of identity: there is no token to
/// verify and no session to look up. Whatever string the caller sends
/// becomes the opaque tenant key the scheduler core admits and schedules
/// against.
pub struct RequestUserId(pub UserId);

impl<S> FromRequestParts<S> for RequestUserId
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .ok_or_else(HttpError::missing_user_id)?
            .to_str()
            .map_err(|_| HttpError::bad_request("X-User-ID header is not valid UTF-8"))?;

        if raw.trim().is_empty() {
            return Err(HttpError::bad_request("X-User-ID header must not be empty"));
        }

        Ok(Self(UserId::new(raw)))
    }
}
