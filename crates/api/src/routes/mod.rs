//! HTTP route handlers.

pub mod bookings;
pub mod checkouts;
pub mod handoff;
pub mod health;
pub mod metrics;
pub mod reconciliations;
pub mod search;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::BookingRef;
use saga::{Caller, CallerRole};

use crate::error::ApiError;

/// Role header set by the authenticating proxy. Missing means customer.
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller, read from the request headers.
#[derive(Debug, Clone)]
pub struct CallerHeader(pub Caller);

impl<S> FromRequestParts<S> for CallerHeader
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .map(|v| {
                    v.to_str()
                        .map(str::to_string)
                        .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text")))
                })
                .transpose()
        };

        let role = match header(CALLER_ROLE_HEADER)? {
            Some(raw) => raw.parse::<CallerRole>().map_err(ApiError::BadRequest)?,
            None => CallerRole::Customer,
        };

        let mut caller = Caller::new(role);
        if let Some(user_id) = header(USER_ID_HEADER)? {
            caller = caller.with_user_id(user_id);
        }
        Ok(CallerHeader(caller))
    }
}

pub(crate) fn parse_ref(raw: &str) -> Result<BookingRef, ApiError> {
    BookingRef::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}
