//  EXTRACT.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 18:44:02
//  Last edited:
//    18 Oct 2026, 19:10:38
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements extractors that give handlers access to what the
//!   [`authenticate`](crate::authenticate()) middleware resolved.
//

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use error_trace::ErrorTrace as _;
use specifications::context::{self, Context};
use specifications::models::Session;
use specifications::{HttpError, ServiceError};
use thiserror::Error;
use tracing::info;


/***** ERRORS *****/
/// Simple wrapper for erroring and freezing the result.
#[derive(Debug, Error)]
enum Error<E> {
    #[error("Failed to authenticate incoming request")]
    AuthenticateFailed {
        #[source]
        err: E,
    },
}
impl<E: 'static + HttpError> HttpError for Error<E> {
    #[inline]
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticateFailed { err } => err.status_code(),
        }
    }
}





/***** HELPERS *****/
/// Returns the context recorded by the middleware, or a root context if it didn't run.
#[inline]
fn context_of(parts: &Parts) -> Context { parts.extensions.get::<Context>().cloned().unwrap_or_default() }





/***** LIBRARY *****/
/// Turns any [`HttpError`] into a response with its status code and a JSON trace of the error as
/// body.
#[derive(Debug)]
pub struct ServiceRejection<E> {
    err: E,
}
impl<E> ServiceRejection<E> {
    /// Constructor for the ServiceRejection.
    #[inline]
    pub fn new(err: E) -> Self { Self { err } }

    /// Returns the error that caused the rejection.
    #[inline]
    pub fn error(&self) -> &E { &self.err }
}
impl<E: 'static + HttpError> IntoResponse for ServiceRejection<E> {
    fn into_response(self) -> Response {
        let err = Error::AuthenticateFailed { err: self.err };
        info!("{}", err.trace());
        let status: StatusCode = err.status_code();
        match serde_json::to_string(&err.freeze()) {
            Ok(body) => (status, [(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(_) => (status, err.to_string()).into_response(),
        }
    }
}



/// Extracts the [`Context`] of the request.
///
/// If the [`authenticate`](crate::authenticate()) middleware did not run, this is an empty
/// context.
#[derive(Clone, Debug)]
pub struct RequestContext(pub Context);
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    #[inline]
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> { Ok(Self(context_of(parts))) }
}

/// Extracts the [`Session`] of the request, rejecting the request with 401 UNAUTHORIZED if it has
/// none.
///
/// Use `Option<Authenticated>` for handlers that serve both anonymous and authenticated users.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Arc<Session>);
impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ServiceRejection<ServiceError>;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context::get_session(&context_of(parts)).map(Self).map_err(|err| ServiceRejection::new(ServiceError::from(err)))
    }
}
impl<S: Send + Sync> OptionalFromRequestParts<S> for Authenticated {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(context::get_session(&context_of(parts)).ok().map(Self))
    }
}
