//  EXTRACT.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 11:05:27
//  Last edited:
//    18 Oct 2026, 15:51:44
//  Auto updated?
//    Yes
//
//  Description:
//!   Pulls the session token out of the transport it arrived on: the
//!   `Cookie`-header of an HTTP request, or the metadata of an RPC call.
//

use cookie::Cookie;
use http::header::COOKIE;
use http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::context::{self, Context};
use crate::metadata::Metadata;
use crate::service::HttpError;


/***** CONSTANTS *****/
/// The name of the cookie carrying the session token. Also used as the RPC metadata key.
pub const COOKIE_NAME: &str = "ory_kratos_session";





/***** ERRORS *****/
/// How an [`ExtractError`] should be treated by callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtractErrorKind {
    /// The request carries no (usable) credential.
    Unauthorized,
    /// The expected credential location does not exist.
    NotFound,
}

/// Defines errors originating from extracting a session token from a transport.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The session cookie was not sent.
    #[error("Missing cookie {name:?} in request")]
    CookieNotFound { name: &'static str },
    /// The session cookie was sent, but it was empty.
    #[error("Cookie {name:?} in request is empty")]
    CookieEmpty { name: &'static str },
    /// The call context carried no incoming metadata at all.
    #[error("Cannot get metadata from context")]
    MetadataNotFound,
    /// The incoming metadata had no entry for the session key.
    #[error("Missing metadata {key:?} in call")]
    MetadataKeyNotFound { key: &'static str },
    /// The incoming metadata had an entry for the session key, but no (non-empty) value.
    #[error("Metadata {key:?} exists but has no value")]
    MetadataEmpty { key: &'static str },
}
impl ExtractError {
    /// Classifies this error.
    #[inline]
    pub fn kind(&self) -> ExtractErrorKind {
        use ExtractError::*;
        match self {
            CookieNotFound { .. } | CookieEmpty { .. } => ExtractErrorKind::Unauthorized,
            MetadataNotFound | MetadataKeyNotFound { .. } | MetadataEmpty { .. } => ExtractErrorKind::NotFound,
        }
    }
}
impl HttpError for ExtractError {
    #[inline]
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ExtractErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ExtractErrorKind::NotFound => StatusCode::NOT_FOUND,
        }
    }
}





/***** HELPER FUNCTIONS *****/
/// Strips one pair of surrounding double quotes off a cookie value (RFC 6265 allows them).
#[inline]
fn unquote(value: &str) -> &str {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => value,
    }
}





/***** LIBRARY *****/
/// Finds the session token in the `Cookie`-headers of an HTTP request.
///
/// If the cookie occurs multiple times, the first occurrence is used. Header values that are not
/// valid UTF-8 are ignored.
///
/// # Arguments
/// - `headers`: The [`HeaderMap`] of the request.
///
/// # Returns
/// The (non-empty) value of the [`COOKIE_NAME`] cookie.
///
/// # Errors
/// This function errors if the cookie is absent or empty. Both are
/// [`ExtractErrorKind::Unauthorized`].
pub fn token_from_headers(headers: &HeaderMap) -> Result<&str, ExtractError> {
    for header in headers.get_all(COOKIE) {
        let raw: &str = match header.to_str() {
            Ok(raw) => raw,
            Err(err) => {
                debug!("Skipping non-UTF-8 {COOKIE} header: {err}");
                continue;
            },
        };
        for cookie in Cookie::split_parse(raw) {
            let Ok(cookie) = cookie else { continue };
            if cookie.name() != COOKIE_NAME {
                continue;
            }
            let value: &str = unquote(cookie.value_raw().unwrap_or_default());
            if value.is_empty() {
                return Err(ExtractError::CookieEmpty { name: COOKIE_NAME });
            }
            return Ok(value);
        }
    }
    Err(ExtractError::CookieNotFound { name: COOKIE_NAME })
}

/// Finds the session token in the metadata of an incoming RPC call.
///
/// Only the first value sent for [`COOKIE_NAME`] is considered.
///
/// # Arguments
/// - `metadata`: The [`Metadata`] of the call, if the call had any.
///
/// # Errors
/// This function errors if there is no metadata, no entry for the key, or if the first value
/// is missing or empty. All of these are [`ExtractErrorKind::NotFound`].
pub fn token_from_metadata(metadata: Option<&Metadata>) -> Result<&str, ExtractError> {
    let md: &Metadata = metadata.ok_or(ExtractError::MetadataNotFound)?;
    let values: &[String] = md.get(COOKIE_NAME).ok_or(ExtractError::MetadataKeyNotFound { key: COOKIE_NAME })?;
    match values.first() {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(ExtractError::MetadataEmpty { key: COOKIE_NAME }),
    }
}

/// Finds the session token in the RPC metadata recorded in the given context.
///
/// See [`token_from_metadata()`] for the rules. The metadata must have been recorded with
/// [`set_metadata()`](context::set_metadata()) first, or with [`set_metadata_from_rpc()`] when the
/// `tonic` feature is enabled.
pub fn token_from_rpc(ctx: &Context) -> Result<String, ExtractError> {
    let md = context::get_metadata(ctx);
    token_from_metadata(md.as_deref()).map(String::from)
}

/// Extracts the session token from an HTTP request and records it in the context.
///
/// # Arguments
/// - `ctx`: The [`Context`] to derive from. If [`None`], a root context is used instead.
/// - `headers`: The [`HeaderMap`] of the request.
///
/// # Errors
/// This function errors if [`token_from_headers()`] does.
pub fn set_cookie_from_http(ctx: Option<&Context>, headers: &HeaderMap) -> Result<Context, ExtractError> {
    let token: &str = token_from_headers(headers)?;
    Ok(context::set_cookie(ctx, token))
}

/// Records the metadata of an incoming [`tonic`] call in the context.
///
/// # Arguments
/// - `ctx`: The [`Context`] to derive from. If [`None`], a root context is used instead.
/// - `request`: The incoming [`tonic::Request`].
///
/// # Returns
/// A new [`Context`] with the (ASCII) metadata of the call bound.
#[cfg(feature = "tonic")]
pub fn set_metadata_from_rpc<T>(ctx: Option<&Context>, request: &tonic::Request<T>) -> Context {
    context::set_metadata(ctx, Some(Metadata::from(request.metadata())))
}





/***** TESTS *****/
