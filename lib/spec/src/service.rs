//  SERVICE.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 11:42:09
//  Last edited:
//    18 Oct 2026, 16:18:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the [`IdentityService`] trait, which abstracts over the
//!   remote identity service that resolves session tokens and manages
//!   identities.
//

use std::error::Error;
use std::future::Future;

use http::{HeaderMap, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{Level, debug, span};

use crate::context::{self, Context, ContextError};
use crate::extract::{self, ExtractError};
use crate::models::{Identity, JsonPatch, Provider, Session};


/***** AUXILLARY *****/
/// Extends an [`Error`] with the ability to associate status codes with it.
pub trait HttpError: Error {
    /// Returns the status code associated with this error.
    ///
    /// # Returns
    /// A [`StatusCode`].
    fn status_code(&self) -> StatusCode;
}





/***** ERRORS *****/
/// Defines the errors returned by an [`IdentityService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The address of the identity service could not be resolved. This is a misconfiguration;
    /// retrying won't help.
    #[error("Failed to resolve identity service address {address:?}")]
    Config {
        address: String,
        #[source]
        err:     Box<dyn 'static + Send + Sync + Error>,
    },
    /// The identity service replied with a success status, but not with what we expected.
    #[error("Failed to decode identity service reply to {what}")]
    Decode {
        what: &'static str,
        #[source]
        err:  Box<dyn 'static + Send + Sync + Error>,
    },
    /// The session token could not be extracted from the transport.
    #[error("Failed to extract session token")]
    Extract {
        #[from]
        err: ExtractError,
    },
    /// The session in the context has no identity attached.
    #[error("Session {id:?} has no identity attached")]
    MissingIdentity { id: String },
    /// There is no session in the context to work with.
    #[error("Failed to get session")]
    NoSession {
        #[from]
        err: ContextError,
    },
    /// The identity service explicitly refused the request (e.g., an expired token).
    #[error("Identity service refused to {what} (status {status})")]
    UpstreamRejected { what: &'static str, status: StatusCode, body: String },
    /// The identity service could not be reached.
    #[error("Failed to reach identity service to {what}")]
    UpstreamUnavailable {
        what:   &'static str,
        /// The best-known status; [`StatusCode::INTERNAL_SERVER_ERROR`] if nothing was received.
        status: StatusCode,
        #[source]
        err:    Box<dyn 'static + Send + Sync + Error>,
    },
}
impl HttpError for ServiceError {
    #[inline]
    fn status_code(&self) -> StatusCode {
        use ServiceError::*;
        match self {
            Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Decode { .. } => StatusCode::BAD_GATEWAY,
            Extract { err } => err.status_code(),
            MissingIdentity { .. } | NoSession { .. } => StatusCode::UNAUTHORIZED,
            UpstreamRejected { status, .. } | UpstreamUnavailable { status, .. } => *status,
        }
    }
}





/***** LIBRARY *****/
/// The set of things this library asks from the remote identity service.
///
/// Note that the IdentityService is intended to be shared between concurrent requests. As such,
/// any reference to `self` is done immutably only.
pub trait IdentityService: Send + Sync {
    /// Resolves a session token to the session it identifies.
    ///
    /// # Arguments
    /// - `token`: The (raw) session token, as found in the session cookie.
    ///
    /// # Returns
    /// The [`Session`] identified by the token.
    ///
    /// # Errors
    /// This function errors if the service is misconfigured, unreachable or if it refuses the
    /// token.
    fn whoami(&self, token: &str) -> impl Send + Future<Output = Result<Session, ServiceError>>;

    /// Creates a new identity.
    ///
    /// # Arguments
    /// - `schema_id`: The identity schema the traits adhere to.
    /// - `traits`: The traits of the new identity.
    ///
    /// # Returns
    /// The created [`Identity`].
    fn create_identity(&self, schema_id: &str, traits: Value) -> impl Send + Future<Output = Result<Identity, ServiceError>>;

    /// Fetches an identity by ID, without its credentials.
    fn get_identity(&self, id: &str) -> impl Send + Future<Output = Result<Identity, ServiceError>>;

    /// Fetches an identity by ID, including its OIDC credentials.
    fn get_identity_with_credentials(&self, id: &str) -> impl Send + Future<Output = Result<Identity, ServiceError>>;

    /// Replaces the schema and traits of an identity. The identity is (re)activated.
    fn update_identity(&self, id: &str, schema_id: &str, traits: Value) -> impl Send + Future<Output = Result<Identity, ServiceError>>;

    /// Applies a list of [`JsonPatch`]es to an identity.
    fn patch_identity(&self, id: &str, patches: Vec<JsonPatch>) -> impl Send + Future<Output = Result<Identity, ServiceError>>;

    /// Deletes an identity.
    fn delete_identity(&self, id: &str) -> impl Send + Future<Output = Result<(), ServiceError>>;



    /// Resolves the session of an HTTP request using its session cookie.
    ///
    /// # Errors
    /// This function errors with [`ServiceError::Extract`] if there is no (non-empty) session
    /// cookie, or if [`IdentityService::whoami()`] fails.
    fn session_from_http(&self, headers: &HeaderMap) -> impl Send + Future<Output = Result<Session, ServiceError>> {
        async move {
            let _span = span!(Level::INFO, "IdentityService::session_from_http");
            let token: &str = extract::token_from_headers(headers)?;
            self.whoami(token).await
        }
    }

    /// Resolves the session of an RPC call using the metadata recorded in its context.
    ///
    /// # Errors
    /// This function errors with [`ServiceError::Extract`] if the metadata does not carry a
    /// session token, or if [`IdentityService::whoami()`] fails.
    fn session_from_rpc(&self, ctx: &Context) -> impl Send + Future<Output = Result<Session, ServiceError>> {
        async move {
            let _span = span!(Level::INFO, "IdentityService::session_from_rpc");
            let token: String = extract::token_from_rpc(ctx)?;
            self.whoami(&token).await
        }
    }

    /// Fetches the identity of the session recorded in the context.
    ///
    /// # Errors
    /// This function errors with [`ServiceError::NoSession`] if there is no session in the
    /// context, or if [`IdentityService::get_identity()`] fails.
    fn identity_from_ctx(&self, ctx: &Context) -> impl Send + Future<Output = Result<Identity, ServiceError>> {
        async move {
            let session = context::get_session(ctx)?;
            let id: &str = session.identity_id().ok_or_else(|| ServiceError::MissingIdentity { id: session.id.clone() })?;
            self.get_identity(id).await
        }
    }

    /// Returns the tokens of all OIDC providers linked to the identity of the session recorded in
    /// the context.
    fn tokens(&self, ctx: &Context) -> impl Send + Future<Output = Result<Vec<Provider>, ServiceError>> {
        async move {
            let _span = span!(Level::INFO, "IdentityService::tokens");
            let session = context::get_session(ctx)?;
            let id: &str = session.identity_id().ok_or_else(|| ServiceError::MissingIdentity { id: session.id.clone() })?;
            let identity: Identity = self.get_identity_with_credentials(id).await?;
            let providers: Vec<Provider> = identity.providers();
            debug!("Identity {id:?} has {} linked provider(s)", providers.len());
            Ok(providers)
        }
    }

    /// Returns the tokens of the given OIDC provider linked to the identity of the session
    /// recorded in the context.
    ///
    /// # Returns
    /// The [`Provider`], or [`None`] if the identity isn't linked to it.
    fn token(&self, ctx: &Context, provider: &str) -> impl Send + Future<Output = Result<Option<Provider>, ServiceError>> {
        async move {
            let providers: Vec<Provider> = self.tokens(ctx).await?;
            let found: Option<Provider> = providers.into_iter().find(|p| p.provider == provider);
            if found.is_none() {
                debug!("No provider {provider:?} linked to the session's identity");
            }
            Ok(found)
        }
    }
}
