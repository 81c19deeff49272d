//  AUTHN.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 12:10:33
//  Last edited:
//    18 Oct 2026, 16:34:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the best-effort authentication of an HTTP request into a
//!   [`Context`].
//

use std::sync::Arc;

use http::HeaderMap;
use tracing::{Level, debug, info, span};

use crate::context::{self, Context};
use crate::extract;
use crate::service::IdentityService;


/***** LIBRARY *****/
/// Resolves the session of an HTTP request and records it in a context.
///
/// This never fails. Instead, every problem (no cookie, service unreachable, token refused, ...)
/// is logged and results in a context without a session. Handlers that need a session must check
/// for one with [`get_session()`](context::get_session()).
///
/// # Arguments
/// - `service`: The [`IdentityService`] used to resolve the session token.
/// - `ctx`: The [`Context`] to derive from. If [`None`], a root context is used instead.
/// - `headers`: The [`HeaderMap`] of the request.
///
/// # Returns
/// A new [`Context`]. If the request carried a session cookie, its value is recorded in it. If
/// that value resolved to a session, the session is recorded as well.
pub async fn auth_request<S>(service: &S, ctx: Option<&Context>, headers: &HeaderMap) -> Context
where
    S: ?Sized + IdentityService,
{
    let _span = span!(Level::INFO, "auth_request");
    let ctx: Context = ctx.cloned().unwrap_or_default();

    // Fetch the cookie from the request
    let ctx: Context = match extract::set_cookie_from_http(Some(&ctx), headers) {
        Ok(ctx) => ctx,
        Err(err) => {
            info!("Get session cookie from HTTP request failed: {err}");
            return ctx;
        },
    };

    // Resolve it
    let token: String = context::get_cookie(&ctx);
    debug!("Resolving session token with the identity service...");
    match service.whoami(&token).await {
        Ok(session) => {
            debug!("Resolved session {:?} (active: {})", session.id, session.is_active());
            context::set_session(Some(&ctx), Some(Arc::new(session)))
        },
        Err(err) => {
            info!("Get session from identity service failed: {err}");
            ctx
        },
    }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use http::header::COOKIE;
    use http::{HeaderValue, StatusCode};
    use serde_json::Value;

    use super::*;
    use crate::context::{ContextError, get_cookie, get_session};
    use crate::metadata::Metadata;
    use crate::models::{Identity, JsonPatch, Session};
    use crate::service::ServiceError;

    /// Resolves tokens from a fixed map; everything else is refused.
    struct MockService {
        sessions: HashMap<String, Session>,
    }
    impl MockService {
        fn rejected(what: &'static str) -> ServiceError { ServiceError::UpstreamRejected { what, status: StatusCode::UNAUTHORIZED, body: String::new() } }
    }
    impl IdentityService for MockService {
        async fn whoami(&self, token: &str) -> Result<Session, ServiceError> {
            self.sessions.get(token).cloned().ok_or_else(|| Self::rejected("get session"))
        }

        async fn create_identity(&self, _schema_id: &str, _traits: Value) -> Result<Identity, ServiceError> { Err(Self::rejected("create identity")) }

        async fn get_identity(&self, id: &str) -> Result<Identity, ServiceError> { Ok(Identity { id: id.into(), ..Default::default() }) }

        async fn get_identity_with_credentials(&self, id: &str) -> Result<Identity, ServiceError> { self.get_identity(id).await }

        async fn update_identity(&self, _id: &str, _schema_id: &str, _traits: Value) -> Result<Identity, ServiceError> {
            Err(Self::rejected("update identity"))
        }

        async fn patch_identity(&self, _id: &str, _patches: Vec<JsonPatch>) -> Result<Identity, ServiceError> { Err(Self::rejected("patch identity")) }

        async fn delete_identity(&self, _id: &str) -> Result<(), ServiceError> { Err(Self::rejected("delete identity")) }
    }

    fn active_session() -> Session {
        let now = Utc::now();
        Session {
            id: "0c7e8a52-7c2f-4a3e-9d6e-3b1f0f6a2b11".into(),
            active: Some(true),
            identity: Some(Identity { id: "d3b4e6a0-1111-4222-8333-944455566677".into(), ..Default::default() }),
            issued_at: Some(now),
            expires_at: Some(now + Duration::hours(1)),
            authenticated_at: Some(now),
            ..Default::default()
        }
    }

    fn mock() -> MockService { MockService { sessions: HashMap::from([("valid-token".to_string(), active_session())]) } }

    fn with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("ory_kratos_session={value}")).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_auth_request_with_valid_token() {
        let service = mock();
        let expected: Session = service.sessions["valid-token"].clone();

        let ctx = auth_request(&service, None, &with_cookie("valid-token")).await;
        assert_eq!(get_cookie(&ctx), "valid-token");
        assert_eq!(*get_session(&ctx).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_auth_request_with_refused_token() {
        let ctx = auth_request(&mock(), None, &with_cookie("expired-token")).await;
        assert_eq!(get_cookie(&ctx), "expired-token");
        assert!(matches!(get_session(&ctx), Err(ContextError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_auth_request_without_cookie() {
        let root = context::set_address(None, "http://kratos:4433");
        let ctx = auth_request(&mock(), Some(&root), &HeaderMap::new()).await;
        assert!(ctx.ptr_eq(&root));
        assert_eq!(get_cookie(&ctx), "");
        assert!(get_session(&ctx).is_err());
    }

    #[tokio::test]
    async fn test_auth_request_with_empty_cookie() {
        let ctx = auth_request(&mock(), None, &with_cookie("")).await;
        assert_eq!(ctx.depth(), 0);
    }

    #[tokio::test]
    async fn test_provided_methods() {
        let service = mock();
        assert_eq!(service.session_from_http(&with_cookie("valid-token")).await.unwrap().id, active_session().id);
        assert!(matches!(service.session_from_http(&HeaderMap::new()).await, Err(ServiceError::Extract { .. })));

        let md: Metadata = [("ory_kratos_session", "valid-token")].into_iter().collect();
        let rpc = context::set_metadata(None, Some(md));
        assert_eq!(service.session_from_rpc(&rpc).await.unwrap().id, active_session().id);
        let err = service.session_from_rpc(&Context::background()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Extract { .. }));
        assert_eq!(crate::service::HttpError::status_code(&err), StatusCode::NOT_FOUND);
        let md: Metadata = [("ory_kratos_session", "")].into_iter().collect();
        let rpc = context::set_metadata(None, Some(md));
        assert!(matches!(service.session_from_rpc(&rpc).await, Err(ServiceError::Extract { .. })));

        let ctx = auth_request(&service, None, &with_cookie("valid-token")).await;
        assert_eq!(service.identity_from_ctx(&ctx).await.unwrap().id, "d3b4e6a0-1111-4222-8333-944455566677");
        assert!(service.tokens(&ctx).await.unwrap().is_empty());
        assert_eq!(service.token(&ctx, "github").await.unwrap(), None);

        let err = service.identity_from_ctx(&Context::background()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NoSession { .. }));
        assert_eq!(crate::service::HttpError::status_code(&err), StatusCode::UNAUTHORIZED);
    }
}
