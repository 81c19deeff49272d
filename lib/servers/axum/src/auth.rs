//  AUTH.rs
//    by Lut99
//
//  Created:
//    23 Oct 2024, 11:58:43
//  Last edited:
//    18 Oct 2026, 18:40:16
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the session resolving middleware.
//

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use specifications::context::{self, Context};
use specifications::{IdentityService, auth_request};
use tracing::{Level, debug, span};


/***** LIBRARY *****/
/// Middleware that resolves the session of every incoming request.
///
/// The resulting [`Context`] is inserted in the request's extensions, where handlers can find it
/// using the [`RequestContext`](crate::RequestContext) or [`Authenticated`](crate::Authenticated)
/// extractors. If the request already carries a [`Context`] (e.g., inserted by an earlier layer),
/// the new bindings are layered on top of it.
///
/// This middleware never rejects a request. Requests without a (valid) session simply end up with
/// a context without one.
///
/// # Example
/// ```rust,ignore
/// let router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(axum::middleware::from_fn_with_state(service, authenticate::<KratosClient>));
/// ```
pub async fn authenticate<S>(State(service): State<Arc<S>>, mut request: Request, next: Next) -> Response
where
    S: 'static + IdentityService,
{
    let _span = span!(Level::INFO, "authenticate", path = request.uri().path());

    // Do the auth thingy
    let parent: Option<Context> = request.extensions().get::<Context>().cloned();
    let ctx: Context = auth_request(service.as_ref(), parent.as_ref(), request.headers()).await;
    debug!("Request has session: {}", context::get_session(&ctx).is_ok());

    // Inject it in the request as an extension; then continue
    request.extensions_mut().insert(ctx);
    next.run(request).await
}
