//  MAIN.rs
//    by Lut99
//
//  Created:
//    11 Nov 2024, 12:20:52
//  Last edited:
//    18 Oct 2026, 19:58:32
//  Auto updated?
//    Yes
//
//  Description:
//!   Shows a small server that tells callers who they are, according to an
//!   Ory Kratos identity service.
//

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use error_trace::trace;
use serde_json::{Value, json};
use session_context::clients::kratos::{Conn, KratosClient};
use session_context::clients::static_::StaticIdentityService;
use session_context::servers::axum::{Authenticated, RequestContext, authenticate};
use session_context::spec::models::{Identity, Session};
use session_context::spec::{IdentityService, context};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{Level, debug, error, info, warn};


/***** ARGUMENTS *****/
/// Defines the arguments for this binary.
#[derive(Debug, Parser)]
struct Arguments {
    /// Whether to enable INFO- and DEBUG-level logging.
    #[clap(long)]
    debug: bool,
    /// Whether to enable TRACE-level logging. Implies '--debug'.
    #[clap(long)]
    trace: bool,

    /// The address/port on which to bind the server.
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    address: SocketAddr,
    /// The address of the public API of the identity service.
    #[clap(short, long, default_value = "127.0.0.1")]
    kratos:  String,
    /// The port of the identity service, if `--kratos` doesn't carry a scheme.
    #[clap(short, long, default_value = "4433")]
    port:    u16,
    /// If given, doesn't talk to an identity service at all but accepts the token `demo-token` only.
    #[clap(long)]
    offline: bool,
}





/***** HANDLERS *****/
/// Tells the caller who they are.
async fn whoami(Authenticated(session): Authenticated) -> Json<Value> {
    Json(json!({
        "session": session.id,
        "identity": session.identity_id(),
        "expires_at": session.expires_at,
    }))
}

/// Tells the caller what the server knows about their request, authenticated or not.
async fn inspect(RequestContext(ctx): RequestContext) -> Json<Value> {
    Json(json!({
        "cookie": !context::get_cookie(&ctx).is_empty(),
        "session": context::get_session(&ctx).is_ok(),
    }))
}

/// Builds the router for the given service.
fn router<S: 'static + IdentityService>(service: S) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/inspect", get(inspect))
        .layer(axum::middleware::from_fn_with_state(Arc::new(service), authenticate::<S>))
}





/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    // Parse the arguments
    let args = Arguments::parse();

    // Setup the logger
    tracing_subscriber::fmt()
        .with_max_level(if args.trace {
            Level::TRACE
        } else if args.debug {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .init();
    info!("{} - v{}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));

    // Setup the identity service
    let router: Router = if args.offline {
        let identity = Identity { id: "demo".into(), schema_id: "default".into(), traits: json!({ "email": "demo@example.com" }), ..Default::default() };
        router(StaticIdentityService::new().with_session("demo-token", Session {
            id: "demo-session".into(),
            active: Some(true),
            identity: Some(identity),
            ..Default::default()
        }))
    } else {
        let conn = Conn::new(args.kratos.clone()).with_port(args.port).with_verbose(args.trace);
        if let Err(err) = conn.public_url() {
            error!("{}", trace!(("Invalid identity service address {:?}", args.kratos), err));
            std::process::exit(1);
        }
        router(KratosClient::new(conn))
    };

    // OK, setup the server
    let listener: TcpListener = match TcpListener::bind(args.address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("{}", trace!(("Failed to bind server on {}", args.address), err));
            std::process::exit(1);
        },
    };
    info!("Serving on {}", args.address);
    tokio::select! {
        res = axum::serve(listener, router) => match res {
            Ok(_) => info!("Done"),
            Err(err) => {
                error!("{}", trace!(("Failed to serve the server"), err));
                std::process::exit(1);
            },
        },

        _ = async move {
            match signal(SignalKind::interrupt()) {
                Ok(mut sign) => sign.recv().await,
                Err(err) => {
                    warn!("{}", trace!(("Failed to register SIGINT signal handler"), err));
                    warn!("Graceful shutdown by Ctrl+C disabled");
                    None
                },
            }
        } => {
            debug!("Received SIGINT");
        },
        _ = async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sign) => sign.recv().await,
                Err(err) => {
                    warn!("{}", trace!(("Failed to register SIGTERM signal handler"), err));
                    warn!("Graceful shutdown by Docker disabled");
                    None
                },
            }
        } => {
            debug!("Received SIGTERM");
        },
    }
}
