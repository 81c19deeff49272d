//  LIB.rs
//    by Lut99
//
//  Created:
//    18 Oct 2024, 17:38:02
//  Last edited:
//    18 Oct 2026, 16:40:27
//  Auto updated?
//    Yes
//
//  Description:
//!   Provides the session model, the request-scoped context and the
//!   interface to the identity service that the session context library
//!   is built around.
//

// Declare modules
pub mod authn;
pub mod context;
pub mod extract;
pub mod metadata;
pub mod models;
pub mod service;

// Import some things into the main scope
pub use authn::auth_request;
pub use context::Context;
pub use extract::COOKIE_NAME;
pub use metadata::Metadata;
pub use models::{Identity, Provider, Session};
pub use service::{HttpError, IdentityService, ServiceError};
