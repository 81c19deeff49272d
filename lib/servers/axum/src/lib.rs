//  LIB.rs
//    by Lut99
//
//  Created:
//    23 Oct 2024, 10:25:43
//  Last edited:
//    18 Oct 2026, 19:12:04
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements `axum` middleware that resolves the session of incoming
//!   requests, plus the extractors that let handlers get at it.
//

// Modules
mod auth;
mod extract;

// Use local parts
pub use auth::*;
pub use extract::*;
