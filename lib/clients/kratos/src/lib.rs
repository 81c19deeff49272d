//  LIB.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 12:40:02
//  Last edited:
//    18 Oct 2026, 17:22:51
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the `IdentityService` on top of the HTTP APIs of an Ory
//!   Kratos deployment.
//

// Modules
pub mod address;
mod client;

// Use some of it into the main namespace
pub use address::{AddressError, Conn, resolve_address};
pub use client::*;
