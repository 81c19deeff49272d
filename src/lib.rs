//  LIB.rs
//    by Lut99
//
//  Created:
//    18 Oct 2024, 17:31:50
//  Last edited:
//    18 Oct 2026, 19:44:10
//  Auto updated?
//    Yes
//
//  Description:
//!   Resolves the session of incoming requests against an
//!   [Ory Kratos](https://www.ory.sh/kratos/) identity service, and carries
//!   it through the request in an immutable context.
//

// Import the libraries
pub mod servers {
    #[cfg(feature = "axum-middleware")]
    pub use axum_middleware as axum;
}

pub mod clients {
    #[cfg(feature = "kratos-client")]
    pub use kratos_client as kratos;
    #[cfg(feature = "static-client")]
    pub use static_client as static_;
}

pub use specifications as spec;
