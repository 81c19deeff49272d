//  ADDRESS.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 12:44:50
//  Last edited:
//    18 Oct 2026, 16:58:31
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines how to reach the identity service, and how the configured
//!   addresses are turned into base URLs.
//

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};


/***** CONSTANTS *****/
/// The scheme assumed for addresses that don't specify one.
pub const DEFAULT_SCHEME: &str = "http";





/***** ERRORS *****/
/// Defines errors originating from resolving addresses.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The address was not a valid URL, not even after prefixing a scheme.
    #[error("Failed to decode address {raw:?}")]
    Parse {
        raw: String,
        #[source]
        err: ParseError,
    },
    /// The address parsed, but not as something that has a host.
    #[error("Address {raw:?} does not name a host")]
    NoHost { raw: String },
}





/***** LIBRARY *****/
/// Turns a configured address into a base URL.
///
/// The address may either be a full URL (`https://kratos.example.com`) or just a host with an
/// optional port (`kratos:4433`). In the latter case, [`DEFAULT_SCHEME`] is assumed and `port`
/// (if any) is appended.
///
/// # Arguments
/// - `raw`: The configured address.
/// - `port`: A port to add to addresses without a scheme.
///
/// # Returns
/// The parsed [`Url`].
///
/// # Errors
/// This function errors if the address is not a valid URL with or without the default scheme.
pub fn resolve_address(raw: &str, port: Option<u16>) -> Result<Url, AddressError> {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => return Ok(url),
        // `kratos:4433` parses as scheme `kratos`, `kratos` doesn't parse at all
        Ok(_) | Err(ParseError::RelativeUrlWithoutBase) => {},
        Err(err) => return Err(AddressError::Parse { raw: raw.into(), err }),
    }

    let prefixed: String = match port {
        Some(port) => format!("{DEFAULT_SCHEME}://{raw}:{port}"),
        None => format!("{DEFAULT_SCHEME}://{raw}"),
    };
    let url: Url = Url::parse(&prefixed).map_err(|err| AddressError::Parse { raw: raw.into(), err })?;
    if !url.has_host() {
        return Err(AddressError::NoHost { raw: raw.into() });
    }
    Ok(url)
}



/// Describes where the identity service lives.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Conn {
    /// The address of the public API (e.g., `kratos:4433` or `https://auth.example.com`).
    pub address: String,
    /// The address of the admin API. Defaults to `address` if omitted.
    #[serde(default)]
    pub admin_address: Option<String>,
    /// The port added to `address` if it has no scheme.
    #[serde(default)]
    pub port: Option<u16>,
    /// Whether to log the raw replies of the identity service.
    #[serde(default)]
    pub verbose: bool,
}
impl Conn {
    /// Constructor for a Conn that uses the same address for the public and admin API.
    #[inline]
    pub fn new(address: impl Into<String>) -> Self { Self { address: address.into(), admin_address: None, port: None, verbose: false } }

    /// Sets a separate address for the admin API.
    #[inline]
    pub fn with_admin(mut self, admin_address: impl Into<String>) -> Self {
        self.admin_address = Some(admin_address.into());
        self
    }

    /// Sets the port added to a scheme-less `address`.
    #[inline]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets whether to log raw replies.
    #[inline]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolves the base URL of the public API.
    ///
    /// # Errors
    /// This function errors if `address` is malformed.
    #[inline]
    pub fn public_url(&self) -> Result<Url, AddressError> { resolve_address(&self.address, self.port) }

    /// Returns the raw address used for the admin API.
    #[inline]
    pub fn admin_address(&self) -> &str { self.admin_address.as_deref().unwrap_or(&self.address) }

    /// Resolves the base URL of the admin API, falling back to the public one.
    ///
    /// # Errors
    /// This function errors if the admin address (or `address`, if there is none) is malformed.
    pub fn admin_url(&self) -> Result<Url, AddressError> {
        match &self.admin_address {
            Some(admin) => resolve_address(admin, None),
            None => self.public_url(),
        }
    }
}





/***** TESTS *****/
