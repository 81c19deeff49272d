//  CLIENT.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 13:02:18
//  Last edited:
//    18 Oct 2026, 17:21:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Provides the actual [`IdentityService`] implementation.
//

use http::header::COOKIE;
use http::StatusCode;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use specifications::extract::{COOKIE_NAME, ExtractError};
use specifications::models::{Identity, JsonPatch, Session};
use specifications::service::{IdentityService, ServiceError};
use tracing::{Level, debug, error, span};
use url::Url;

use crate::address::{AddressError, Conn};


/***** CONSTANTS *****/
/// The path of the session introspection endpoint on the public API.
const WHOAMI_PATH: [&str; 2] = ["sessions", "whoami"];
/// The path of the identity collection on the admin API.
const IDENTITIES_PATH: [&str; 2] = ["admin", "identities"];
/// The state identities are put in when updated.
const ACTIVE_STATE: &str = "active";





/***** HELPERS *****/
/// Body of a create request.
#[derive(Serialize)]
struct CreateIdentityBody<'a> {
    schema_id: &'a str,
    traits:    Value,
}

/// Body of an update request.
#[derive(Serialize)]
struct UpdateIdentityBody<'a> {
    schema_id: &'a str,
    state:     &'static str,
    traits:    Value,
}





/***** LIBRARY *****/
/// Talks to an Ory Kratos deployment over its public and admin HTTP APIs.
///
/// Every call is a fresh round-trip; nothing is cached and nothing is retried. Timeouts are
/// whatever the embedded [`reqwest::Client`] is configured with (none by default).
#[derive(Clone, Debug)]
pub struct KratosClient {
    /// Where to find the service.
    conn: Conn,
    /// The client used to make the calls.
    http: reqwest::Client,
}
impl KratosClient {
    /// Constructor for the KratosClient.
    ///
    /// Note that the addresses in `conn` are only resolved when making calls. Malformed addresses
    /// thus surface as [`ServiceError::Config`] on every call.
    ///
    /// # Arguments
    /// - `conn`: A [`Conn`] describing where the public and admin APIs live.
    ///
    /// # Returns
    /// A new KratosClient, ready to call.
    #[inline]
    pub fn new(conn: Conn) -> Self { Self { conn, http: reqwest::Client::new() } }

    /// Use a custom HTTP client (for connection pool reuse, timeouts or testing).
    #[inline]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the [`Conn`] this client uses.
    #[inline]
    pub fn conn(&self) -> &Conn { &self.conn }



    /// Builds the URL of an endpoint.
    ///
    /// # Arguments
    /// - `admin`: Whether the endpoint lives on the admin API (true) or the public one (false).
    /// - `segments`: The (unencoded) path segments of the endpoint.
    ///
    /// # Errors
    /// This function errors if the address in question could not be resolved.
    fn endpoint(&self, admin: bool, segments: &[&str]) -> Result<Url, ServiceError> {
        let (raw, res): (&str, Result<Url, AddressError>) =
            if admin { (self.conn.admin_address(), self.conn.admin_url()) } else { (self.conn.address.as_str(), self.conn.public_url()) };
        let mut url: Url = res.map_err(|err| ServiceError::Config { address: raw.into(), err: Box::new(err) })?;
        url.set_query(None);
        url.set_fragment(None);
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.clear().extend(segments);
            },
            Err(_) => return Err(ServiceError::Config { address: raw.into(), err: Box::new(AddressError::NoHost { raw: raw.into() }) }),
        }
        Ok(url)
    }

    /// Sends a request, and checks that the reply indicates success.
    ///
    /// # Arguments
    /// - `what`: Some description of what the call does, for errors.
    /// - `req`: The request to send.
    ///
    /// # Errors
    /// This function errors with [`ServiceError::UpstreamUnavailable`] if the service could not
    /// be reached, and with [`ServiceError::UpstreamRejected`] if it replied with a non-success
    /// status.
    async fn send(&self, what: &'static str, req: RequestBuilder) -> Result<Response, ServiceError> {
        let res: Response = match req.send().await {
            Ok(res) => res,
            Err(err) => {
                error!("Failed to {what}: {err}");
                let status: StatusCode = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                return Err(ServiceError::UpstreamUnavailable { what, status, err: Box::new(err) });
            },
        };

        let status: StatusCode = res.status();
        if !status.is_success() {
            let body: String = match res.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!("Failed to read body of {status} reply to {what}: {err}");
                    String::new()
                },
            };
            if self.conn.verbose {
                debug!("Identity service replied to {what} with {status}: {body}");
            }
            return Err(ServiceError::UpstreamRejected { what, status, body });
        }
        Ok(res)
    }

    /// Reads the body of a successful reply as JSON.
    ///
    /// # Errors
    /// This function errors with [`ServiceError::UpstreamUnavailable`] if the body could not be
    /// read, and with [`ServiceError::Decode`] if it is not the expected JSON.
    async fn decode<T: DeserializeOwned>(&self, what: &'static str, res: Response) -> Result<T, ServiceError> {
        let status: StatusCode = res.status();
        let body = res.bytes().await.map_err(|err| ServiceError::UpstreamUnavailable { what, status, err: Box::new(err) })?;
        if self.conn.verbose {
            debug!("Identity service replied to {what} with {status}: {}", String::from_utf8_lossy(&body));
        }
        serde_json::from_slice(&body).map_err(|err| ServiceError::Decode { what, err: Box::new(err) })
    }
}
impl IdentityService for KratosClient {
    async fn whoami(&self, token: &str) -> Result<Session, ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::whoami");

        // Empty tokens never leave the process
        if token.is_empty() {
            return Err(ExtractError::CookieEmpty { name: COOKIE_NAME }.into());
        }

        let url: Url = self.endpoint(false, &WHOAMI_PATH)?;
        debug!("Making call to {url} to resolve session token...");
        let res: Response = self.send("get session", self.http.get(url).header(COOKIE, format!("{COOKIE_NAME}={token}"))).await?;
        self.decode("get session", res).await
    }

    async fn create_identity(&self, schema_id: &str, traits: Value) -> Result<Identity, ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::create_identity", schema_id);

        let url: Url = self.endpoint(true, &IDENTITIES_PATH)?;
        let res: Response = self.send("create identity", self.http.post(url).json(&CreateIdentityBody { schema_id, traits })).await?;
        let identity: Identity = self.decode("create identity", res).await?;
        debug!("Created identity with ID {:?}", identity.id);
        Ok(identity)
    }

    async fn get_identity(&self, id: &str) -> Result<Identity, ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::get_identity", id);

        let url: Url = self.endpoint(true, &[IDENTITIES_PATH[0], IDENTITIES_PATH[1], id])?;
        let res: Response = self.send("get identity", self.http.get(url)).await?;
        self.decode("get identity", res).await
    }

    async fn get_identity_with_credentials(&self, id: &str) -> Result<Identity, ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::get_identity_with_credentials", id);

        let mut url: Url = self.endpoint(true, &[IDENTITIES_PATH[0], IDENTITIES_PATH[1], id])?;
        url.query_pairs_mut().append_pair("include_credential", specifications::models::OIDC_CREDENTIALS);
        let res: Response = self.send("get identity", self.http.get(url)).await?;
        self.decode("get identity", res).await
    }

    async fn update_identity(&self, id: &str, schema_id: &str, traits: Value) -> Result<Identity, ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::update_identity", id);

        let url: Url = self.endpoint(true, &[IDENTITIES_PATH[0], IDENTITIES_PATH[1], id])?;
        let body = UpdateIdentityBody { schema_id, state: ACTIVE_STATE, traits };
        let res: Response = self.send("update identity", self.http.put(url).json(&body)).await?;
        self.decode("update identity", res).await
    }

    async fn patch_identity(&self, id: &str, patches: Vec<JsonPatch>) -> Result<Identity, ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::patch_identity", id);

        let url: Url = self.endpoint(true, &[IDENTITIES_PATH[0], IDENTITIES_PATH[1], id])?;
        debug!("Applying {} patch(es)", patches.len());
        let res: Response = self.send("patch identity", self.http.patch(url).json(&patches)).await?;
        self.decode("patch identity", res).await
    }

    async fn delete_identity(&self, id: &str) -> Result<(), ServiceError> {
        let _span = span!(Level::INFO, "KratosClient::delete_identity", id);

        let url: Url = self.endpoint(true, &[IDENTITIES_PATH[0], IDENTITIES_PATH[1], id])?;
        self.send("delete identity", self.http.delete(url)).await?;
        debug!("Removed identity with ID {id:?}");
        Ok(())
    }
}
