//  LIB.rs
//    by Lut99
//
//  Created:
//    24 Oct 2024, 13:50:43
//  Last edited:
//    18 Oct 2026, 18:22:30
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements an [`IdentityService`] that serves sessions and identities
//!   from memory instead of asking a remote service.
//

use std::collections::HashMap;

use chrono::Utc;
use http::StatusCode;
use parking_lot::RwLock;
use serde_json::Value;
use specifications::extract::{COOKIE_NAME, ExtractError};
use specifications::models::{Identity, JsonPatch, Session};
use specifications::service::{IdentityService, ServiceError};
use thiserror::Error;
use tracing::{Level, debug, span};


/***** ERRORS *****/
/// Returned as the source of every error of an [unavailable](StaticIdentityService::unavailable())
/// service.
#[derive(Debug, Error)]
#[error("Static identity service is unavailable")]
pub struct Unavailable;

/// Defines errors originating from applying [`JsonPatch`]es.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The patches could not be read as RFC 6902 operations.
    #[error("Failed to decode patch operations")]
    Decode {
        #[source]
        err: serde_json::Error,
    },
    /// One of the operations failed (missing path, failed `test`, ...).
    #[error("Failed to apply patch operations")]
    Apply {
        #[source]
        err: json_patch::PatchError,
    },
    /// The patched identity is no longer a valid identity.
    #[error("Patched identity is invalid")]
    Invalid {
        #[source]
        err: serde_json::Error,
    },
}





/***** HELPER FUNCTIONS *****/
/// Applies a list of patches to a JSON value. On failure, `target` is left untouched.
fn apply_patches(target: &mut Value, patches: &[JsonPatch]) -> Result<(), PatchError> {
    let raw: Value = serde_json::to_value(patches).map_err(|err| PatchError::Decode { err })?;
    let ops: Vec<json_patch::PatchOperation> = serde_json::from_value(raw).map_err(|err| PatchError::Decode { err })?;
    json_patch::patch(target, &ops).map_err(|err| PatchError::Apply { err })
}

/// Builds the error returned when asking for something that doesn't exist.
#[inline]
fn rejected(what: &'static str, status: StatusCode, body: impl Into<String>) -> ServiceError {
    ServiceError::UpstreamRejected { what, status, body: body.into() }
}





/***** LIBRARY *****/
/// Defines an [`IdentityService`] that keeps everything in memory.
///
/// Useful for tests, or for running an application without an identity service around.
#[derive(Debug, Default)]
pub struct StaticIdentityService {
    /// The sessions, by token.
    sessions:    RwLock<HashMap<String, Session>>,
    /// The identities, by ID.
    identities:  RwLock<HashMap<String, Identity>>,
    /// If true, every call fails as if the service is down.
    unavailable: bool,
}
impl StaticIdentityService {
    /// Constructor for an empty StaticIdentityService.
    ///
    /// # Returns
    /// A new StaticIdentityService that refuses every token until sessions are added.
    #[inline]
    pub fn new() -> Self { Self::default() }

    /// Constructor for a StaticIdentityService that behaves as if it is unreachable.
    ///
    /// # Returns
    /// A new StaticIdentityService of which every call fails with
    /// [`ServiceError::UpstreamUnavailable`].
    #[inline]
    pub fn unavailable() -> Self { Self { unavailable: true, ..Self::default() } }

    /// Adds a session, resolvable by the given token.
    ///
    /// The identity attached to the session (if any) is added as well, unless one with the same
    /// ID is already known.
    pub fn with_session(self, token: impl Into<String>, session: Session) -> Self {
        self.insert_session(token, session);
        self
    }

    /// Adds an identity.
    pub fn with_identity(self, identity: Identity) -> Self {
        self.identities.write().insert(identity.id.clone(), identity);
        self
    }

    /// Adds a session at runtime. See [`StaticIdentityService::with_session()`].
    pub fn insert_session(&self, token: impl Into<String>, session: Session) {
        if let Some(identity) = &session.identity {
            self.identities.write().entry(identity.id.clone()).or_insert_with(|| identity.clone());
        }
        self.sessions.write().insert(token.into(), session);
    }

    /// Forgets the session of the given token, as if it was logged out.
    ///
    /// # Returns
    /// The forgotten [`Session`], if the token was known.
    pub fn revoke(&self, token: &str) -> Option<Session> { self.sessions.write().remove(token) }

    /// Returns the number of identities known.
    #[inline]
    pub fn identity_count(&self) -> usize { self.identities.read().len() }



    /// Fails if this service is pretending to be down.
    fn check_available(&self, what: &'static str) -> Result<(), ServiceError> {
        if self.unavailable {
            return Err(ServiceError::UpstreamUnavailable { what, status: StatusCode::INTERNAL_SERVER_ERROR, err: Box::new(Unavailable) });
        }
        Ok(())
    }

    /// Returns a clone of an identity.
    fn identity(&self, what: &'static str, id: &str) -> Result<Identity, ServiceError> {
        self.check_available(what)?;
        self.identities.read().get(id).cloned().ok_or_else(|| rejected(what, StatusCode::NOT_FOUND, format!("Identity {id:?} not found")))
    }
}
impl IdentityService for StaticIdentityService {
    async fn whoami(&self, token: &str) -> Result<Session, ServiceError> {
        let _span = span!(Level::INFO, "StaticIdentityService::whoami");
        if token.is_empty() {
            return Err(ExtractError::CookieEmpty { name: COOKIE_NAME }.into());
        }
        self.check_available("get session")?;
        self.sessions.read().get(token).cloned().ok_or_else(|| rejected("get session", StatusCode::UNAUTHORIZED, "No valid session credentials found"))
    }

    async fn create_identity(&self, schema_id: &str, traits: Value) -> Result<Identity, ServiceError> {
        self.check_available("create identity")?;
        let now = Utc::now();
        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            schema_id: schema_id.into(),
            state: Some("active".into()),
            traits,
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        };
        debug!("Created identity with ID {:?}", identity.id);
        self.identities.write().insert(identity.id.clone(), identity.clone());
        Ok(identity)
    }

    async fn get_identity(&self, id: &str) -> Result<Identity, ServiceError> {
        let mut identity: Identity = self.identity("get identity", id)?;
        identity.credentials.clear();
        Ok(identity)
    }

    async fn get_identity_with_credentials(&self, id: &str) -> Result<Identity, ServiceError> { self.identity("get identity", id) }

    async fn update_identity(&self, id: &str, schema_id: &str, traits: Value) -> Result<Identity, ServiceError> {
        self.check_available("update identity")?;
        let mut identities = self.identities.write();
        let identity: &mut Identity =
            identities.get_mut(id).ok_or_else(|| rejected("update identity", StatusCode::NOT_FOUND, format!("Identity {id:?} not found")))?;
        identity.schema_id = schema_id.into();
        identity.state = Some("active".into());
        identity.traits = traits;
        identity.updated_at = Some(Utc::now());
        Ok(identity.clone())
    }

    async fn patch_identity(&self, id: &str, patches: Vec<JsonPatch>) -> Result<Identity, ServiceError> {
        const WHAT: &str = "patch identity";
        self.check_available(WHAT)?;
        let mut identities = self.identities.write();
        let identity: &mut Identity = identities.get_mut(id).ok_or_else(|| rejected(WHAT, StatusCode::NOT_FOUND, format!("Identity {id:?} not found")))?;

        // Patches apply all-or-nothing
        let mut raw: Value = serde_json::to_value(&*identity).map_err(|err| rejected(WHAT, StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
        apply_patches(&mut raw, &patches).map_err(|err| rejected(WHAT, StatusCode::BAD_REQUEST, err.to_string()))?;
        let mut patched: Identity =
            serde_json::from_value(raw).map_err(|err| rejected(WHAT, StatusCode::BAD_REQUEST, PatchError::Invalid { err }.to_string()))?;
        patched.id = identity.id.clone();
        patched.updated_at = Some(Utc::now());
        *identity = patched;
        Ok(identity.clone())
    }

    async fn delete_identity(&self, id: &str) -> Result<(), ServiceError> {
        self.check_available("delete identity")?;
        match self.identities.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(rejected("delete identity", StatusCode::NOT_FOUND, format!("Identity {id:?} not found"))),
        }
    }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use serde_json::json;
    use specifications::models::PatchOp;
    use specifications::HttpError as _;

    use super::*;

    fn session() -> Session {
        Session { id: "s1".into(), active: Some(true), identity: Some(Identity { id: "i1".into(), ..Default::default() }), ..Default::default() }
    }

    #[tokio::test]
    async fn test_whoami() {
        let service = StaticIdentityService::new().with_session("tok", session());
        assert_eq!(service.whoami("tok").await.unwrap().id, "s1");
        assert_eq!(service.identity_count(), 1);

        let err = service.whoami("other").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(matches!(service.whoami("").await, Err(ServiceError::Extract { .. })));

        assert!(service.revoke("tok").is_some());
        assert!(service.whoami("tok").await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let service = StaticIdentityService::unavailable();
        service.insert_session("tok", session());
        let err = service.whoami("tok").await.unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable { .. }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(service.get_identity("i1").await.is_err());
    }

    #[tokio::test]
    async fn test_identity_lifecycle() {
        let service = StaticIdentityService::new();
        let created = service.create_identity("default", json!({ "email": "amy@example.com" })).await.unwrap();
        assert_eq!(created.state.as_deref(), Some("active"));
        assert_eq!(service.get_identity(&created.id).await.unwrap(), created);

        let updated = service.update_identity(&created.id, "v2", json!({ "email": "bob@example.com" })).await.unwrap();
        assert_eq!(updated.schema_id, "v2");
        assert_eq!(updated.traits["email"], "bob@example.com");

        let patched = service
            .patch_identity(&created.id, vec![
                JsonPatch::replace("/traits/email", json!("carol@example.com")),
                JsonPatch::add("/traits/tags", json!(["a"])),
                JsonPatch::add("/traits/tags/-", json!("b")),
                JsonPatch::add("/metadata_public", json!({ "plan": "free" })),
            ])
            .await
            .unwrap();
        assert_eq!(patched.traits, json!({ "email": "carol@example.com", "tags": ["a", "b"] }));
        assert_eq!(patched.metadata_public, Some(json!({ "plan": "free" })));

        // Failing patches leave the identity untouched
        let err = service
            .patch_identity(&created.id, vec![JsonPatch::remove("/traits/email"), JsonPatch::replace("/traits/missing", json!(1))])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(service.get_identity(&created.id).await.unwrap().traits["email"], "carol@example.com");

        service.delete_identity(&created.id).await.unwrap();
        let err = service.delete_identity(&created.id).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_credentials_only_when_asked() {
        let mut identity = Identity { id: "i1".into(), ..Default::default() };
        identity.credentials.insert("oidc".into(), specifications::models::Credentials {
            config: json!({ "providers": [{ "subject": "42", "provider": "github", "initial_access_token": "gho_abc" }] }),
            ..Default::default()
        });
        let service = StaticIdentityService::new().with_identity(identity);
        assert!(service.get_identity("i1").await.unwrap().credentials.is_empty());
        assert_eq!(service.get_identity_with_credentials("i1").await.unwrap().providers()[0].access_token, "gho_abc");
    }

    #[tokio::test]
    async fn test_patch_all_operations() {
        let identity = Identity { id: "i1".into(), traits: json!({ "email": "amy@example.com", "tags": ["a"] }), ..Default::default() };
        let service = StaticIdentityService::new().with_identity(identity);

        let mv = JsonPatch { op: PatchOp::Move, path: "/traits/mail".into(), value: None, from: Some("/traits/email".into()) };
        let cp = JsonPatch { op: PatchOp::Copy, path: "/traits/tags/-".into(), value: None, from: Some("/traits/tags/0".into()) };
        let ok = JsonPatch { op: PatchOp::Test, path: "/traits/mail".into(), value: Some(json!("amy@example.com")), from: None };
        let patched = service.patch_identity("i1", vec![mv, cp, ok]).await.unwrap();
        assert_eq!(patched.traits, json!({ "mail": "amy@example.com", "tags": ["a", "a"] }));

        // A failing `test` rejects the whole list
        let bad = JsonPatch { op: PatchOp::Test, path: "/traits/mail".into(), value: Some(json!("bob@example.com")), from: None };
        let err = service.patch_identity("i1", vec![JsonPatch::remove("/traits/tags"), bad]).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(service.get_identity("i1").await.unwrap().traits["tags"], json!(["a", "a"]));
    }

    #[test]
    fn test_apply_whole_document() {
        let mut value = json!({ "traits": {} });
        apply_patches(&mut value, &[JsonPatch::replace("", json!({ "traits": { "email": "amy@example.com" } }))]).unwrap();
        assert_eq!(value, json!({ "traits": { "email": "amy@example.com" } }));
        assert!(matches!(apply_patches(&mut value, &[JsonPatch::remove("/nope")]), Err(PatchError::Apply { .. })));
    }
}
