//  MODELS.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 10:02:11
//  Last edited:
//    18 Oct 2026, 14:47:36
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the records exchanged with the identity service (sessions,
//!   identities and the OIDC tokens linked to them).
//

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;


/***** CONSTANTS *****/
/// The credential type under which OIDC providers are stored.
pub const OIDC_CREDENTIALS: &str = "oidc";





/***** AUXILLARY *****/
/// A single method used to authenticate a session.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthenticationMethod {
    /// The name of the method (e.g., `password`, `oidc`).
    #[serde(default)]
    pub method: Option<String>,
    /// When this method was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A set of credentials of one particular type attached to an [`Identity`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Credentials {
    /// The credential type (e.g., `password`, `oidc`).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// The identifiers (e.g., emails) used by these credentials.
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// Type-specific configuration. For OIDC, this contains the linked providers.
    #[serde(default)]
    pub config: Value,
    /// Version of the credential schema.
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Tokens obtained from an upstream OIDC provider when the identity signed in through it.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Provider {
    #[serde(default, rename = "initial_id_token")]
    pub token_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, rename = "initial_access_token")]
    pub access_token: String,
    #[serde(default, rename = "initial_refresh_token")]
    pub refresh_token: String,
}

/// The operations allowed in a [`JsonPatch`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

/// A single RFC 6902 patch operation applied to an identity.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JsonPatch {
    pub op:    PatchOp,
    pub path:  String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from:  Option<String>,
}
impl JsonPatch {
    /// Constructor for a patch that replaces whatever lives at `path` with `value`.
    #[inline]
    pub fn replace(path: impl Into<String>, value: Value) -> Self { Self { op: PatchOp::Replace, path: path.into(), value: Some(value), from: None } }

    /// Constructor for a patch that adds `value` at `path`.
    #[inline]
    pub fn add(path: impl Into<String>, value: Value) -> Self { Self { op: PatchOp::Add, path: path.into(), value: Some(value), from: None } }

    /// Constructor for a patch that removes whatever lives at `path`.
    #[inline]
    pub fn remove(path: impl Into<String>) -> Self { Self { op: PatchOp::Remove, path: path.into(), value: None, from: None } }
}





/***** LIBRARY *****/
/// The user/account record managed by the identity service.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Identity {
    /// The unique identifier of the identity (the subject).
    pub id: String,
    /// The identity schema this identity adheres to.
    #[serde(default)]
    pub schema_id: String,
    #[serde(default)]
    pub schema_url: Option<String>,
    /// Either `active` or `inactive`.
    #[serde(default)]
    pub state: Option<String>,
    /// The schema-defined traits (email, name, ...).
    #[serde(default)]
    pub traits: Value,
    /// The credentials of this identity, by type. Only populated when explicitly requested.
    #[serde(default)]
    pub credentials: HashMap<String, Credentials>,
    #[serde(default)]
    pub metadata_public: Option<Value>,
    #[serde(default)]
    pub metadata_admin: Option<Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
impl Identity {
    /// Collects the OIDC providers linked to this identity.
    ///
    /// Providers are read from `credentials.oidc.config.providers`. Entries that can't be parsed
    /// as a [`Provider`] are logged and skipped.
    ///
    /// # Returns
    /// A list of [`Provider`]s, which is empty if the identity has no OIDC credentials.
    pub fn providers(&self) -> Vec<Provider> {
        let Some(creds) = self.credentials.get(OIDC_CREDENTIALS) else { return Vec::new() };
        let Some(Value::Array(raw)) = creds.config.get("providers") else { return Vec::new() };

        let mut providers: Vec<Provider> = Vec::with_capacity(raw.len());
        for (i, value) in raw.iter().enumerate() {
            match Provider::deserialize(value) {
                Ok(provider) => providers.push(provider),
                Err(err) => warn!("Failed to parse OIDC provider {i} of identity {:?}: {err}", self.id),
            }
        }
        providers
    }
}



/// Server-issued record asserting that a given identity is currently authenticated.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Session {
    /// The session identifier.
    pub id: String,
    /// Whether the session is still active. What to do with inactive sessions is up to the caller.
    #[serde(default)]
    pub active: Option<bool>,
    /// The identity this session belongs to.
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authenticated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authenticator_assurance_level: Option<String>,
    #[serde(default)]
    pub authentication_methods: Vec<AuthenticationMethod>,
}
impl Session {
    /// Returns whether the identity service marked this session as active.
    #[inline]
    pub fn is_active(&self) -> bool { self.active.unwrap_or(false) }

    /// Returns the ID of the identity this session belongs to, if any is attached.
    #[inline]
    pub fn identity_id(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.id.as_str()) }
}





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_session_from_whoami_reply() {
        let raw = json!({
            "id": "5b2c3d4e-0000-4000-8000-000000000001",
            "active": true,
            "expires_at": "2026-10-19T10:00:00Z",
            "authenticated_at": "2026-10-18T10:00:00Z",
            "issued_at": "2026-10-18T10:00:00Z",
            "authenticator_assurance_level": "aal1",
            "authentication_methods": [{ "method": "password", "completed_at": "2026-10-18T10:00:00Z" }],
            "identity": {
                "id": "9f1a0000-0000-4000-8000-000000000002",
                "schema_id": "default",
                "state": "active",
                "traits": { "email": "amy@example.com" }
            },
            "devices": []
        });
        let session: Session = serde_json::from_value(raw).unwrap();
        assert!(session.is_active());
        assert_eq!(session.identity_id(), Some("9f1a0000-0000-4000-8000-000000000002"));
        assert_eq!(session.authentication_methods.len(), 1);
        assert_eq!(session.identity.unwrap().traits["email"], "amy@example.com");
    }

    #[test]
    fn test_session_without_active_is_inactive() {
        let session: Session = serde_json::from_value(json!({ "id": "s" })).unwrap();
        assert!(!session.is_active());
        assert_eq!(session.identity_id(), None);
    }

    #[test]
    fn test_identity_providers() {
        let identity: Identity = serde_json::from_value(json!({
            "id": "i",
            "schema_id": "default",
            "credentials": {
                "oidc": {
                    "type": "oidc",
                    "identifiers": ["github:42"],
                    "config": {
                        "providers": [
                            {
                                "subject": "42",
                                "provider": "github",
                                "initial_access_token": "gho_abc",
                                "initial_id_token": "",
                                "initial_refresh_token": "r1"
                            },
                            "not a provider",
                            { "subject": "7", "provider": "google" }
                        ]
                    }
                }
            }
        }))
        .unwrap();

        let providers = identity.providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].provider, "github");
        assert_eq!(providers[0].access_token, "gho_abc");
        assert_eq!(providers[0].refresh_token, "r1");
        assert_eq!(providers[1].provider, "google");
        assert_eq!(providers[1].access_token, "");
    }

    #[test]
    fn test_identity_without_oidc_has_no_providers() {
        let identity = Identity { id: "i".into(), ..Default::default() };
        assert!(identity.providers().is_empty());
    }

    #[test]
    fn test_json_patch_serialization() {
        let patch = JsonPatch::replace("/traits/email", json!("bob@example.com"));
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "op": "replace", "path": "/traits/email", "value": "bob@example.com" }));
        assert_eq!(serde_json::to_value(JsonPatch::remove("/metadata_public")).unwrap(), json!({ "op": "remove", "path": "/metadata_public" }));
    }
}
