//  CONTEXT.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 10:31:52
//  Last edited:
//    18 Oct 2026, 15:40:03
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the request-scoped [`Context`] and the accessors for the
//!   bindings this library stores in it.
//!
//!   A [`Context`] is an immutable chain of key/value bindings. Setting a
//!   value never changes an existing context; instead, it returns a new
//!   one layered on top of it. Any context that was handed out before
//!   remains valid and keeps seeing only its own bindings.
//

use std::any::Any;
use std::fmt::{Debug, Formatter, Result as FResult};
use std::sync::Arc;

use thiserror::Error;

use crate::metadata::Metadata;
use crate::models::Session;


/***** ERRORS *****/
/// Defines errors originating from looking things up in a [`Context`].
#[derive(Debug, Error)]
pub enum ContextError {
    /// No address was bound in the context, or it was of the wrong type.
    #[error("Address not found in context")]
    AddressNotFound,
    /// No session was bound in the context, or it was of the wrong type.
    #[error("Session not found in context")]
    SessionNotFound,
}





/***** AUXILLARY *****/
/// The keys under which this library binds values in a [`Context`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContextKey {
    /// The address of the identity service.
    Address,
    /// The resolved [`Session`].
    Session,
    /// The raw session token (cookie value).
    Cookie,
    /// The [`Metadata`] of an incoming RPC call.
    Metadata,
}

/// One link in the chain.
struct Binding {
    key:    ContextKey,
    value:  Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Binding>>,
}





/***** LIBRARY *****/
/// A request-scoped, immutable key/value chain.
///
/// Cloning a context is cheap; it only clones a pointer to the head of the chain.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Binding>>,
}
impl Context {
    /// Returns an empty root context.
    #[inline]
    pub const fn background() -> Self { Self { head: None } }

    /// Derives a new context that binds `value` to `key`, on top of this one.
    ///
    /// # Arguments
    /// - `key`: The [`ContextKey`] to bind.
    /// - `value`: Anything to bind to it. It shadows earlier bindings of the same key in the
    ///   returned context only.
    ///
    /// # Returns
    /// A new Context.
    #[inline]
    pub fn with_value<T: 'static + Send + Sync>(&self, key: ContextKey, value: T) -> Self { self.with_shared(key, Arc::new(value)) }

    /// Like [`Context::with_value()`], but binds an already shared value.
    pub fn with_shared(&self, key: ContextKey, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self { head: Some(Arc::new(Binding { key, value, parent: self.head.clone() })) }
    }

    /// Looks up the nearest binding of `key`.
    ///
    /// # Returns
    /// The bound value, or [`None`] if the key was never bound in this chain.
    pub fn value(&self, key: ContextKey) -> Option<&Arc<dyn Any + Send + Sync>> {
        let mut next: Option<&Arc<Binding>> = self.head.as_ref();
        while let Some(binding) = next {
            if binding.key == key {
                return Some(&binding.value);
            }
            next = binding.parent.as_ref();
        }
        None
    }

    /// Returns whether both contexts are the exact same chain.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns the number of bindings in this chain, shadowed ones included.
    pub fn depth(&self) -> usize {
        let mut depth: usize = 0;
        let mut next: Option<&Arc<Binding>> = self.head.as_ref();
        while let Some(binding) = next {
            depth += 1;
            next = binding.parent.as_ref();
        }
        depth
    }
}
impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        let mut keys: Vec<ContextKey> = Vec::with_capacity(self.depth());
        let mut next: Option<&Arc<Binding>> = self.head.as_ref();
        while let Some(binding) = next {
            keys.push(binding.key);
            next = binding.parent.as_ref();
        }
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}



/// Records a session in the context.
///
/// # Arguments
/// - `ctx`: The [`Context`] to derive from. If [`None`], a root context is used instead.
/// - `session`: The [`Session`] to bind. If [`None`], nothing is bound.
///
/// # Returns
/// A new [`Context`] with the session bound, or `ctx` itself if there was no session.
pub fn set_session(ctx: Option<&Context>, session: Option<Arc<Session>>) -> Context {
    let ctx: Context = ctx.cloned().unwrap_or_default();
    match session {
        Some(session) => ctx.with_shared(ContextKey::Session, session),
        None => ctx,
    }
}

/// Returns the session recorded in the context.
///
/// # Errors
/// This function errors with [`ContextError::SessionNotFound`] if no session is bound, or if
/// whatever is bound isn't a [`Session`].
pub fn get_session(ctx: &Context) -> Result<Arc<Session>, ContextError> {
    let value: Arc<dyn Any + Send + Sync> = ctx.value(ContextKey::Session).cloned().ok_or(ContextError::SessionNotFound)?;
    value.downcast::<Session>().map_err(|_| ContextError::SessionNotFound)
}

/// Records the raw session token in the context. Empty tokens are not recorded.
pub fn set_cookie(ctx: Option<&Context>, token: impl Into<String>) -> Context {
    let ctx: Context = ctx.cloned().unwrap_or_default();
    let token: String = token.into();
    if token.is_empty() {
        return ctx;
    }
    ctx.with_value(ContextKey::Cookie, token)
}

/// Returns the raw session token recorded in the context.
///
/// # Returns
/// The token, or an empty string if none (of the right type) was recorded.
pub fn get_cookie(ctx: &Context) -> String {
    ctx.value(ContextKey::Cookie).and_then(|v| v.downcast_ref::<String>()).cloned().unwrap_or_default()
}

/// Records the identity service address in the context. Empty addresses are not recorded.
pub fn set_address(ctx: Option<&Context>, address: impl Into<String>) -> Context {
    let ctx: Context = ctx.cloned().unwrap_or_default();
    let address: String = address.into();
    if address.is_empty() {
        return ctx;
    }
    ctx.with_value(ContextKey::Address, address)
}

/// Returns the identity service address recorded in the context.
///
/// # Errors
/// This function errors with [`ContextError::AddressNotFound`] if no address is bound, or if
/// whatever is bound isn't a string.
pub fn get_address(ctx: &Context) -> Result<String, ContextError> {
    ctx.value(ContextKey::Address).and_then(|v| v.downcast_ref::<String>()).cloned().ok_or(ContextError::AddressNotFound)
}

/// Records the metadata of an incoming RPC call in the context.
pub fn set_metadata(ctx: Option<&Context>, metadata: Option<Metadata>) -> Context {
    let ctx: Context = ctx.cloned().unwrap_or_default();
    match metadata {
        Some(md) => ctx.with_value(ContextKey::Metadata, md),
        None => ctx,
    }
}

/// Returns the metadata of the incoming RPC call recorded in the context, if any.
pub fn get_metadata(ctx: &Context) -> Option<Arc<Metadata>> { ctx.value(ContextKey::Metadata).cloned().and_then(|v| v.downcast::<Metadata>().ok()) }





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Arc<Session> { Arc::new(Session { id: id.into(), active: Some(true), ..Default::default() }) }

    #[test]
    fn test_set_no_session_is_identity() {
        let ctx = Context::background().with_value(ContextKey::Cookie, "abc".to_string());
        let got = set_session(Some(&ctx), None);
        assert!(got.ptr_eq(&ctx));
        assert_eq!(got.depth(), 1);
    }

    #[test]
    fn test_set_then_get_session() {
        let sess = session("s1");
        let ctx = set_session(None, Some(sess.clone()));
        let got = get_session(&ctx).unwrap();
        assert!(Arc::ptr_eq(&got, &sess));
    }

    #[test]
    fn test_get_session_absent() {
        assert!(matches!(get_session(&Context::background()), Err(ContextError::SessionNotFound)));
    }

    #[test]
    fn test_get_session_wrong_type() {
        let ctx = Context::background().with_value(ContextKey::Session, 42u32);
        assert!(matches!(get_session(&ctx), Err(ContextError::SessionNotFound)));
        let ctx = Context::background().with_value(ContextKey::Session, Option::<Session>::None);
        assert!(matches!(get_session(&ctx), Err(ContextError::SessionNotFound)));
    }

    #[test]
    fn test_set_forks_instead_of_mutating() {
        let root = set_cookie(None, "tok");
        let with_a = set_session(Some(&root), Some(session("a")));
        let with_b = set_session(Some(&root), Some(session("b")));

        assert!(get_session(&root).is_err());
        assert_eq!(get_session(&with_a).unwrap().id, "a");
        assert_eq!(get_session(&with_b).unwrap().id, "b");
        assert_eq!(get_cookie(&with_a), "tok");
        assert_eq!(get_cookie(&with_b), "tok");

        // Nearest binding wins
        let shadowed = set_session(Some(&with_a), Some(session("c")));
        assert_eq!(get_session(&shadowed).unwrap().id, "c");
        assert_eq!(get_session(&with_a).unwrap().id, "a");
        assert_eq!(shadowed.depth(), 3);
    }

    #[test]
    fn test_address() {
        assert!(matches!(get_address(&Context::background()), Err(ContextError::AddressNotFound)));
        let ctx = Context::background().with_value(ContextKey::Address, 1i32);
        assert!(matches!(get_address(&ctx), Err(ContextError::AddressNotFound)));

        let ctx = set_address(None, "http://localhost");
        assert_eq!(get_address(&ctx).unwrap(), "http://localhost");

        let empty = set_address(Some(&ctx), "");
        assert!(empty.ptr_eq(&ctx));
        assert!(set_address(None, "").ptr_eq(&Context::background()));
    }

    #[test]
    fn test_cookie_zero_value() {
        assert_eq!(get_cookie(&Context::background()), "");
        let ctx = Context::background().with_value(ContextKey::Cookie, 5u8);
        assert_eq!(get_cookie(&ctx), "");
        let ctx = set_cookie(Some(&ctx), "");
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_metadata() {
        assert!(get_metadata(&Context::background()).is_none());
        let md: Metadata = [("ory_kratos_session", "tok1")].into_iter().collect();
        let ctx = set_metadata(None, Some(md.clone()));
        assert_eq!(*get_metadata(&ctx).unwrap(), md);
        assert!(set_metadata(Some(&ctx), None).ptr_eq(&ctx));
    }
}
