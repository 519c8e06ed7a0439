//! Credential-to-identity resolution.
//!
//! Resolution happens once per connection attempt, before any session state
//! exists. The [`IdentityResolver`] trait is the seam: the server only ever
//! sees `resolve(credential)`, so swapping the backing source (credential
//! table, fixed dev roster) never touches session code.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;

use courier_core::UserIdentity;
use courier_store::{CredentialRepo, Database, UserRepo};

use crate::errors::AuthError;

/// Maps a presented credential to the identity behind it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve `credential` to a full identity, or reject the attempt.
    async fn resolve(&self, credential: &str) -> Result<UserIdentity, AuthError>;
}

/// Resolver backed by the `credentials` and `users` tables.
///
/// A token resolves when it exists, has not expired, and its user is in the
/// directory. Expiry is optional per credential; `NULL` never expires.
pub struct StoreTokenResolver {
    credentials: CredentialRepo,
    users: UserRepo,
}

impl StoreTokenResolver {
    /// Create a resolver over the shared database.
    pub fn new(db: Database) -> Self {
        Self {
            credentials: CredentialRepo::new(db.clone()),
            users: UserRepo::new(db),
        }
    }
}

#[async_trait]
impl IdentityResolver for StoreTokenResolver {
    #[instrument(skip_all)]
    async fn resolve(&self, credential: &str) -> Result<UserIdentity, AuthError> {
        let token = check_shape(credential)?;
        let row = self
            .credentials
            .lookup(token)?
            .ok_or(AuthError::UnknownCredential)?;
        if let Some(expires_at) = row.expires_at {
            if expires_at <= Utc::now() {
                return Err(AuthError::CredentialExpired);
            }
        }
        self.users
            .get(&row.user_id)?
            .ok_or(AuthError::UnknownCredential)
    }
}

/// Resolver over a fixed token-to-identity roster.
///
/// Meant for local development and tests, where standing up a credential
/// table is noise.
#[derive(Default)]
pub struct StaticResolver {
    identities: HashMap<String, UserIdentity>,
}

impl StaticResolver {
    /// Create an empty roster that rejects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token-to-identity entry.
    pub fn with_identity(mut self, token: impl Into<String>, identity: UserIdentity) -> Self {
        let _ = self.identities.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve(&self, credential: &str) -> Result<UserIdentity, AuthError> {
        let token = check_shape(credential)?;
        self.identities
            .get(token)
            .cloned()
            .ok_or(AuthError::UnknownCredential)
    }
}

/// Shared shape check: trims, rejects empty and interior whitespace/control
/// characters before any lookup runs.
fn check_shape(credential: &str) -> Result<&str, AuthError> {
    let token = credential.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
