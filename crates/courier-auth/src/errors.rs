//! Auth error types.

use courier_store::StoreError;

/// Errors surfaced while resolving a connection credential.
///
/// Every variant is fatal to the connection attempt. There is no retry or
/// degraded mode: a caller that cannot be resolved never gets a session.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing credential")]
    MissingCredential,

    /// The credential contains characters a token can never hold.
    #[error("malformed credential")]
    MalformedCredential,

    /// The credential was valid once and has passed its expiry.
    #[error("credential expired")]
    CredentialExpired,

    /// The credential does not map to any identity.
    #[error("unknown credential")]
    UnknownCredential,

    /// Identity lookup hit a storage failure.
    #[error("identity lookup failed: {0}")]
    Lookup(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Lookup(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_displays() {
        assert_eq!(AuthError::MissingCredential.to_string(), "missing credential");
        assert_eq!(AuthError::UnknownCredential.to_string(), "unknown credential");
        assert_eq!(AuthError::CredentialExpired.to_string(), "credential expired");
    }

    #[test]
    fn store_error_conversion() {
        let err = AuthError::from(StoreError::Database("disk I/O error".into()));
        assert!(err.to_string().contains("disk I/O error"));
    }
}
