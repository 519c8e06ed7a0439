//! Connection-credential repository.

use chrono::{DateTime, Utc};
use tracing::instrument;

use courier_core::ids::UserId;

use crate::database::Database;
use crate::error::StoreError;

/// A stored credential: an opaque token bound to a user, optionally expiring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRow {
    /// The opaque token value clients present at handshake.
    pub token: String,
    /// The user the token authenticates as.
    pub user_id: UserId,
    /// Expiry instant; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Read/write access to the `credentials` table.
///
/// Token issuance is an external concern; this repo only stores and looks up
/// what the issuer minted.
pub struct CredentialRepo {
    db: Database,
}

impl CredentialRepo {
    /// Create a repo over the shared database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a credential.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub fn insert(
        &self,
        token: &str,
        user_id: &UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO credentials (token, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    token,
                    user_id.as_str(),
                    expires_at.map(|t| t.to_rfc3339()),
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Look up a credential by token. Unknown tokens are `None`.
    #[instrument(skip_all)]
    pub fn lookup(&self, token: &str) -> Result<Option<CredentialRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT token, user_id, expires_at FROM credentials WHERE token = ?1",
            )?;
            let mut rows = stmt.query([token])?;
            match rows.next()? {
                Some(row) => {
                    let expires_raw: Option<String> = row.get(2)?;
                    Ok(Some(CredentialRow {
                        token: row.get(0)?,
                        user_id: UserId::from_string(row.get(1)?),
                        expires_at: expires_raw
                            .map(|raw| parse_timestamp(&raw))
                            .transpose()?,
                    }))
                }
                None => Ok(None),
            }
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table: "credentials",
            column: "expires_at",
            detail: e.to_string(),
        })
}
