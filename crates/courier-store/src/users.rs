//! User directory repository.

use chrono::Utc;
use tracing::instrument;

use courier_core::UserIdentity;
use courier_core::ids::UserId;

use crate::database::Database;
use crate::error::StoreError;

/// Read/write access to the `users` table.
///
/// Account registration itself lives outside this service; rows are created
/// by the operator tooling (or test setup) and read by the resolver and the
/// message-page handler.
pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    /// Create a repo over the shared database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a user row.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn insert(&self, user: &UserIdentity) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO users (id, name, email, profile_pic, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.id.as_str(),
                    user.name,
                    user.email,
                    user.profile_pic,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Look up a user by id. Unknown ids are `None`, not an error.
    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<Option<UserIdentity>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, profile_pic FROM users WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(UserIdentity {
                    id: UserId::from_string(row.get(0)?),
                    name: row.get(1)?,
                    email: row.get(2)?,
                    profile_pic: row.get(3)?,
                })),
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn repo() -> UserRepo {
        UserRepo::new(Database::in_memory().unwrap())
    }

    fn ann() -> UserIdentity {
        UserIdentity {
            id: UserId::from("u-ann"),
            name: "Ann".into(),
            email: "ann@example.com".into(),
            profile_pic: "https://cdn/ann.png".into(),
        }
    }

    #[test]
    fn insert_then_get() {
        let repo = repo();
        repo.insert(&ann()).unwrap();
        let got = repo.get(&UserId::from("u-ann")).unwrap().unwrap();
        assert_eq!(got, ann());
    }

    #[test]
    fn unknown_user_is_none() {
        let repo = repo();
        assert!(repo.get(&UserId::from("ghost")).unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let repo = repo();
        repo.insert(&ann()).unwrap();
        let dup = UserIdentity {
            id: UserId::from("u-other"),
            ..ann()
        };
        let err = repo.insert(&dup).unwrap_err();
        assert_matches!(err, StoreError::Database(_));
    }
}
