//! Conversation and message repository.
//!
//! One conversation per unordered user pair, created lazily on first
//! message. The pair is normalized to `(pair_low, pair_high)` by
//! lexicographic order and guarded by a UNIQUE constraint, so concurrent
//! first messages between the same two users converge on a single row no
//! matter the argument order. Messages carry a per-conversation `seq`
//! assigned at insert time; append order and `seq` order are the same
//! thing.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::instrument;

use courier_core::ids::{ConversationId, MessageId, UserId};
use courier_core::model::{Conversation, ConversationSummary, Message, MessageDraft, UserProfile};

use crate::database::Database;
use crate::error::StoreError;

/// Read/write access to the `conversations` and `messages` tables.
pub struct ConversationRepo {
    db: Database,
}

impl ConversationRepo {
    /// Create a repo over the shared database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Find the conversation for the pair in either order, creating it with
    /// an empty message sequence if absent.
    #[instrument(skip(self), fields(user_a = %user_a, user_b = %user_b))]
    pub fn find_or_create(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Conversation, StoreError> {
        let (low, high) = normalize_pair(user_a, user_b);
        let id = ConversationId::new();
        let now = Utc::now();

        self.db.with_conn(|conn| {
            // INSERT OR IGNORE + SELECT: the UNIQUE(pair_low, pair_high)
            // constraint makes the first writer win and every later caller
            // read the winner's row.
            let _ = conn.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, sender_id, receiver_id, pair_low, pair_high, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    user_a.as_str(),
                    user_b.as_str(),
                    low,
                    high,
                    now.to_rfc3339(),
                ],
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, created_at
                 FROM conversations WHERE pair_low = ?1 AND pair_high = ?2",
            )?;
            let mut rows = stmt.query([low, high])?;
            match rows.next()? {
                Some(row) => row_to_conversation(row),
                None => Err(StoreError::NotFound(format!(
                    "conversation for pair {low}/{high}"
                ))),
            }
        })
    }

    /// Persist a message and link it at the tail of the conversation's
    /// sequence. Both halves commit together; on any failure nothing is
    /// linked.
    #[instrument(skip(self, draft), fields(conversation_id = %conversation_id, sender = %sender))]
    pub fn append_message(
        &self,
        conversation_id: &ConversationId,
        sender: &UserId,
        draft: &MessageDraft,
    ) -> Result<Message, StoreError> {
        let id = MessageId::new();
        let now = Utc::now();

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
                [conversation_id.as_str()],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!(
                    "conversation {conversation_id}"
                )));
            }

            let _ = tx.execute(
                "INSERT INTO messages
                     (id, conversation_id, seq, text, image_url, video_url,
                      msg_by_user_id, seen, created_at)
                 VALUES (?1, ?2,
                         (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages
                          WHERE conversation_id = ?2),
                         ?3, ?4, ?5, ?6, 0, ?7)",
                rusqlite::params![
                    id.as_str(),
                    conversation_id.as_str(),
                    draft.text,
                    draft.image_url,
                    draft.video_url,
                    sender.as_str(),
                    now.to_rfc3339(),
                ],
            )?;
            tx.commit()?;

            Ok(Message {
                id,
                text: draft.text.clone(),
                image_url: draft.image_url.clone(),
                video_url: draft.video_url.clone(),
                msg_by_user_id: sender.clone(),
                seen: false,
                created_at: now,
            })
        })
    }

    /// Full message history for the pair's conversation in append order;
    /// empty when no conversation exists yet.
    #[instrument(skip(self), fields(user_a = %user_a, user_b = %user_b))]
    pub fn list_messages(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Vec<Message>, StoreError> {
        let (low, high) = normalize_pair(user_a, user_b);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.text, m.image_url, m.video_url, m.msg_by_user_id,
                        m.seen, m.created_at
                 FROM messages m
                 JOIN conversations c ON m.conversation_id = c.id
                 WHERE c.pair_low = ?1 AND c.pair_high = ?2
                 ORDER BY m.seq ASC",
            )?;
            let mut rows = stmt.query([low, high])?;
            let mut messages = Vec::new();
            while let Some(row) = rows.next()? {
                messages.push(row_to_message(row)?);
            }
            Ok(messages)
        })
    }

    /// One summary per conversation involving `user_id`, with unseen count
    /// and last message computed fresh.
    ///
    /// Order is most-recent-activity-first: conversations holding the
    /// latest-appended messages first, conversations with no messages last
    /// by creation recency, ties broken by conversation id.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn summaries_for(&self, user_id: &UserId) -> Result<Vec<ConversationSummary>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.sender_id, c.receiver_id, c.created_at
                 FROM conversations c
                 WHERE c.sender_id = ?1 OR c.receiver_id = ?1
                 ORDER BY COALESCE((SELECT MAX(m.rowid) FROM messages m
                                    WHERE m.conversation_id = c.id), -1) DESC,
                          c.created_at DESC, c.id ASC",
            )?;
            let mut rows = stmt.query([user_id.as_str()])?;
            let mut conversations = Vec::new();
            while let Some(row) = rows.next()? {
                conversations.push(row_to_conversation(row)?);
            }

            let mut summaries = Vec::with_capacity(conversations.len());
            for conv in conversations {
                summaries.push(ConversationSummary {
                    unseen_msg: unseen_count(conn, &conv.id)?,
                    last_msg: last_message(conn, &conv.id)?,
                    sender: profile_or_unknown(conn, conv.sender.clone())?,
                    receiver: profile_or_unknown(conn, conv.receiver.clone())?,
                    id: conv.id,
                });
            }
            Ok(summaries)
        })
    }
}

/// Lexicographic normalization of an unordered pair.
fn normalize_pair<'a>(a: &'a UserId, b: &'a UserId) -> (&'a str, &'a str) {
    if a.as_str() <= b.as_str() {
        (a.as_str(), b.as_str())
    } else {
        (b.as_str(), a.as_str())
    }
}

fn unseen_count(conn: &Connection, id: &ConversationId) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND seen = 0",
        [id.as_str()],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or_default())
}

fn last_message(conn: &Connection, id: &ConversationId) -> Result<Option<Message>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, text, image_url, video_url, msg_by_user_id, seen, created_at
         FROM messages WHERE conversation_id = ?1
         ORDER BY seq DESC LIMIT 1",
    )?;
    let mut rows = stmt.query([id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_message(row)?)),
        None => Ok(None),
    }
}

fn profile_or_unknown(conn: &Connection, id: UserId) -> Result<UserProfile, StoreError> {
    let mut stmt =
        conn.prepare("SELECT name, email, profile_pic FROM users WHERE id = ?1")?;
    let mut rows = stmt.query([id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(UserProfile {
            id,
            name: Some(row.get(0)?),
            email: Some(row.get(1)?),
            profile_pic: Some(row.get(2)?),
        }),
        None => Ok(UserProfile::unknown(id)),
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, StoreError> {
    Ok(Conversation {
        id: ConversationId::from_string(row.get(0)?),
        sender: UserId::from_string(row.get(1)?),
        receiver: UserId::from_string(row.get(2)?),
        created_at: parse_timestamp(&row.get::<_, String>(3)?, "conversations")?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, StoreError> {
    Ok(Message {
        id: MessageId::from_string(row.get(0)?),
        text: row.get(1)?,
        image_url: row.get(2)?,
        video_url: row.get(3)?,
        msg_by_user_id: UserId::from_string(row.get(4)?),
        seen: row.get(5)?,
        created_at: parse_timestamp(&row.get::<_, String>(6)?, "messages")?,
    })
}

fn parse_timestamp(raw: &str, table: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column: "created_at",
            detail: e.to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
