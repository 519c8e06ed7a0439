//! SQL DDL for the courier database.
//!
//! WAL mode + foreign keys enabled at connection time. Conversations store
//! the creation-time direction (`sender_id`/`receiver_id`) alongside the
//! normalized pair (`pair_low`/`pair_high`, lexicographic); the UNIQUE
//! constraint on the normalized pair is what guarantees at most one
//! conversation per unordered pair. Messages carry a per-conversation `seq`
//! recording append order.
//!
//! Participant ids are not foreign keys: the messaging core accepts ids
//! minted by the external identity system without requiring a directory row.

/// Current schema version, written to `schema_version` on first open.
pub const SCHEMA_VERSION: u32 = 1;

/// All table and index definitions.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    profile_pic TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    expires_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    pair_low TEXT NOT NULL,
    pair_high TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (pair_low, pair_high)
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    seq INTEGER NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    image_url TEXT NOT NULL DEFAULT '',
    video_url TEXT NOT NULL DEFAULT '',
    msg_by_user_id TEXT NOT NULL,
    seen INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (conversation_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
CREATE INDEX IF NOT EXISTS idx_conversations_sender ON conversations(sender_id);
CREATE INDEX IF NOT EXISTS idx_conversations_receiver ON conversations(receiver_id);
CREATE INDEX IF NOT EXISTS idx_credentials_user ON credentials(user_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
";

/// Connection pragmas applied before any query.
pub const PRAGMAS: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
";
