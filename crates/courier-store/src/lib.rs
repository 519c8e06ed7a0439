//! # courier-store
//!
//! The only crate that talks to durable storage. SQLite (via `rusqlite`)
//! holds users, credentials, conversations, and messages; everything else in
//! courier goes through the repositories here:
//!
//! - [`Database`]: mutex-guarded connection with `with_conn` access
//! - [`UserRepo`]: user directory (profiles by id)
//! - [`CredentialRepo`]: opaque connection tokens
//! - [`ConversationRepo`]: find-or-create per unordered pair, FIFO message
//!   append, history listing, and on-demand summaries

#![deny(unsafe_code)]

pub mod conversations;
pub mod credentials;
pub mod database;
pub mod error;
pub mod schema;
pub mod users;

pub use conversations::ConversationRepo;
pub use credentials::{CredentialRepo, CredentialRow};
pub use database::Database;
pub use error::StoreError;
pub use users::UserRepo;
