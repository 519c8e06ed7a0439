//! # courier-auth
//!
//! Credential resolution for courier connections.
//!
//! A connection attempt presents an opaque credential; resolution maps it to
//! a [`courier_core::UserIdentity`] or rejects the attempt outright. Two
//! resolvers are provided:
//! - [`StoreTokenResolver`]: looks tokens up in the `credentials` table
//! - [`StaticResolver`]: fixed roster for development and tests
//!
//! Resolution failures are always fatal to the attempt; nothing downstream
//! of auth ever sees an unresolved caller.

#![deny(unsafe_code)]

pub mod errors;
pub mod resolver;

pub use errors::AuthError;
pub use resolver::{IdentityResolver, StaticResolver, StoreTokenResolver};
