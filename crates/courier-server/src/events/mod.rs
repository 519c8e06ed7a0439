//! Inbound event dispatch: context, error taxonomy, registry, handlers.

pub mod context;
pub mod error;
pub mod handlers;
pub mod registry;

pub use context::EventContext;
pub use error::EventError;
pub use handlers::register_builtin;
pub use registry::{EventHandler, EventRegistry};
