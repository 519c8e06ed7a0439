//! Event name registry and async dispatch.
//!
//! A single dispatch table maps inbound event names to handlers with one
//! fixed signature. Unknown names are ignored the way an unregistered
//! listener would be; handler failures are translated at this boundary and
//! never escape to other connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, warn};

use courier_core::ServerEvent;

use crate::metrics::{EVENT_DURATION_SECONDS, EVENT_ERRORS_TOTAL, EVENTS_TOTAL};
use super::context::EventContext;
use super::error::EventError;

/// Trait implemented by every inbound event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Execute the handler with the given payload and connection context.
    async fn handle(&self, payload: Value, ctx: &EventContext) -> Result<(), EventError>;
}

/// Registry mapping event names to handlers.
pub struct EventRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an event name.
    pub fn register(&mut self, event: &str, handler: impl EventHandler + 'static) {
        let _ = self.handlers.insert(event.to_owned(), Arc::new(handler));
    }

    /// Maximum time a single event handler is allowed to run.
    const HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

    /// Dispatch an inbound event to its handler.
    ///
    /// Failures stop here: a silent validation drop is logged at debug,
    /// everything else is answered with an `error` event to the
    /// originating connection alone.
    pub async fn dispatch(&self, event: &str, payload: Value, ctx: &EventContext) {
        let Some(handler) = self.handlers.get(event) else {
            debug!(event, "ignoring unknown event");
            return;
        };
        counter!(EVENTS_TOTAL, "event" => event.to_owned()).increment(1);

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(Self::HANDLER_TIMEOUT, handler.handle(payload, ctx)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                counter!(EVENT_ERRORS_TOTAL, "event" => event.to_owned(), "error_type" => err.kind())
                    .increment(1);
                match err.client_message() {
                    Some(message) => {
                        warn!(event, error = %err, "event handler failed");
                        let _ = ctx.reply(&ServerEvent::error(message));
                    }
                    None => debug!(event, error = %err, "event dropped"),
                }
            }
            Err(_elapsed) => {
                counter!(EVENT_ERRORS_TOTAL, "event" => event.to_owned(), "error_type" => "timeout")
                    .increment(1);
                warn!(event, "event handler timed out after {:?}", Self::HANDLER_TIMEOUT);
                let _ = ctx.reply(&ServerEvent::error("request timed out"));
            }
        }

        histogram!(EVENT_DURATION_SECONDS, "event" => event.to_owned())
            .record(start.elapsed().as_secs_f64());
    }

    /// List all registered event names (sorted).
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether an event name is registered.
    pub fn has_event(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handlers::test_helpers::make_test_context;
    use serde_json::json;

    struct OkHandler;

    #[async_trait]
    impl EventHandler for OkHandler {
        async fn handle(&self, payload: Value, ctx: &EventContext) -> Result<(), EventError> {
            let _ = ctx.reply(&ServerEvent::error(format!("echo {payload}")));
            Ok(())
        }
    }

    struct FailHandler;

    #[async_trait]
    impl EventHandler for FailHandler {
        async fn handle(&self, _payload: Value, _ctx: &EventContext) -> Result<(), EventError> {
            Err(EventError::InvalidPayload("bad shape".into()))
        }
    }

    struct SilentFailHandler;

    #[async_trait]
    impl EventHandler for SilentFailHandler {
        async fn handle(&self, _payload: Value, _ctx: &EventContext) -> Result<(), EventError> {
            Err(EventError::EmptyMessage)
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl EventHandler for SlowHandler {
        async fn handle(&self, _payload: Value, _ctx: &EventContext) -> Result<(), EventError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_runs_registered_handler() {
        let (ctx, mut rx) = make_test_context("u-ann");
        let mut reg = EventRegistry::new();
        reg.register("echo", OkHandler);

        reg.dispatch("echo", json!("hi"), &ctx).await;

        let frame = rx.try_recv().unwrap();
        assert!(frame.contains("echo"));
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        let (ctx, mut rx) = make_test_context("u-ann");
        let reg = EventRegistry::new();

        reg.dispatch("no-such", json!(null), &ctx).await;

        assert!(rx.try_recv().is_err(), "no reply for unknown events");
    }

    #[tokio::test]
    async fn handler_failure_replies_error_to_origin() {
        let (ctx, mut rx) = make_test_context("u-ann");
        let mut reg = EventRegistry::new();
        reg.register("fail", FailHandler);

        reg.dispatch("fail", json!(null), &ctx).await;

        let frame = rx.try_recv().unwrap();
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "error");
        assert!(parsed["data"]["message"].as_str().unwrap().contains("bad shape"));
    }

    #[tokio::test]
    async fn silent_failures_produce_no_reply() {
        let (ctx, mut rx) = make_test_context("u-ann");
        let mut reg = EventRegistry::new();
        reg.register("drop", SilentFailHandler);

        reg.dispatch("drop", json!(null), &ctx).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn timeout_replies_error() {
        tokio::time::pause();

        let (ctx, mut rx) = make_test_context("u-ann");
        let mut reg = EventRegistry::new();
        reg.register("slow", SlowHandler);

        reg.dispatch("slow", json!(null), &ctx).await;

        let frame = rx.try_recv().unwrap();
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "error");
        assert!(parsed["data"]["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn list_and_check_events() {
        let mut reg = EventRegistry::new();
        reg.register("sidebar", OkHandler);
        reg.register("message-page", OkHandler);

        assert_eq!(reg.events(), vec!["message-page", "sidebar"]);
        assert!(reg.has_event("sidebar"));
        assert!(!reg.has_event("new-message"));
    }

    #[tokio::test]
    async fn register_overwrites_previous() {
        let (ctx, mut rx) = make_test_context("u-ann");
        let mut reg = EventRegistry::new();
        reg.register("test", OkHandler);
        reg.register("test", SilentFailHandler);

        reg.dispatch("test", json!(null), &ctx).await;
        assert!(rx.try_recv().is_err());
    }
}
