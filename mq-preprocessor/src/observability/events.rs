//! Canonical structured event names used across `mq-preprocessor`.

// Connection lifecycle events.
pub const CONNECTION_OPEN_OK: &str = "connection_open_ok";
pub const CONNECTION_CLOSE: &str = "connection_close";
pub const CONNECTION_CLOSE_FAILED: &str = "connection_close_failed";

// Route lifecycle events.
pub const ROUTE_CONSUME_START: &str = "route_consume_start";
pub const ROUTE_START_OK: &str = "route_start_ok";
pub const ROUTE_START_FAILED: &str = "route_start_failed";
pub const RECEIVER_CLOSE: &str = "receiver_close";
pub const RECEIVER_CLOSE_FAILED: &str = "receiver_close_failed";
pub const SHUTDOWN_COMPLETE: &str = "shutdown_complete";

// Per-delivery pipeline events.
pub const DELIVERY_RECEIVED: &str = "delivery_received";
pub const DELIVERY_EMPTY: &str = "delivery_empty";
pub const DELIVERY_FAILED: &str = "delivery_failed";
pub const VALIDATION_FAILED: &str = "validation_failed";
pub const SEND_OK: &str = "send_ok";
pub const SEND_FAILED: &str = "send_failed";

// Delivery-settlement events.
pub const DELIVERY_ALREADY_SETTLED: &str = "delivery_already_settled";
pub const DELIVERY_SETTLE_FAILED: &str = "delivery_settle_failed";
