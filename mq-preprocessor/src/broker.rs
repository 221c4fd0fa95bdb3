//! Broker capability traits and the delivery model.
//!
//! The core never talks to a broker directly: a transport binding implements
//! these traits and the pipeline consumes them as trait objects, mirroring
//! how the rest of the system stays transport-agnostic.

use crate::error::{DeliveryError, TransportError};
use crate::observability::events;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Broker endpoint parameters, read once at process start and assumed
/// constant for the process lifetime.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "ANONYMOUS".to_string(),
            password: None,
            use_tls: false,
        }
    }
}

impl BrokerConfig {
    /// `host:port` label used in logs and connected-endpoint strings.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens physical broker connections. Implemented by transport bindings,
/// injected into the [`ConnectionManager`](crate::ConnectionManager).
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open(&self, config: &BrokerConfig)
        -> Result<Arc<dyn BrokerConnection>, TransportError>;
}

/// One physical, link-multiplexing broker connection shared by all routes.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Opens a receiving link sourced at `address` with manual
    /// acknowledgment: deliveries stay unsettled until the handler disposes
    /// them.
    async fn create_receiver(&self, address: &str)
        -> Result<Arc<dyn BrokerReceiver>, TransportError>;

    /// Opens a sending link targeting `address`.
    async fn create_sender(&self, address: &str) -> Result<Arc<dyn BrokerSender>, TransportError>;

    /// Closes the physical connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Receiving link bound to one source queue.
#[async_trait]
pub trait BrokerReceiver: Send + Sync {
    /// The source address this link consumes from.
    fn address(&self) -> &str;

    /// Registers the delivery handler and starts consuming.
    async fn subscribe(&self, handler: Arc<dyn DeliveryHandler>) -> Result<(), TransportError>;

    /// Releases the link.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Sending link bound to one destination queue.
#[async_trait]
pub trait BrokerSender: Send + Sync {
    /// Publishes one JSON payload, resolving once the broker settles it.
    async fn send(&self, payload: &Value) -> Result<(), TransportError>;
}

/// Invoked once per arriving delivery, possibly concurrently with earlier
/// deliveries whose sends are still in flight.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn on_delivery(&self, delivery: Delivery);
}

/// Broker-side settlement of one delivery. Implemented by transport
/// bindings; invoked at most once per delivery by [`Disposition`].
#[async_trait]
pub trait DispositionHandle: Send + Sync {
    async fn settle(&self, outcome: DeliveryOutcome) -> Result<(), TransportError>;
}

/// Terminal delivery dispositions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryOutcome {
    /// Durably delivered downstream; the broker must not redeliver.
    Accepted,
    /// Permanently malformed or non-conforming; the broker must not
    /// redeliver to this consumer.
    Rejected,
    /// Transient failure; the broker may redeliver.
    Released,
}

impl Display for DeliveryOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Accepted => write!(f, "accepted"),
            DeliveryOutcome::Rejected => write!(f, "rejected"),
            DeliveryOutcome::Released => write!(f, "released"),
        }
    }
}

/// Inbound message payload in the shapes transports hand over.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageBody {
    /// Body already carried as text.
    Text(String),
    /// Structured body section wrapping binary content.
    Content(Vec<u8>),
    /// Raw binary buffer.
    Binary(Vec<u8>),
}

impl MessageBody {
    /// Decodes the body to text: `Text` verbatim, the binary shapes as
    /// UTF-8.
    pub fn decode(&self) -> Result<String, DeliveryError> {
        match self {
            MessageBody::Text(text) => Ok(text.clone()),
            MessageBody::Content(bytes) | MessageBody::Binary(bytes) => {
                Ok(String::from_utf8(bytes.clone())?)
            }
        }
    }
}

/// One received message together with its settlement cell.
pub struct Delivery {
    /// The payload, absent when the arrival carried no body at all.
    pub body: Option<MessageBody>,
    pub disposition: Disposition,
}

/// First-wins settlement cell for one delivery.
///
/// Exactly one of accept/reject/release reaches the broker. Later settles
/// are ignored and logged at debug, which is what lets a validation-failure
/// reject stand even though the pipeline still runs the send step afterward.
pub struct Disposition {
    outcome: Mutex<Option<DeliveryOutcome>>,
    handle: Arc<dyn DispositionHandle>,
}

impl Disposition {
    pub fn new(handle: Arc<dyn DispositionHandle>) -> Self {
        Self {
            outcome: Mutex::new(None),
            handle,
        }
    }

    pub async fn accept(&self) {
        self.settle(DeliveryOutcome::Accepted).await;
    }

    pub async fn reject(&self) {
        self.settle(DeliveryOutcome::Rejected).await;
    }

    pub async fn release(&self) {
        self.settle(DeliveryOutcome::Released).await;
    }

    /// The outcome recorded so far, if any.
    pub fn outcome(&self) -> Option<DeliveryOutcome> {
        *self
            .outcome
            .lock()
            .expect("disposition state lock poisoned")
    }

    async fn settle(&self, outcome: DeliveryOutcome) {
        {
            let mut recorded = self
                .outcome
                .lock()
                .expect("disposition state lock poisoned");
            if let Some(existing) = *recorded {
                debug!(
                    event = events::DELIVERY_ALREADY_SETTLED,
                    existing = %existing,
                    ignored = %outcome,
                    "delivery already settled"
                );
                return;
            }
            *recorded = Some(outcome);
        }

        if let Err(err) = self.handle.settle(outcome).await {
            warn!(
                event = events::DELIVERY_SETTLE_FAILED,
                outcome = %outcome,
                %err,
                "failed to settle delivery with broker"
            );
        }
    }
}
