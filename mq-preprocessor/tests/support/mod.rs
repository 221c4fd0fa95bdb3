//! In-memory broker used by the integration tests: records opens, links,
//! sends, and settlements, with injectable failures at every seam.

#![allow(dead_code)]

use async_trait::async_trait;
use mq_preprocessor::broker::{
    BrokerConfig, BrokerConnection, BrokerConnector, BrokerReceiver, BrokerSender, Delivery,
    DeliveryHandler, DeliveryOutcome, Disposition, DispositionHandle, MessageBody,
};
use mq_preprocessor::TransportError;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Connector handing out one shared in-memory connection per open.
pub struct MockConnector {
    pub opens: AtomicUsize,
    failures_remaining: AtomicUsize,
    open_delay: Duration,
    fail_receiver_for: Mutex<Option<String>>,
    last: Mutex<Option<Arc<MockConnection>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            open_delay: Duration::ZERO,
            fail_receiver_for: Mutex::new(None),
            last: Mutex::new(None),
        }
    }

    /// Fails the first `count` physical opens before succeeding.
    pub fn failing_first(count: usize) -> Self {
        let connector = Self::new();
        connector.failures_remaining.store(count, Ordering::SeqCst);
        connector
    }

    /// Keeps every open in flight for `delay`, so concurrent acquires
    /// overlap with the pending open.
    pub fn with_open_delay(delay: Duration) -> Self {
        let mut connector = Self::new();
        connector.open_delay = delay;
        connector
    }

    /// Makes `create_receiver` fail for the given source address.
    pub fn fail_receiver_for(self, address: &str) -> Self {
        *self.fail_receiver_for.lock().unwrap() = Some(address.to_string());
        self
    }

    /// The most recently opened connection.
    pub fn connection(&self) -> Arc<MockConnection> {
        self.last
            .lock()
            .unwrap()
            .clone()
            .expect("no connection has been opened")
    }
}

#[async_trait]
impl BrokerConnector for MockConnector {
    async fn open(
        &self,
        _config: &BrokerConfig,
    ) -> Result<Arc<dyn BrokerConnection>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return Err(TransportError::new("injected open failure"));
        }

        let connection = Arc::new(MockConnection {
            fail_receiver_for: self.fail_receiver_for.lock().unwrap().clone(),
            ..MockConnection::default()
        });
        *self.last.lock().unwrap() = Some(connection.clone());
        Ok(connection)
    }
}

#[derive(Default)]
pub struct MockConnection {
    pub receivers: Mutex<Vec<Arc<MockReceiver>>>,
    pub senders: Mutex<Vec<Arc<MockSender>>>,
    pub closes: AtomicUsize,
    fail_receiver_for: Option<String>,
}

impl MockConnection {
    pub fn receiver(&self, index: usize) -> Arc<MockReceiver> {
        self.receivers.lock().unwrap()[index].clone()
    }

    pub fn sender(&self, index: usize) -> Arc<MockSender> {
        self.senders.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl BrokerConnection for MockConnection {
    async fn create_receiver(
        &self,
        address: &str,
    ) -> Result<Arc<dyn BrokerReceiver>, TransportError> {
        if self.fail_receiver_for.as_deref() == Some(address) {
            return Err(TransportError::new(format!(
                "injected receiver failure for {address}"
            )));
        }
        let receiver = Arc::new(MockReceiver::new(address));
        self.receivers.lock().unwrap().push(receiver.clone());
        Ok(receiver)
    }

    async fn create_sender(&self, address: &str) -> Result<Arc<dyn BrokerSender>, TransportError> {
        let sender = Arc::new(MockSender::new(address));
        self.senders.lock().unwrap().push(sender.clone());
        Ok(sender)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockReceiver {
    address: String,
    handler: Mutex<Option<Arc<dyn DeliveryHandler>>>,
    pub closed: AtomicBool,
    pub fail_close: AtomicBool,
}

impl MockReceiver {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            handler: Mutex::new(None),
            closed: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
        }
    }

    /// Drives one delivery through the subscribed handler and returns the
    /// broker-visible settlement record.
    pub async fn deliver(&self, body: Option<MessageBody>) -> Arc<SettlementRecord> {
        let handler = self
            .handler
            .lock()
            .unwrap()
            .clone()
            .expect("no handler subscribed");
        let record = Arc::new(SettlementRecord::default());
        handler
            .on_delivery(Delivery {
                body,
                disposition: Disposition::new(record.clone()),
            })
            .await;
        record
    }

    pub async fn deliver_text(&self, text: &str) -> Arc<SettlementRecord> {
        self.deliver(Some(MessageBody::Text(text.to_string()))).await
    }
}

#[async_trait]
impl BrokerReceiver for MockReceiver {
    fn address(&self) -> &str {
        &self.address
    }

    async fn subscribe(&self, handler: Arc<dyn DeliveryHandler>) -> Result<(), TransportError> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::new("injected close failure"));
        }
        Ok(())
    }
}

pub struct MockSender {
    pub to: String,
    pub attempts: AtomicUsize,
    pub fail_sends: AtomicBool,
    pub sent: Mutex<Vec<Value>>,
}

impl MockSender {
    fn new(to: &str) -> Self {
        Self {
            to: to.to_string(),
            attempts: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BrokerSender for MockSender {
    async fn send(&self, payload: &Value) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::new("injected send failure"));
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Broker-side settlement record for one delivery. The settlement cell in
/// the core guarantees at most one entry; `outcome` asserts it.
#[derive(Default)]
pub struct SettlementRecord {
    settled: Mutex<Vec<DeliveryOutcome>>,
}

impl SettlementRecord {
    pub fn outcome(&self) -> Option<DeliveryOutcome> {
        let settled = self.settled.lock().unwrap();
        assert!(settled.len() <= 1, "delivery settled more than once");
        settled.first().copied()
    }
}

#[async_trait]
impl DispositionHandle for SettlementRecord {
    async fn settle(&self, outcome: DeliveryOutcome) -> Result<(), TransportError> {
        self.settled.lock().unwrap().push(outcome);
        Ok(())
    }
}

/// Writes a schema/template fixture under the system temp directory.
pub fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "mq-preprocessor-it-{}-{name}",
        std::process::id()
    ));
    std::fs::write(&path, contents).expect("fixture write should succeed");
    path
}
