//! Shared broker-connection ownership and single-flight acquisition.

use crate::broker::{BrokerConfig, BrokerConnection, BrokerConnector};
use crate::error::TransportError;
use crate::observability::events;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "connection_manager";

/// Owner of the process-wide broker connection.
///
/// Exactly one physical connection is shared by every route, reusing the
/// broker's link multiplexing. Opening is lazy and single-flight: concurrent
/// first acquires queue behind one open instead of racing duplicate
/// connections, and a failed open leaves the slot empty so the next acquire
/// retries from scratch.
pub struct ConnectionManager {
    config: BrokerConfig,
    connector: Arc<dyn BrokerConnector>,
    slot: Mutex<Option<Arc<dyn BrokerConnection>>>,
}

impl ConnectionManager {
    pub fn new(config: BrokerConfig, connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            config,
            connector,
            slot: Mutex::new(None),
        }
    }

    /// Returns the shared connection, opening it on first use.
    pub async fn acquire(&self) -> Result<Arc<dyn BrokerConnection>, TransportError> {
        // Holding the slot lock across the open await is the single-flight
        // guard: every concurrent first acquire queues here and then reads
        // the filled slot.
        let mut slot = self.slot.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let connection = self.connector.open(&self.config).await?;
        debug!(
            event = events::CONNECTION_OPEN_OK,
            component = COMPONENT,
            endpoint = %self.config.endpoint(),
            tls = self.config.use_tls,
            "connected to broker"
        );
        *slot = Some(connection.clone());
        Ok(connection)
    }

    /// Closes the shared connection if one is open and empties the slot so a
    /// later [`acquire`](Self::acquire) recreates it.
    ///
    /// Best-effort: close failures are logged, never returned. Safe to call
    /// concurrently and repeatedly; only the first call finds a connection.
    pub async fn close(&self) {
        let taken = self.slot.lock().await.take();
        if let Some(connection) = taken {
            info!(
                event = events::CONNECTION_CLOSE,
                component = COMPONENT,
                endpoint = %self.config.endpoint(),
                "closing broker connection"
            );
            if let Err(err) = connection.close().await {
                warn!(
                    event = events::CONNECTION_CLOSE_FAILED,
                    component = COMPONENT,
                    %err,
                    "broker connection close failed"
                );
            }
        }
    }

    /// `host:port` of the configured broker.
    pub fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionManager;
    use crate::broker::{
        BrokerConfig, BrokerConnection, BrokerConnector, BrokerReceiver, BrokerSender,
    };
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct StubConnection;

    #[async_trait]
    impl BrokerConnection for StubConnection {
        async fn create_receiver(
            &self,
            _address: &str,
        ) -> Result<Arc<dyn BrokerReceiver>, TransportError> {
            Err(TransportError::new("not used in these tests"))
        }

        async fn create_sender(
            &self,
            _address: &str,
        ) -> Result<Arc<dyn BrokerSender>, TransportError> {
            Err(TransportError::new("not used in these tests"))
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Connector that counts physical opens and can fail the first N of them.
    struct CountingConnector {
        opens: AtomicUsize,
        failures_remaining: AtomicUsize,
        open_delay: Duration,
    }

    impl CountingConnector {
        fn new(failures_remaining: usize, open_delay: Duration) -> Self {
            Self {
                opens: AtomicUsize::new(0),
                failures_remaining: AtomicUsize::new(failures_remaining),
                open_delay,
            }
        }
    }

    #[async_trait]
    impl BrokerConnector for CountingConnector {
        async fn open(
            &self,
            _config: &BrokerConfig,
        ) -> Result<Arc<dyn BrokerConnection>, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.open_delay).await;
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok()
            {
                return Err(TransportError::new("injected open failure"));
            }
            Ok(Arc::new(StubConnection))
        }
    }

    fn manager(connector: CountingConnector) -> (Arc<ConnectionManager>, Arc<CountingConnector>) {
        let connector = Arc::new(connector);
        let manager = Arc::new(ConnectionManager::new(
            BrokerConfig::default(),
            connector.clone(),
        ));
        (manager, connector)
    }

    #[tokio::test]
    async fn concurrent_acquires_share_one_open() {
        let (manager, connector) =
            manager(CountingConnector::new(0, Duration::from_millis(50)));

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await })
        };
        let second = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn failed_open_does_not_poison_later_acquires() {
        let (manager, connector) = manager(CountingConnector::new(1, Duration::ZERO));

        assert!(manager.acquire().await.is_err());
        assert!(manager.acquire().await.is_ok());
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acquire_after_close_reopens() {
        let (manager, connector) = manager(CountingConnector::new(0, Duration::ZERO));

        manager.acquire().await.unwrap();
        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);

        manager.close().await;
        manager.acquire().await.unwrap();
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_without_connection_is_a_no_op() {
        let (manager, connector) = manager(CountingConnector::new(0, Duration::ZERO));

        manager.close().await;
        manager.close().await;
        assert_eq!(connector.opens.load(Ordering::SeqCst), 0);
    }
}
