//! Construction and coordination of the per-route processors.

use crate::connection::ConnectionManager;
use crate::observability::events;
use crate::processor::RouteProcessor;
use crate::route::QueueRoute;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

const COMPONENT: &str = "supervisor";

/// Owns one [`RouteProcessor`] per configured route and coordinates startup
/// and graceful shutdown across all of them.
pub struct Supervisor {
    processors: Vec<RouteProcessor>,
}

impl Supervisor {
    /// Builds one processor per route, all sharing `connections`.
    pub fn new(routes: Vec<QueueRoute>, connections: Arc<ConnectionManager>) -> Self {
        let processors = routes
            .into_iter()
            .map(|route| RouteProcessor::new(route, connections.clone()))
            .collect();
        Self { processors }
    }

    /// Number of managed routes.
    pub fn route_count(&self) -> usize {
        self.processors.len()
    }

    /// Starts every processor concurrently and returns how many are
    /// consuming.
    ///
    /// A route that fails to start is logged and left non-consuming; its
    /// siblings are unaffected.
    pub async fn start(&mut self) -> usize {
        let startups = self.processors.iter_mut().map(|processor| async move {
            let from = processor.route().from.clone();
            match processor.run().await {
                Ok(endpoint) => {
                    info!(
                        event = events::ROUTE_START_OK,
                        component = COMPONENT,
                        %endpoint,
                        "route consuming"
                    );
                    true
                }
                Err(err) => {
                    error!(
                        event = events::ROUTE_START_FAILED,
                        component = COMPONENT,
                        %from,
                        %err,
                        "route startup failed"
                    );
                    false
                }
            }
        });

        join_all(startups)
            .await
            .into_iter()
            .filter(|started| *started)
            .count()
    }

    /// Closes every processor concurrently and waits for all to settle.
    ///
    /// Individual close failures are logged inside
    /// [`RouteProcessor::close`] and never block sibling closes or process
    /// exit. The shared connection is closed by whichever processor gets
    /// there first; the rest find the slot already empty.
    pub async fn shutdown(&mut self) {
        join_all(self.processors.iter_mut().map(RouteProcessor::close)).await;
        info!(
            event = events::SHUTDOWN_COMPLETE,
            component = COMPONENT,
            "all routes closed"
        );
    }
}
