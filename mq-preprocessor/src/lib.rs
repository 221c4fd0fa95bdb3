/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # mq-preprocessor
//!
//! Core library of the queue-preprocessing bridge: for every configured
//! [`QueueRoute`], consume messages from a source queue, optionally validate
//! the JSON payload against a schema, optionally transform it through a
//! template, and republish each result onto a destination queue — settling
//! the inbound delivery as accepted, rejected, or released depending on how
//! the pipeline fared.
//!
//! Broker transports stay behind the capability traits in [`broker`]; a
//! binding such as `mq-preprocessor-amqp` supplies the physical connection.
//! All routes share one connection, owned by [`ConnectionManager`], and the
//! [`Supervisor`] starts and drains the per-route processors.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use mq_preprocessor::{BrokerConfig, ConnectionManager, QueueRoute, Supervisor};
//!
//! # pub mod mock_broker {
//! #     use async_trait::async_trait;
//! #     use mq_preprocessor::broker::{
//! #         BrokerConfig, BrokerConnection, BrokerConnector, BrokerReceiver, BrokerSender,
//! #         DeliveryHandler,
//! #     };
//! #     use mq_preprocessor::TransportError;
//! #     use serde_json::Value;
//! #     use std::sync::Arc;
//! #
//! #     #[derive(Default)]
//! #     pub struct MockConnector;
//! #
//! #     #[async_trait]
//! #     impl BrokerConnector for MockConnector {
//! #         async fn open(
//! #             &self,
//! #             _config: &BrokerConfig,
//! #         ) -> Result<Arc<dyn BrokerConnection>, TransportError> {
//! #             Ok(Arc::new(MockConnection))
//! #         }
//! #     }
//! #
//! #     struct MockConnection;
//! #
//! #     #[async_trait]
//! #     impl BrokerConnection for MockConnection {
//! #         async fn create_receiver(
//! #             &self,
//! #             address: &str,
//! #         ) -> Result<Arc<dyn BrokerReceiver>, TransportError> {
//! #             Ok(Arc::new(MockReceiver {
//! #                 address: address.to_string(),
//! #             }))
//! #         }
//! #
//! #         async fn create_sender(
//! #             &self,
//! #             _address: &str,
//! #         ) -> Result<Arc<dyn BrokerSender>, TransportError> {
//! #             Ok(Arc::new(MockSender))
//! #         }
//! #
//! #         async fn close(&self) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #     }
//! #
//! #     struct MockReceiver {
//! #         address: String,
//! #     }
//! #
//! #     #[async_trait]
//! #     impl BrokerReceiver for MockReceiver {
//! #         fn address(&self) -> &str {
//! #             &self.address
//! #         }
//! #
//! #         async fn subscribe(
//! #             &self,
//! #             _handler: Arc<dyn DeliveryHandler>,
//! #         ) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #
//! #         async fn close(&self) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #     }
//! #
//! #     struct MockSender;
//! #
//! #     #[async_trait]
//! #     impl BrokerSender for MockSender {
//! #         async fn send(&self, _payload: &Value) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #     }
//! # }
//! #
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let routes = QueueRoute::parse_list(
//!     r#"[{"from": "q1.pre", "to": "q1.up"}]"#,
//! ).unwrap();
//!
//! let connections = Arc::new(ConnectionManager::new(
//!     BrokerConfig::default(),
//!     Arc::new(mock_broker::MockConnector::default()),
//! ));
//!
//! let mut supervisor = Supervisor::new(routes, connections);
//! assert_eq!(supervisor.start().await, 1);
//! supervisor.shutdown().await;
//! # });
//! ```
//!
//! ## Delivery contract
//!
//! Every delivery reaches exactly one terminal disposition: **accept** when
//! all of its forwarded messages were settled by the broker, **reject** for
//! malformed or non-conforming payloads, **release** when forwarding failed
//! transiently and the broker may redeliver. The settlement cell is
//! first-wins, so a validation-failure reject stands even though the
//! pipeline still attempts the send afterwards — consumers rely on the
//! send attempt happening either way.
//!
//! ## Observability model
//!
//! The crate emits `tracing` events and does not install a global
//! subscriber. Binaries are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

pub mod broker;

mod connection;
pub use connection::ConnectionManager;

mod error;
pub use error::{DeliveryError, PreprocessError, TransportError};

#[doc(hidden)]
pub mod observability;

mod processor;
pub use processor::RouteProcessor;

mod render;
pub use render::Renderer;

mod route;
pub use route::QueueRoute;

mod supervisor;
pub use supervisor::Supervisor;

mod validate;
pub use validate::Validator;

pub use broker::{BrokerConfig, Delivery, DeliveryOutcome, Disposition, MessageBody};
