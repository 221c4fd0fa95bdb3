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

//! Per-route processing pipeline and its delivery-settlement state machine.

use crate::broker::{
    BrokerReceiver, BrokerSender, Delivery, DeliveryHandler, Disposition, MessageBody,
};
use crate::connection::ConnectionManager;
use crate::error::{DeliveryError, PreprocessError};
use crate::observability::events;
use crate::render::Renderer;
use crate::route::QueueRoute;
use crate::validate::Validator;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "route_processor";

/// Drives one queue route: a receiving link on `from`, a sending link on
/// `to`, and the per-delivery decode → parse → validate → render → forward →
/// settle pipeline between them.
pub struct RouteProcessor {
    route: QueueRoute,
    connections: Arc<ConnectionManager>,
    receiver: Option<Arc<dyn BrokerReceiver>>,
}

impl RouteProcessor {
    pub fn new(route: QueueRoute, connections: Arc<ConnectionManager>) -> Self {
        Self {
            route,
            connections,
            receiver: None,
        }
    }

    /// The route this processor serves.
    pub fn route(&self) -> &QueueRoute {
        &self.route
    }

    /// Opens the route's links, compiles its validator and renderer, and
    /// starts consuming. Returns the connected-endpoint string
    /// `host:port/from`.
    ///
    /// Re-resolves the shared connection on every call; the second call
    /// reuses it without reopening. Calling `run` twice on one processor
    /// creates a second set of links and handlers — guarding against that is
    /// the caller's concern, not this method's.
    pub async fn run(&mut self) -> Result<String, PreprocessError> {
        let connection = self.connections.acquire().await?;
        let receiver = connection.create_receiver(&self.route.from).await?;
        let sender = connection.create_sender(&self.route.to).await?;

        let validator = Validator::from_path(self.route.schema.as_deref())?;
        let renderer = Renderer::from_path(self.route.template.as_deref())?;

        info!(
            event = events::ROUTE_CONSUME_START,
            component = COMPONENT,
            from = %self.route.from,
            to = %self.route.to,
            "consuming messages from queue"
        );
        receiver
            .subscribe(Arc::new(RouteHandler {
                route: self.route.clone(),
                validator,
                renderer,
                sender,
            }))
            .await?;
        self.receiver = Some(receiver);

        Ok(format!("{}/{}", self.connections.endpoint(), self.route.from))
    }

    /// Releases the receiving link, then the shared connection, best-effort.
    ///
    /// Never fails: each sub-step failure is caught and logged independently
    /// so shutdown drains as far as it can. Idempotent — a second close finds
    /// neither a receiver nor a connection.
    pub async fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            info!(
                event = events::RECEIVER_CLOSE,
                component = COMPONENT,
                address = receiver.address(),
                "closing receiver"
            );
            if let Err(err) = receiver.close().await {
                warn!(
                    event = events::RECEIVER_CLOSE_FAILED,
                    component = COMPONENT,
                    address = receiver.address(),
                    %err,
                    "receiver close failed"
                );
            }
        }

        self.connections.close().await;
    }
}

/// Delivery handler registered on a route's receiving link.
struct RouteHandler {
    route: QueueRoute,
    validator: Validator,
    renderer: Renderer,
    sender: Arc<dyn BrokerSender>,
}

#[async_trait]
impl DeliveryHandler for RouteHandler {
    async fn on_delivery(&self, delivery: Delivery) {
        let Delivery { body, disposition } = delivery;

        let Some(body) = body else {
            error!(
                event = events::DELIVERY_EMPTY,
                component = COMPONENT,
                from = %self.route.from,
                "no message found in this delivery"
            );
            disposition.reject().await;
            return;
        };

        // Every failure inside the pipeline lands here and becomes exactly
        // one reject for this delivery.
        if let Err(err) = self.process(&body, &disposition).await {
            error!(
                event = events::DELIVERY_FAILED,
                component = COMPONENT,
                from = %self.route.from,
                %err,
                "failed when receiving message"
            );
            disposition.reject().await;
        }
    }
}

impl RouteHandler {
    /// Decode, parse, validate, render, and forward one delivery.
    async fn process(
        &self,
        body: &MessageBody,
        disposition: &Disposition,
    ) -> Result<(), DeliveryError> {
        let text = body.decode()?;
        debug!(
            event = events::DELIVERY_RECEIVED,
            component = COMPONENT,
            from = %self.route.from,
            message = %text,
            "received message"
        );

        let parsed: Value = serde_json::from_str(&text)?;

        if !self.validator.is_valid(&parsed) {
            warn!(
                event = events::VALIDATION_FAILED,
                component = COMPONENT,
                from = %self.route.from,
                message = %text,
                schema = self.validator.schema_path().unwrap_or_default(),
                "no json schema matched this message"
            );
            // Rejection deliberately does not short-circuit: the send step
            // below still runs, and the first-wins disposition keeps the
            // broker-visible outcome at rejected.
            disposition.reject().await;
        }

        let outgoing = match &parsed {
            Value::Array(items) => items
                .iter()
                .map(|item| self.renderer.render(item))
                .collect::<Result<Vec<_>, _>>()?,
            value => vec![self.renderer.render(value)?],
        };

        self.send_all(outgoing, disposition).await;
        Ok(())
    }

    /// Publishes every rendered payload and settles the inbound delivery
    /// exactly once: accept when every send succeeded, release when any
    /// failed so the broker may redeliver.
    async fn send_all(&self, payloads: Vec<Value>, disposition: &Disposition) {
        let sends = payloads.iter().map(|payload| async move {
            match self.sender.send(payload).await {
                Ok(()) => {
                    debug!(
                        event = events::SEND_OK,
                        component = COMPONENT,
                        to = %self.route.to,
                        message = %payload,
                        "sent message"
                    );
                    true
                }
                Err(err) => {
                    error!(
                        event = events::SEND_FAILED,
                        component = COMPONENT,
                        to = %self.route.to,
                        %err,
                        "failed sending message"
                    );
                    false
                }
            }
        });

        if join_all(sends).await.into_iter().all(|sent| sent) {
            disposition.accept().await;
        } else {
            disposition.release().await;
        }
    }
}
