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

//! AMQP binding for `mq-preprocessor`, built on `lapin`.
//!
//! Adapts one physical broker connection to the core capability traits:
//! receivers consume with manual acknowledgment, senders publish to the
//! default exchange with publisher confirms, and dispositions map accept /
//! reject / release onto `basic_ack` / `basic_reject` with the matching
//! requeue flag.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery as LapinDelivery;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::uri::{AMQPScheme, AMQPUri};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use mq_preprocessor::broker::{
    BrokerConfig, BrokerConnection, BrokerConnector, BrokerReceiver, BrokerSender, Delivery,
    DeliveryHandler, DeliveryOutcome, Disposition, DispositionHandle, MessageBody,
};
use mq_preprocessor::TransportError;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

const REPLY_SUCCESS: u16 = 200;

/// Opens AMQP connections on a tokio runtime.
#[derive(Default)]
pub struct AmqpConnector;

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn open(
        &self,
        config: &BrokerConfig,
    ) -> Result<Arc<dyn BrokerConnection>, TransportError> {
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        let connection = Connection::connect_uri(broker_uri(config), options)
            .await
            .map_err(|err| transport_error("unable to open broker connection", err))?;
        Ok(Arc::new(AmqpConnection { connection }))
    }
}

/// Maps [`BrokerConfig`] onto a lapin URI. TLS selects the `amqps` scheme;
/// an absent password stays empty rather than falling back to lapin's
/// default credentials.
fn broker_uri(config: &BrokerConfig) -> AMQPUri {
    let mut uri = AMQPUri::default();
    uri.scheme = if config.use_tls {
        AMQPScheme::AMQPS
    } else {
        AMQPScheme::AMQP
    };
    uri.authority.host = config.host.clone();
    uri.authority.port = config.port;
    uri.authority.userinfo.username = config.username.clone();
    uri.authority.userinfo.password = config.password.clone().unwrap_or_default();
    uri
}

struct AmqpConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn create_receiver(
        &self,
        address: &str,
    ) -> Result<Arc<dyn BrokerReceiver>, TransportError> {
        let channel = self.channel_for(address).await?;
        Ok(Arc::new(AmqpReceiver {
            channel,
            queue: address.to_string(),
            consumer_tag: Mutex::new(None),
        }))
    }

    async fn create_sender(&self, address: &str) -> Result<Arc<dyn BrokerSender>, TransportError> {
        let channel = self.channel_for(address).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|err| transport_error("unable to enable publisher confirms", err))?;
        Ok(Arc::new(AmqpSender {
            channel,
            routing_key: address.to_string(),
        }))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connection
            .close(REPLY_SUCCESS, "shutdown")
            .await
            .map_err(|err| transport_error("unable to close broker connection", err))
    }
}

impl AmqpConnection {
    /// One channel per link, with the queue declared idempotently so a
    /// freshly provisioned broker works out of the box.
    async fn channel_for(&self, address: &str) -> Result<Channel, TransportError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|err| transport_error("unable to create channel", err))?;
        channel
            .queue_declare(
                address,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| transport_error(&format!("unable to declare queue {address}"), err))?;
        Ok(channel)
    }
}

struct AmqpReceiver {
    channel: Channel,
    queue: String,
    consumer_tag: Mutex<Option<String>>,
}

#[async_trait]
impl BrokerReceiver for AmqpReceiver {
    fn address(&self) -> &str {
        &self.queue
    }

    async fn subscribe(&self, handler: Arc<dyn DeliveryHandler>) -> Result<(), TransportError> {
        let tag = format!("mq-preprocessor-{}", Uuid::new_v4());
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                &tag,
                // no_ack stays false: deliveries are settled by the pipeline.
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|err| {
                transport_error(&format!("unable to consume from {}", self.queue), err)
            })?;
        *self.consumer_tag.lock().expect("consumer tag lock poisoned") = Some(tag);

        tokio::spawn(consume_loop(self.queue.clone(), consumer, handler));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let tag = self
            .consumer_tag
            .lock()
            .expect("consumer tag lock poisoned")
            .take();
        if let Some(tag) = tag {
            self.channel
                .basic_cancel(&tag, BasicCancelOptions::default())
                .await
                .map_err(|err| transport_error("unable to cancel consumer", err))?;
        }
        self.channel
            .close(REPLY_SUCCESS, "receiver released")
            .await
            .map_err(|err| transport_error("unable to close receiver channel", err))
    }
}

/// Feeds broker deliveries into the handler, one task per delivery so a
/// slow send never blocks the next arrival.
async fn consume_loop(queue: String, mut consumer: Consumer, handler: Arc<dyn DeliveryHandler>) {
    while let Some(attempt) = consumer.next().await {
        match attempt {
            Ok(delivery) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let LapinDelivery {
                        data,
                        properties,
                        acker,
                        ..
                    } = delivery;
                    handler
                        .on_delivery(Delivery {
                            body: Some(decode_body(data, &properties)),
                            disposition: Disposition::new(Arc::new(AmqpDisposition { acker })),
                        })
                        .await;
                });
            }
            Err(err) => {
                warn!(queue = %queue, %err, "consumer stream error");
            }
        }
    }
    debug!(queue = %queue, "consumer stream ended");
}

/// Textual content types arrive as [`MessageBody::Text`]; everything else
/// stays a raw buffer for the core to decode.
fn decode_body(data: Vec<u8>, properties: &BasicProperties) -> MessageBody {
    let textual = properties
        .content_type()
        .as_ref()
        .map(|content_type| {
            let content_type = content_type.as_str();
            content_type.starts_with("text/") || content_type == "application/json"
        })
        .unwrap_or(false);

    if textual {
        match String::from_utf8(data) {
            Ok(text) => MessageBody::Text(text),
            Err(err) => MessageBody::Binary(err.into_bytes()),
        }
    } else {
        MessageBody::Binary(data)
    }
}

struct AmqpSender {
    channel: Channel,
    routing_key: String,
}

#[async_trait]
impl BrokerSender for AmqpSender {
    async fn send(&self, payload: &Value) -> Result<(), TransportError> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| TransportError::new(format!("unable to encode payload: {err}")))?;
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|err| {
                transport_error(&format!("unable to publish to {}", self.routing_key), err)
            })?
            .await
            .map_err(|err| {
                transport_error(&format!("publish to {} was not confirmed", self.routing_key), err)
            })?;

        match confirmation {
            Confirmation::Nack(_) => Err(TransportError::new(format!(
                "publish to {} was nacked by the broker",
                self.routing_key
            ))),
            _ => Ok(()),
        }
    }
}

struct AmqpDisposition {
    acker: lapin::acker::Acker,
}

#[async_trait]
impl DispositionHandle for AmqpDisposition {
    async fn settle(&self, outcome: DeliveryOutcome) -> Result<(), TransportError> {
        match outcome {
            DeliveryOutcome::Accepted => self.acker.ack(BasicAckOptions::default()).await,
            DeliveryOutcome::Rejected => {
                self.acker
                    .reject(BasicRejectOptions { requeue: false })
                    .await
            }
            DeliveryOutcome::Released => {
                self.acker
                    .reject(BasicRejectOptions { requeue: true })
                    .await
            }
        }
        .map_err(|err| transport_error("unable to settle delivery", err))
    }
}

fn transport_error(context: &str, err: lapin::Error) -> TransportError {
    TransportError::new(format!("{context}: {err}"))
}
