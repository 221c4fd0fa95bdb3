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

//! Queue-preprocessor daemon: environment-configured wiring of the core
//! pipeline onto the AMQP binding, running until SIGTERM/SIGINT.

mod config;

use crate::config::Config;
use anyhow::Context;
use mq_preprocessor::{ConnectionManager, QueueRoute, Supervisor};
use mq_preprocessor_amqp::AmqpConnector;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let routes = QueueRoute::parse_list(&config.queue_defs)
        .context("QUEUE_DEFS is not a valid route list")?;
    info!(route_count = routes.len(), routes = ?routes, "configured queue routes");

    let connections = Arc::new(ConnectionManager::new(
        config.broker.clone(),
        Arc::new(AmqpConnector),
    ));
    let mut supervisor = Supervisor::new(routes, connections);
    let consuming = supervisor.start().await;
    info!(
        consuming,
        configured = supervisor.route_count(),
        "preprocessor started"
    );

    wait_for_termination().await?;

    info!("termination signal received; shutting down");
    supervisor.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn wait_for_termination() -> anyhow::Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("unable to install SIGTERM handler")?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    Ok(())
}
