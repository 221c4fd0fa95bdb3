//! Environment-sourced daemon configuration, read once at startup.

use anyhow::Context;
use mq_preprocessor::BrokerConfig;
use std::env;

/// Everything the daemon needs from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub broker: BrokerConfig,
    pub log_level: String,
    pub queue_defs: String,
}

impl Config {
    /// Reads the environment. Missing variables take the documented
    /// defaults; a non-numeric `AMQP_PORT` is a fatal configuration error.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match env::var("AMQP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid AMQP_PORT {raw:?}"))?,
            Err(_) => 5672,
        };

        Ok(Self {
            broker: BrokerConfig {
                host: env::var("AMQP_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port,
                username: env::var("AMQP_USERNAME").unwrap_or_else(|_| "ANONYMOUS".to_string()),
                password: env::var("AMQP_PASSWORD").ok(),
                use_tls: env::var("AMQP_USE_TLS").map(|raw| raw == "true").unwrap_or(false),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            queue_defs: env::var("QUEUE_DEFS").unwrap_or_else(|_| "[]".to_string()),
        })
    }
}
