// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Configuration
//!
//! Connection parameters are layered with the `config` crate: built-in defaults,
//! then an optional `config/default.{toml,yaml,json}` file, then environment
//! variables prefixed with `PUBSUB_` (nested keys split by `__`, for example
//! `PUBSUB_RABBITMQ__HOST`). A `.env` file is loaded first when present.

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Dead-letter exchange attached to every declared queue unless overridden.
pub const DEFAULT_DEAD_LETTER_EXCHANGE: &str = "pubsub_dlx";

/// Prefetch window of the strict encoding when neither the subscription nor
/// the configuration picks one.
pub const DEFAULT_PREFETCH: u16 = 10;

/// Application identity, used to name the broker connection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfigs {
    pub name: String,
}

/// Broker connection parameters, plus the defaults applied to queues and
/// subscriptions built with `from_configs`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    /// Dead-letter exchange of `QueueDefinition::from_configs` queues.
    pub dead_letter_exchange: String,
    /// Prefetch window of `SubscriptionDefinition::from_configs`
    /// subscriptions. Unset leaves it to the encoding.
    #[serde(default)]
    pub prefetch: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Configs {
    pub app: AppConfigs,
    pub rabbitmq: RabbitMQConfigs,
}

impl Default for Configs {
    fn default() -> Self {
        Self {
            app: AppConfigs {
                name: "pubsub".to_owned(),
            },
            rabbitmq: RabbitMQConfigs {
                host: "localhost".to_owned(),
                port: 5672,
                user: "guest".to_owned(),
                password: "guest".to_owned(),
                vhost: "/".to_owned(),
                dead_letter_exchange: DEFAULT_DEAD_LETTER_EXCHANGE.to_owned(),
                prefetch: None,
            },
        }
    }
}

impl RabbitMQConfigs {
    /// Renders the AMQP URI for these parameters.
    ///
    /// The vhost is percent-encoded so the default `/` vhost becomes `%2f`.
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('%', "%25").replace('/', "%2f")
        )
    }
}

/// Loads the configuration from defaults, `config/default.*` and the environment.
pub fn load() -> Result<Configs, ConfigError> {
    // a missing .env file is not an error
    let _ = dotenvy::dotenv();

    from_builder(
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("PUBSUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            ),
    )
}

/// Applies the built-in defaults underneath the given sources and deserializes.
pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Configs, ConfigError> {
    let defaults = Configs::default();

    builder
        .set_default("app.name", defaults.app.name)?
        .set_default("rabbitmq.host", defaults.rabbitmq.host)?
        .set_default("rabbitmq.port", i64::from(defaults.rabbitmq.port))?
        .set_default("rabbitmq.user", defaults.rabbitmq.user)?
        .set_default("rabbitmq.password", defaults.rabbitmq.password)?
        .set_default("rabbitmq.vhost", defaults.rabbitmq.vhost)?
        .set_default(
            "rabbitmq.dead_letter_exchange",
            defaults.rabbitmq.dead_letter_exchange,
        )?
        .build()?
        .try_deserialize()
}
