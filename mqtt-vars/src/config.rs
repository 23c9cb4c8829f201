// Copyright 2025 The mqtt-vars Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration types for the MQTT variable handler.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Configuration for [`MqttHandler`](crate::MqttHandler).
#[derive(Debug, Clone, Deserialize)]
pub struct MqttHandlerConfig {
    /// Client name, used as the topic prefix (`<client_name>/in/...`,
    /// `<client_name>/out/...`).
    pub client_name: String,
    /// MQTT broker hostname or IP.
    pub broker_host: String,
    /// MQTT broker port (default: 1883).
    pub port: u16,
    /// MQTT client ID. Defaults to `"<client_name>-{uuid}"`.
    pub client_id: String,
    /// Optional MQTT username for authentication.
    pub username: Option<String>,
    /// Optional MQTT password for authentication.
    pub password: Option<String>,
    /// Keep-alive interval for the broker connection (default: 30 s).
    pub keep_alive: Duration,
    /// Fixed delay between reconnect attempts (default: 5 s).
    pub reconnect_delay: Duration,
    /// Capacity of the underlying client's request channel (default: 100).
    pub channel_capacity: usize,
}

impl MqttHandlerConfig {
    /// Start building a new config with the required fields.
    pub fn builder(
        client_name: impl Into<String>,
        broker_host: impl Into<String>,
    ) -> MqttHandlerConfigBuilder {
        let client_name = client_name.into();
        MqttHandlerConfigBuilder {
            client_id: format!("{client_name}-{}", uuid::Uuid::new_v4()),
            client_name,
            broker_host: broker_host.into(),
            port: 1883,
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            channel_capacity: 100,
        }
    }

    /// Read the config from `MQTT_*` environment variables.
    ///
    /// `MQTT_CLIENT_NAME` and `MQTT_BROKER_HOST` are required; `MQTT_PORT`,
    /// `MQTT_CLIENT_ID`, `MQTT_USERNAME` and `MQTT_PASSWORD` are optional.
    pub fn from_env() -> Result<Self> {
        let client_name = env::var("MQTT_CLIENT_NAME").context("MQTT_CLIENT_NAME not set")?;
        let broker_host = env::var("MQTT_BROKER_HOST").context("MQTT_BROKER_HOST not set")?;

        let mut builder = Self::builder(client_name, broker_host);
        if let Ok(port) = env::var("MQTT_PORT") {
            builder = builder.port(port.parse::<u16>().context("Invalid MQTT_PORT")?);
        }
        if let Ok(client_id) = env::var("MQTT_CLIENT_ID") {
            builder = builder.client_id(client_id);
        }
        if let Ok(username) = env::var("MQTT_USERNAME") {
            builder = builder.username(username);
        }
        if let Ok(password) = env::var("MQTT_PASSWORD") {
            builder = builder.password(password);
        }
        Ok(builder.build())
    }
}

/// Builder for [`MqttHandlerConfig`].
pub struct MqttHandlerConfigBuilder {
    client_name: String,
    broker_host: String,
    port: u16,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
    keep_alive: Duration,
    reconnect_delay: Duration,
    channel_capacity: usize,
}

impl MqttHandlerConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    pub fn channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Build the config.
    pub fn build(self) -> MqttHandlerConfig {
        MqttHandlerConfig {
            client_name: self.client_name,
            broker_host: self.broker_host,
            port: self.port,
            client_id: self.client_id,
            username: self.username,
            password: self.password,
            keep_alive: self.keep_alive,
            reconnect_delay: self.reconnect_delay,
            channel_capacity: self.channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = MqttHandlerConfig::builder("dev01", "broker.local").build();

        assert_eq!(config.client_name, "dev01");
        assert_eq!(config.broker_host, "broker.local");
        assert_eq!(config.port, 1883);
        assert!(config.client_id.starts_with("dev01-"));
        assert!(config.username.is_none());
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 100);
    }

    #[test]
    fn test_builder_overrides() {
        let config = MqttHandlerConfig::builder("dev01", "broker.local")
            .port(8883)
            .client_id("fixed-id")
            .username("user")
            .password("secret")
            .reconnect_delay(Duration::from_secs(1))
            .build();

        assert_eq!(config.port, 8883);
        assert_eq!(config.client_id, "fixed-id");
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    }
}
