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

//! The handler that glues typed variables to the MQTT connection.
//!
//! Owns the topic-to-callback registry and the pending-publish cache, drives
//! the underlying client's event loop, and replays both tables whenever the
//! broker connection comes (back) up.

use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use dashmap::DashMap;
use log::{error, info, warn};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::codec::{FromPayload, ToPayload};
use crate::config::MqttHandlerConfig;
use crate::link::MqttLink;
use crate::topic::{inbound_topic, outbound_topic};
use crate::variable::{PubVariable, SubVariable};

/// Type-erased dispatch entry for one inbound topic.
type SubHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Binds [`PubVariable`]s and [`SubVariable`]s to an MQTT broker connection.
///
/// Variables are registered at setup time; `start` spawns the event-loop
/// task that keeps the connection alive. Connection failures retry
/// indefinitely with the configured fixed delay, and every (re)connection
/// replays all subscriptions and the last published value of each publish
/// variable.
pub struct MqttHandler {
    config: MqttHandlerConfig,
    /// Fully-qualified inbound topic -> parse-and-apply callback.
    subscriptions: Arc<DashMap<String, SubHandler>>,
    /// Fully-qualified outbound topic -> last published payload.
    pending: Arc<DashMap<String, String>>,
    /// MQTT client handle (set on start, cleared on stop).
    client: Arc<RwLock<Option<AsyncClient>>>,
    connected: Arc<AtomicBool>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttHandler {
    /// Create a new handler from the given config.
    pub fn new(config: MqttHandlerConfig) -> Self {
        Self {
            config,
            subscriptions: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            client: Arc::new(RwLock::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// The config this handler was created with.
    pub fn config(&self) -> &MqttHandlerConfig {
        &self.config
    }

    /// Whether the broker connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Bind a subscription variable to `<client_name>/in/<topic>`.
    ///
    /// Registering a second variable under the same topic replaces the
    /// earlier binding. When the connection is already up the topic is
    /// subscribed on the spot; otherwise the connect-time replay covers it.
    pub fn add_sub_variable<T>(&self, variable: &SubVariable<T>)
    where
        T: FromPayload + Send + 'static,
    {
        if variable.topic().is_empty() {
            warn!(
                "[{}] Ignoring subscription variable with empty topic",
                self.config.client_name
            );
            return;
        }

        let full_topic = inbound_topic(&self.config.client_name, variable.topic());
        let client_name = self.config.client_name.clone();
        let topic = full_topic.clone();
        let var = variable.clone();
        self.subscriptions.insert(
            full_topic.clone(),
            Box::new(move |payload: &str| match T::from_payload(payload) {
                Ok(value) => {
                    var.apply(value);
                    info!("[{client_name}] Updated variable '{}' to {payload}", var.topic());
                }
                Err(e) => {
                    warn!("[{client_name}] Dropping payload on '{topic}': {e}");
                }
            }),
        );

        if self.is_connected() {
            let guard = self.client.read().unwrap_or_else(|e| e.into_inner());
            if let Some(client) = guard.as_ref() {
                if let Err(e) = client.try_subscribe(&full_topic, QoS::AtLeastOnce) {
                    warn!(
                        "[{}] Subscribe to '{full_topic}' failed: {e}",
                        self.config.client_name
                    );
                }
            }
        }
    }

    /// Bind a publish variable to `<client_name>/out/<topic>`.
    ///
    /// Every publish also lands in the pending-publish cache so the last
    /// value can be replayed after a reconnect.
    pub fn add_pub_variable<T>(&self, variable: &PubVariable<T>)
    where
        T: ToPayload + PartialEq,
    {
        if variable.topic().is_empty() {
            warn!(
                "[{}] Ignoring publish variable with empty topic",
                self.config.client_name
            );
            return;
        }

        let full_topic = outbound_topic(&self.config.client_name, variable.topic());
        let client_name = self.config.client_name.clone();
        let client = Arc::clone(&self.client);
        let connected = Arc::clone(&self.connected);
        let pending = Arc::clone(&self.pending);
        variable.bind_sink(Arc::new(move |payload: &str| {
            if connected.load(Ordering::SeqCst) {
                let guard = client.read().unwrap_or_else(|e| e.into_inner());
                if let Some(client) = guard.as_ref() {
                    if let Err(e) = client.try_publish(
                        &full_topic,
                        QoS::AtLeastOnce,
                        false,
                        payload.as_bytes().to_vec(),
                    ) {
                        warn!("[{client_name}] Publish to '{full_topic}' failed: {e}");
                    }
                }
            }
            pending.insert(full_topic.clone(), payload.to_string());
        }));
    }

    /// Connect to the broker and spawn the event-loop task.
    pub async fn start(&self) -> Result<()> {
        info!(
            "[{}] Starting MQTT handler (broker={}:{})",
            self.config.client_name, self.config.broker_host, self.config.port
        );

        // Build MQTT options.
        let mut mqtt_opts = MqttOptions::new(
            &self.config.client_id,
            &self.config.broker_host,
            self.config.port,
        );
        mqtt_opts.set_keep_alive(self.config.keep_alive);

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            mqtt_opts.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, self.config.channel_capacity);
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client.clone());

        // Clone what we need for the spawned task.
        let subscriptions = Arc::clone(&self.subscriptions);
        let pending = Arc::clone(&self.pending);
        let connected = Arc::clone(&self.connected);
        let client_name = self.config.client_name.clone();
        let reconnect_delay = self.config.reconnect_delay;

        // Create shutdown channel.
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        *self.shutdown_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(shutdown_tx);

        // Spawn the MQTT event loop task.
        let handle = tokio::spawn(async move {
            info!("[{client_name}] MQTT event loop started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("[{client_name}] Shutdown signal received");
                        break;
                    }
                    event = eventloop.poll() => {
                        match event {
                            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                                connected.store(true, Ordering::SeqCst);
                                info!("[{client_name}] Connected to MQTT broker");
                                replay(&client, &subscriptions, &pending, &client_name).await;
                            }
                            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                                dispatch(&subscriptions, &publish.topic, &publish.payload, &client_name);
                            }
                            Ok(_) => {} // Ignore other events (PingResp, SubAck, etc.)
                            Err(e) => {
                                connected.store(false, Ordering::SeqCst);
                                error!(
                                    "[{client_name}] MQTT connection error: {e}, retrying in {}s",
                                    reconnect_delay.as_secs()
                                );
                                tokio::time::sleep(reconnect_delay).await;
                                // rumqttc reconnects on the next poll()
                            }
                        }
                    }
                }
            }
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!("[{}] MQTT handler started", self.config.client_name);
        Ok(())
    }

    /// Disconnect from the broker and stop the event-loop task.
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }

        let client = self.client.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(client) = client {
            let _ = client.disconnect().await;
        }

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("[{}] MQTT handler stopped", self.config.client_name);
        Ok(())
    }
}

/// Re-subscribe every registered topic and republish every cached value.
///
/// Runs on every connection acknowledgment, so a broker that dropped the
/// session still ends up with the full subscription set and the latest value
/// of each publish variable.
async fn replay(
    link: &dyn MqttLink,
    subscriptions: &DashMap<String, SubHandler>,
    pending: &DashMap<String, String>,
    client_name: &str,
) {
    let topics: Vec<String> = subscriptions.iter().map(|e| e.key().clone()).collect();
    for topic in topics {
        match link.subscribe(&topic).await {
            Ok(()) => info!("[{client_name}] Subscribed to '{topic}'"),
            Err(e) => warn!("[{client_name}] Subscribe to '{topic}' failed: {e}"),
        }
    }

    let cached: Vec<(String, String)> = pending
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();
    for (topic, payload) in cached {
        if let Err(e) = link.publish(&topic, &payload).await {
            warn!("[{client_name}] Replay publish to '{topic}' failed: {e}");
        }
    }
}

/// Route one inbound message to its registered callback.
fn dispatch(
    subscriptions: &DashMap<String, SubHandler>,
    topic: &str,
    payload: &[u8],
    client_name: &str,
) {
    let Some(entry) = subscriptions.get(topic) else {
        warn!("[{client_name}] Message on unregistered topic '{topic}'");
        return;
    };
    match str::from_utf8(payload) {
        Ok(text) => (entry.value())(text),
        Err(e) => warn!("[{client_name}] Non-UTF-8 payload on '{topic}': {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn test_config() -> MqttHandlerConfig {
        MqttHandlerConfig::builder("dev", "localhost").build()
    }

    #[derive(Default)]
    struct RecordingLink {
        subscribed: Mutex<Vec<String>>,
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MqttLink for RecordingLink {
        async fn subscribe(&self, topic: &str) -> Result<()> {
            self.subscribed.lock().unwrap().push(topic.to_string());
            Ok(())
        }

        async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_sub_registration_and_dispatch() {
        let handler = MqttHandler::new(test_config());
        let var = SubVariable::new(0i32, "count");
        let fired = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&fired);
        var.on_change(move |_| *counter.lock().unwrap() += 1);
        handler.add_sub_variable(&var);

        dispatch(&handler.subscriptions, "dev/in/count", b"42", "dev");

        assert_eq!(var.value(), 42);
        assert_eq!(*fired.lock().unwrap(), 1);
    }

    #[test]
    fn test_dispatch_drops_unparseable_payload() {
        let handler = MqttHandler::new(test_config());
        let var = SubVariable::new(7i32, "count");
        let fired = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&fired);
        var.on_change(move |_| *counter.lock().unwrap() += 1);
        handler.add_sub_variable(&var);

        dispatch(&handler.subscriptions, "dev/in/count", b"not a number", "dev");

        assert_eq!(var.value(), 7);
        assert_eq!(*fired.lock().unwrap(), 0);
    }

    #[test]
    fn test_dispatch_ignores_unknown_topic() {
        let handler = MqttHandler::new(test_config());
        dispatch(&handler.subscriptions, "dev/in/ghost", b"1", "dev");
    }

    #[test]
    fn test_empty_topic_is_refused() {
        let handler = MqttHandler::new(test_config());
        handler.add_sub_variable(&SubVariable::new(false, ""));
        assert!(handler.subscriptions.is_empty());
    }

    #[test]
    fn test_same_topic_registration_replaces_binding() {
        let handler = MqttHandler::new(test_config());
        let first = SubVariable::new(0i32, "count");
        let second = SubVariable::new(0i32, "count");
        handler.add_sub_variable(&first);
        handler.add_sub_variable(&second);

        dispatch(&handler.subscriptions, "dev/in/count", b"9", "dev");

        assert_eq!(first.value(), 0);
        assert_eq!(second.value(), 9);
    }

    #[test]
    fn test_pub_variable_caches_last_payload() {
        let handler = MqttHandler::new(test_config());
        let var = PubVariable::new(0i32, "count");
        handler.add_pub_variable(&var);

        var.set(1);
        var.set(2);

        let cached = handler.pending.get("dev/out/count").unwrap();
        assert_eq!(cached.value(), "2");
    }

    #[tokio::test]
    async fn test_replay_covers_subscriptions_and_cached_publishes() {
        let handler = MqttHandler::new(test_config());

        let enabled = SubVariable::new(false, "enabled");
        let setpoint = SubVariable::new(0.0f32, "setpoint");
        handler.add_sub_variable(&enabled);
        handler.add_sub_variable(&setpoint);

        let temperature = PubVariable::new(0.0f32, "temperature");
        handler.add_pub_variable(&temperature);
        temperature.set(21.5);

        let link = RecordingLink::default();
        replay(&link, &handler.subscriptions, &handler.pending, "dev").await;

        let mut subscribed = link.subscribed.lock().unwrap().clone();
        subscribed.sort();
        assert_eq!(subscribed, vec!["dev/in/enabled", "dev/in/setpoint"]);
        assert_eq!(
            *link.published.lock().unwrap(),
            vec![("dev/out/temperature".to_string(), "21.5".to_string())]
        );
    }
}
