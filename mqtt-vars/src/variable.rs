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

//! Typed publish/subscribe variable wrappers.
//!
//! A [`SubVariable`] mirrors a value received on `<client_name>/in/<topic>`;
//! a [`PubVariable`] pushes its value to `<client_name>/out/<topic>` whenever
//! it changes. Both are cheap handles over shared state, so application code
//! and the handler's dispatch path can each hold a clone.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::codec::ToPayload;

/// Callback invoked when a subscription variable receives a new value.
pub type SubCallback<T> = Box<dyn FnMut(&SubVariable<T>) + Send>;

/// Sink installed by the handler; receives the encoded payload for the
/// variable's fully-qualified outbound topic.
pub(crate) type PublishSink = Arc<dyn Fn(&str) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct SubShared<T> {
    topic: String,
    value: Mutex<T>,
    on_change: Mutex<Option<SubCallback<T>>>,
}

/// A local value mirrored from an MQTT topic.
///
/// The handler updates the value from inbound messages and fires the change
/// callback once per message, including when the received value equals the
/// current one.
pub struct SubVariable<T> {
    shared: Arc<SubShared<T>>,
}

impl<T> Clone for SubVariable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> SubVariable<T> {
    /// Create a new subscription variable bound to the given short topic.
    pub fn new(initial: T, topic: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(SubShared {
                topic: topic.into(),
                value: Mutex::new(initial),
                on_change: Mutex::new(None),
            }),
        }
    }

    /// The short topic this variable is bound to.
    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    /// Current value.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        lock(&self.shared.value).clone()
    }

    /// Install or replace the change callback.
    pub fn on_change(&self, callback: impl FnMut(&SubVariable<T>) + Send + 'static) {
        *lock(&self.shared.on_change) = Some(Box::new(callback));
    }

    /// Store an inbound value and fire the change callback.
    pub(crate) fn apply(&self, value: T) {
        *lock(&self.shared.value) = value;
        if let Some(callback) = lock(&self.shared.on_change).as_mut() {
            callback(self);
        }
    }
}

struct PubState<T> {
    value: T,
    init_pub_done: bool,
    publish_queued: bool,
    last_publish: Option<Instant>,
}

struct PubShared<T> {
    topic: String,
    min_interval: Duration,
    state: Mutex<PubState<T>>,
    sink: Mutex<Option<PublishSink>>,
}

/// A local value pushed to an MQTT topic on change.
///
/// The first `set` after creation always publishes; afterwards only a value
/// change does. A minimum publish interval can be configured to rate-limit
/// noisy sources: a value set inside the interval window is queued and goes
/// out with the next `set` call once the window has passed.
pub struct PubVariable<T> {
    shared: Arc<PubShared<T>>,
}

impl<T> Clone for PubVariable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PubVariable<T> {
    /// Create a new publish variable bound to the given short topic.
    pub fn new(initial: T, topic: impl Into<String>) -> Self {
        Self::with_min_interval(initial, topic, Duration::ZERO)
    }

    /// Create a publish variable that publishes at most once per
    /// `min_interval`.
    pub fn with_min_interval(initial: T, topic: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            shared: Arc::new(PubShared {
                topic: topic.into(),
                min_interval,
                state: Mutex::new(PubState {
                    value: initial,
                    init_pub_done: false,
                    publish_queued: false,
                    last_publish: None,
                }),
                sink: Mutex::new(None),
            }),
        }
    }

    /// The short topic this variable is bound to.
    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    /// Current value.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        lock(&self.shared.state).value.clone()
    }

    /// Update the value, publishing it through the handler when it changed.
    ///
    /// Publishes on the first call regardless of the value, and whenever a
    /// rate-limited publish is still queued. Before the variable is
    /// registered with a handler, `set` only stores the value.
    pub fn set(&self, value: T)
    where
        T: ToPayload + PartialEq,
    {
        let sink = lock(&self.shared.sink).clone();
        let mut state = lock(&self.shared.state);

        if state.value != value || !state.init_pub_done || state.publish_queued {
            state.value = value;
            state.init_pub_done = true;

            if let Some(sink) = sink {
                let due = self.shared.min_interval.is_zero()
                    || state
                        .last_publish
                        .map_or(true, |at| at.elapsed() > self.shared.min_interval);
                if due {
                    state.last_publish = Some(Instant::now());
                    state.publish_queued = false;
                    let payload = state.value.to_payload();
                    drop(state);
                    sink(&payload);
                } else {
                    state.publish_queued = true;
                }
            }
        } else {
            state.value = value;
        }
    }

    /// Wired up by the handler at registration time.
    pub(crate) fn bind_sink(&self, sink: PublishSink) {
        *lock(&self.shared.sink) = Some(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_sink() -> (PublishSink, Arc<Mutex<Vec<String>>>) {
        let published = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&published);
        let sink: PublishSink = Arc::new(move |payload: &str| {
            log.lock().unwrap().push(payload.to_string());
        });
        (sink, published)
    }

    #[test]
    fn test_sub_apply_fires_callback_once_per_message() {
        let var = SubVariable::new(0i32, "count");
        let fired = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&fired);
        var.on_change(move |_| *counter.lock().unwrap() += 1);

        var.apply(42);
        var.apply(42);

        assert_eq!(var.value(), 42);
        assert_eq!(*fired.lock().unwrap(), 2);
    }

    #[test]
    fn test_sub_callback_sees_topic_and_new_value() {
        let var = SubVariable::new(false, "enabled");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        var.on_change(move |v| log.lock().unwrap().push((v.topic().to_string(), v.value())));

        var.apply(true);

        assert_eq!(*seen.lock().unwrap(), vec![("enabled".to_string(), true)]);
    }

    #[test]
    fn test_sub_without_callback_still_updates() {
        let var = SubVariable::new(0.0f32, "setpoint");
        var.apply(21.5);
        assert_eq!(var.value(), 21.5);
    }

    #[test]
    fn test_pub_set_publishes_only_on_change() {
        let var = PubVariable::new(0i32, "count");
        let (sink, published) = recording_sink();
        var.bind_sink(sink);

        var.set(1);
        var.set(1);
        var.set(2);

        assert_eq!(*published.lock().unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn test_pub_first_set_publishes_even_when_equal_to_initial() {
        let var = PubVariable::new(0i32, "count");
        let (sink, published) = recording_sink();
        var.bind_sink(sink);

        var.set(0);

        assert_eq!(*published.lock().unwrap(), vec!["0"]);
    }

    #[test]
    fn test_pub_set_before_registration_only_stores() {
        let var = PubVariable::new(0i32, "count");
        var.set(5);
        assert_eq!(var.value(), 5);

        let (sink, published) = recording_sink();
        var.bind_sink(sink);
        var.set(6);
        assert_eq!(*published.lock().unwrap(), vec!["6"]);
    }

    #[test]
    fn test_pub_min_interval_queues_and_flushes() {
        let var = PubVariable::with_min_interval(0i32, "temp", Duration::from_millis(50));
        let (sink, published) = recording_sink();
        var.bind_sink(sink);

        var.set(1);
        var.set(2);
        assert_eq!(*published.lock().unwrap(), vec!["1"]);

        std::thread::sleep(Duration::from_millis(60));
        var.set(2);
        assert_eq!(*published.lock().unwrap(), vec!["1", "2"]);
    }
}
