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

//! Typed MQTT publish/subscribe variable bindings.
//!
//! Binds local variables to MQTT topics over [`rumqttc`], with automatic
//! string (de)serialization and change-notification callbacks. Subscription
//! variables mirror `<client_name>/in/<topic>`; publish variables push to
//! `<client_name>/out/<topic>`. The handler replays all subscriptions and
//! the last published values after every reconnect.
//!
//! # Example
//!
//! ```ignore
//! use mqtt_vars::{MqttHandler, MqttHandlerConfig, PubVariable, SubVariable};
//!
//! let config = MqttHandlerConfig::builder("sensor01", "broker.local")
//!     .port(1883)
//!     .username("user")
//!     .password("secret")
//!     .build();
//!
//! let handler = MqttHandler::new(config);
//!
//! let temperature = PubVariable::new(0.0f32, "temperature");
//! let enabled = SubVariable::new(false, "enabled");
//! enabled.on_change(|var| println!("{} is now {}", var.topic(), var.value()));
//!
//! handler.add_pub_variable(&temperature);
//! handler.add_sub_variable(&enabled);
//! handler.start().await?;
//!
//! temperature.set(21.5); // published to "sensor01/out/temperature"
//! ```

pub mod codec;
pub mod config;
pub mod handler;
mod link;
pub mod topic;
pub mod variable;

pub use codec::{FromPayload, ToPayload};
pub use config::{MqttHandlerConfig, MqttHandlerConfigBuilder};
pub use handler::MqttHandler;
pub use variable::{PubVariable, SubVariable};
