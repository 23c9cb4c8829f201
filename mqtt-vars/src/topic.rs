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

//! Topic layout helpers for the `<client_name>/in/...` and
//! `<client_name>/out/...` naming convention.

/// Path segment for broker-to-device (subscription) topics.
pub const IN_SEGMENT: &str = "in";

/// Path segment for device-to-broker (publish) topics.
pub const OUT_SEGMENT: &str = "out";

/// Fully-qualified topic this client subscribes to for `topic`.
pub fn inbound_topic(client_name: &str, topic: &str) -> String {
    format!("{client_name}/{IN_SEGMENT}/{topic}")
}

/// Fully-qualified topic this client publishes `topic` values to.
pub fn outbound_topic(client_name: &str, topic: &str) -> String {
    format!("{client_name}/{OUT_SEGMENT}/{topic}")
}
