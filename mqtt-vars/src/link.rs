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

//! Seam between the handler and the underlying MQTT client.

use anyhow::Result;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

/// The slice of the underlying client the connect-time replay needs.
///
/// Implemented by [`rumqttc::AsyncClient`]; tests substitute a recording
/// fake.
#[async_trait]
pub(crate) trait MqttLink: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<()>;
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

#[async_trait]
impl MqttLink for AsyncClient {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        AsyncClient::subscribe(self, topic, QoS::AtLeastOnce).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        AsyncClient::publish(self, topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }
}
