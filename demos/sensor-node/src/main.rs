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

use std::time::Duration;

use anyhow::Result;
use log::info;
use mqtt_vars::{MqttHandler, MqttHandlerConfig, PubVariable, SubVariable};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    info!("Starting sensor node example...");

    // 1. Configure the handler
    let config = MqttHandlerConfig::builder("sensor-node-01", "localhost")
        .port(1883)
        .build();
    let handler = MqttHandler::new(config);

    // 2. Declare the variables
    // Published to 'sensor-node-01/out/...'; the temperature is rate-limited
    // to one publish per second.
    let temperature = PubVariable::with_min_interval(0.0f32, "temperature", Duration::from_secs(1));
    let uptime = PubVariable::new(0u64, "uptime");

    // Mirrored from 'sensor-node-01/in/...'
    let enabled = SubVariable::new(true, "enabled");
    let setpoint = SubVariable::new(20.0f32, "setpoint");

    enabled.on_change(|var| {
        info!("'{}' changed to {}", var.topic(), var.value());
    });
    setpoint.on_change(|var| {
        info!("'{}' changed to {}", var.topic(), var.value());
    });

    // 3. Register the variables and start the handler
    handler.add_pub_variable(&temperature);
    handler.add_pub_variable(&uptime);
    handler.add_sub_variable(&enabled);
    handler.add_sub_variable(&setpoint);
    handler.start().await?;

    // 4. Publish a reading every 2 seconds until Ctrl-C
    let mut seconds = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                seconds += 2;
                uptime.set(seconds);
                if enabled.value() {
                    let reading = setpoint.value() + (seconds % 5) as f32 * 0.1;
                    temperature.set(reading);
                }
            }
        }
    }

    info!("Shutdown signal received");
    handler.stop().await?;
    Ok(())
}
