// Copyright 2025 OPPO.
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

use crate::error::StoreResult;
use crate::utils::DurationUnit;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Target download executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConf {
    // Per-object timeout when the job carries none
    #[serde(skip)]
    pub default_timeout: Duration,
    #[serde(alias = "default_timeout")]
    pub default_timeout_str: String,

    // How long `put` may wait on a full per-mountpath queue
    #[serde(skip)]
    pub queue_put_timeout: Duration,
    #[serde(alias = "queue_put_timeout")]
    pub queue_put_timeout_str: String,

    // Pending tasks per mountpath queue
    pub queue_cap: usize,
}

impl DownloadConf {
    pub fn init(&mut self) -> StoreResult<()> {
        self.default_timeout = DurationUnit::from_str(&self.default_timeout_str)?.as_duration();
        self.queue_put_timeout =
            DurationUnit::from_str(&self.queue_put_timeout_str)?.as_duration();
        Ok(())
    }
}

impl Default for DownloadConf {
    fn default() -> Self {
        Self {
            default_timeout: Default::default(),
            default_timeout_str: "1h".to_string(),

            queue_put_timeout: Default::default(),
            queue_put_timeout_str: "10s".to_string(),

            queue_cap: 200,
        }
    }
}
