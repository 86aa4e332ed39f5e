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

/// Proxy notification fabric configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConf {
    // Housekeeping period
    #[serde(skip)]
    pub housekeep_interval: Duration,
    #[serde(alias = "housekeep_interval")]
    pub housekeep_interval_str: String,

    // Finished listeners older than remove_mult * housekeep_interval are evicted
    pub remove_mult: u32,

    // A notifier silent for longer than this is pulled during housekeeping
    #[serde(skip)]
    pub progress_interval: Duration,
    #[serde(alias = "progress_interval")]
    pub progress_interval_str: String,

    // Per-request timeout for pull and abort broadcasts
    #[serde(skip)]
    pub bcast_timeout: Duration,
    #[serde(alias = "bcast_timeout")]
    pub bcast_timeout_str: String,
}

impl NotifyConf {
    pub fn init(&mut self) -> StoreResult<()> {
        self.housekeep_interval =
            DurationUnit::from_str(&self.housekeep_interval_str)?.as_duration();
        self.progress_interval =
            DurationUnit::from_str(&self.progress_interval_str)?.as_duration();
        self.bcast_timeout = DurationUnit::from_str(&self.bcast_timeout_str)?.as_duration();
        Ok(())
    }

    /// Time-to-keep for finished listeners.
    pub fn remove_after(&self) -> Duration {
        self.housekeep_interval * self.remove_mult
    }
}

impl Default for NotifyConf {
    fn default() -> Self {
        Self {
            housekeep_interval: Default::default(),
            housekeep_interval_str: "2m".to_string(),

            remove_mult: 3,

            progress_interval: Default::default(),
            progress_interval_str: "10s".to_string(),

            bcast_timeout: Default::default(),
            bcast_timeout_str: "10s".to_string(),
        }
    }
}
