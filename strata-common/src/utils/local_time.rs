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

use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub struct LocalTime;

impl LocalTime {
    pub fn mills() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Stopwatch for measuring elapsed wall-clock time.
pub struct TimeSpent(Instant);

impl Default for TimeSpent {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSpent {
    pub fn new() -> Self {
        Self(Instant::now())
    }

    pub fn used_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}
