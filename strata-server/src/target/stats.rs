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

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-target download counters.
#[derive(Default)]
pub struct DownloadMetrics {
    pub download_bytes: AtomicU64,
    pub download_latency_ms: AtomicU64,
    pub download_count: AtomicU64,
    pub err_count: AtomicU64,
}

impl DownloadMetrics {
    pub fn add_download(&self, bytes: u64, latency_ms: u64) {
        self.download_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.download_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.download_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.err_count.fetch_add(1, Ordering::Relaxed);
    }
}
