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

mod storage;
pub use self::storage::{Lom, ObjectStore};

mod queue;
pub use self::queue::TaskQueue;

mod task;
pub use self::task::{task_uid, DownloadTask};

mod jogger;
pub(crate) use self::jogger::Jogger;

mod downloader;
pub use self::downloader::Downloader;
pub(crate) use self::downloader::DownloaderShared;

mod job_db;
pub use self::job_db::JobDb;

mod notifier;
pub use self::notifier::DownloadNotifier;

mod stats;
pub use self::stats::DownloadMetrics;

mod server;
pub use self::server::{CloudBackend, TargetServer};
