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

//! Proxy-side notification fabric: per-job listeners ingesting progress and
//! finish messages from targets, housekeeping pull reconciliation, and
//! cluster-map change handling.

mod listener;
pub use self::listener::{JsonNotifs, NlCallback, NlMsg, NlSnapshot, NotifListener};

mod hub;
pub use self::hub::{NlFilter, NotifHub};
