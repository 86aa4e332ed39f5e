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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Listener kind tag. The serialized listener envelope carries this tag so
/// the deserializer can reconstruct the right variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifKind {
    DownloadSingle,
    DownloadMulti,
    DownloadRange,
    DownloadCloud,
    ObjectQuery,
    Xaction,
}

impl NotifKind {
    pub fn is_download(&self) -> bool {
        matches!(
            self,
            NotifKind::DownloadSingle
                | NotifKind::DownloadMulti
                | NotifKind::DownloadRange
                | NotifKind::DownloadCloud
        )
    }
}

impl Display for NotifKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotifKind::DownloadSingle => "download-single",
            NotifKind::DownloadMulti => "download-multi",
            NotifKind::DownloadRange => "download-range",
            NotifKind::DownloadCloud => "download-cloud",
            NotifKind::ObjectQuery => "object-query",
            NotifKind::Xaction => "xaction",
        };
        write!(f, "{}", s)
    }
}

/// Stats blob a notifier attaches to progress and finished messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifStats {
    pub finished: bool,
    pub aborted: bool,
    pub objs_done: usize,
    pub objs_total: usize,
    pub bytes: u64,
}

/// Body of `POST /v1/notifs/{progress|finished}`. The sender is
/// fire-and-forget; it never inspects the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifMsg {
    pub uuid: String,
    pub data: serde_json::Value,
    pub err_msg: String,
}

impl NotifMsg {
    pub fn new(uuid: impl Into<String>, stats: &NotifStats, err_msg: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            data: serde_json::to_value(stats).unwrap_or(serde_json::Value::Null),
            err_msg: err_msg.into(),
        }
    }

    /// Decode the stats blob; absent fields default so a foreign blob still
    /// yields usable flags.
    pub fn stats(&self) -> NotifStats {
        serde_json::from_value(self.data.clone()).unwrap_or_default()
    }
}

impl Display for NotifMsg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notif[{}]", self.uuid)
    }
}
