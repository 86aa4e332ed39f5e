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

use log::debug;
use std::sync::Arc;
use std::time::Duration;
use strata_common::api;
use strata_common::cluster::SmapOwner;
use strata_common::state::NotifMsg;

/// Fire-and-forget progress/finished sender. The owning proxy reconciles
/// missed updates by pulling, so the sender never retries and never reads
/// the response.
pub struct DownloadNotifier {
    node_id: String,
    smap: Arc<SmapOwner>,
    client: reqwest::Client,
}

impl DownloadNotifier {
    pub fn new(node_id: impl Into<String>, smap: Arc<SmapOwner>) -> Arc<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Arc::new(Self {
            node_id: node_id.into(),
            smap,
            client,
        })
    }

    pub fn progress(&self, owner: &str, msg: NotifMsg) {
        self.send(api::PROGRESS, owner, msg);
    }

    pub fn finished(&self, owner: &str, msg: NotifMsg) {
        self.send(api::FINISHED, owner, msg);
    }

    fn send(&self, kind: &'static str, owner: &str, msg: NotifMsg) {
        let smap = self.smap.get();
        let psi = match smap.pmap.get(owner) {
            Some(psi) => psi.clone(),
            None => {
                debug!("drop {}: owner proxy {} not in {}", msg, owner, smap);
                return;
            }
        };
        let url = format!("{}{}", psi.url(), api::join(&[api::NOTIFS, kind]));
        let client = self.client.clone();
        let caller = self.node_id.clone();
        tokio::spawn(async move {
            let res = client
                .post(url)
                .header(api::HEADER_CALLER_ID, caller)
                .json(&msg)
                .send()
                .await;
            if let Err(e) = res {
                debug!("notify {} to {} failed: {}", msg, psi, e);
            }
        });
    }
}
