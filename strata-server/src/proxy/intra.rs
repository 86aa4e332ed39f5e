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

use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use strata_common::cluster::Snode;
use strata_common::{api, StoreError};

/// One node's reply to an intra-cluster call, kept with enough detail for
/// the admin fan-out aggregation (404s are distinguishable).
pub(crate) struct DlResponse {
    pub body: String,
    pub status: u16,
    pub err: Option<StoreError>,
}

/// Proxy-side client for target requests; every call carries the caller id.
pub(crate) struct IntraClient {
    node_id: String,
    client: reqwest::Client,
}

impl IntraClient {
    pub fn new(node_id: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            node_id: node_id.into(),
            client,
        }
    }

    pub async fn request<B: Serialize>(
        &self,
        method: Method,
        si: &Snode,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> DlResponse {
        let url = format!("{}{}", si.url(), path);
        let mut req = self
            .client
            .request(method, url)
            .query(query)
            .header(api::HEADER_CALLER_ID, self.node_id.clone());
        if let Some(body) = body {
            req = req.json(body);
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                let err = if status >= 400 {
                    Some(StoreError::from_remote(status, body.clone()))
                } else {
                    None
                };
                DlResponse { body, status, err }
            }
            Err(e) => DlResponse {
                body: String::new(),
                status: 500,
                err: Some(StoreError::common(format!("request to {} failed: {}", si, e))),
            },
        }
    }
}
