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

use crate::rest_client::{request_err, RestClient};
use reqwest::Response;
use strata_common::api;
use strata_common::state::{DlBucketBody, DlMultiBody, DlRangeBody, DlSingleBody};
use strata_common::{StoreError, StoreResult};

/// Client side of the proxy download surface: submits jobs and drives the
/// admin operations on them.
pub struct DownloadClient {
    rest: RestClient,
}

impl DownloadClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn connect(proxy_url: impl AsRef<str>) -> StoreResult<Self> {
        Ok(Self::new(RestClient::parse(proxy_url)?))
    }

    /// Submit one URL; the reply body is the job uuid.
    pub async fn submit_single(&self, body: &DlSingleBody) -> StoreResult<String> {
        let path = api::join(&[api::DOWNLOAD, api::DOWNLOAD_SINGLE]);
        let resp = self.rest.post_query(&path, body).await?;
        Self::read_reply(resp).await
    }

    pub async fn submit_range(&self, body: &DlRangeBody) -> StoreResult<String> {
        let path = api::join(&[api::DOWNLOAD, api::DOWNLOAD_RANGE]);
        let resp = self.rest.post_query(&path, body).await?;
        Self::read_reply(resp).await
    }

    /// `objects` is either a `{objname: link}` map or a `[link]` array.
    pub async fn submit_multi(
        &self,
        query: &DlMultiBody,
        objects: &serde_json::Value,
    ) -> StoreResult<String> {
        let path = api::join(&[api::DOWNLOAD, api::DOWNLOAD_MULTI]);
        let resp = self.rest.post_json(&path, query, objects).await?;
        Self::read_reply(resp).await
    }

    pub async fn submit_bucket(&self, bucket: &str, body: &DlBucketBody) -> StoreResult<String> {
        let path = api::join(&[api::DOWNLOAD, api::DOWNLOAD_BUCKET, bucket]);
        let resp = self.rest.post_query(&path, body).await?;
        Self::read_reply(resp).await
    }

    /// Cluster-wide status summary, e.g.
    /// `Status: [finished: 1, total: 1, pct: 100.000%]`.
    pub async fn status(&self, id: &str) -> StoreResult<String> {
        let path = api::join(&[api::DOWNLOAD]);
        let resp = self.rest.get(&path, &[(api::PARAM_ID, id)]).await?;
        Self::read_reply(resp).await
    }

    pub async fn cancel(&self, id: &str) -> StoreResult<String> {
        let path = api::join(&[api::DOWNLOAD]);
        let resp = self.rest.delete(&path, &[(api::PARAM_ID, id)]).await?;
        Self::read_reply(resp).await
    }

    async fn read_reply(resp: Response) -> StoreResult<String> {
        let status = resp.status();
        let body = resp.text().await.map_err(request_err)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(StoreError::from_remote(status.as_u16(), body))
        }
    }
}
