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

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use strata_common::{StoreError, StoreResult};
use url::Url;

/// Map a transport-level failure onto the store error kinds: timeouts stay
/// retryable, everything else is opaque.
pub fn request_err(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(e.to_string())
    } else {
        StoreError::common(e.to_string())
    }
}

/// Thin REST client bound to one node's base URL.
pub struct RestClient {
    client: Client,
    base_url: Url,
}

impl RestClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(request_err)?;
        Ok(Self { client, base_url })
    }

    pub fn parse(base_url: impl AsRef<str>) -> StoreResult<Self> {
        let url = Url::parse(base_url.as_ref())
            .map_err(|e| StoreError::invalid_input(format!("bad base url: {}", e)))?;
        Ok(Self::new(url))
    }

    fn url(&self, path: &str) -> StoreResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::invalid_input(format!("bad url path {}: {}", path, e)))
    }

    pub fn request(&self, method: Method, path: &str) -> StoreResult<RequestBuilder> {
        Ok(self.client.request(method, self.url(path)?))
    }

    pub async fn get<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> StoreResult<Response> {
        self.request(Method::GET, path)?
            .query(query)
            .send()
            .await
            .map_err(request_err)
    }

    pub async fn post_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> StoreResult<Response> {
        self.request(Method::POST, path)?
            .query(query)
            .send()
            .await
            .map_err(request_err)
    }

    pub async fn post_json<Q: Serialize + ?Sized, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
        body: &B,
    ) -> StoreResult<Response> {
        self.request(Method::POST, path)?
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(request_err)
    }

    pub async fn delete<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> StoreResult<Response> {
        self.request(Method::DELETE, path)?
            .query(query)
            .send()
            .await
            .map_err(request_err)
    }
}
