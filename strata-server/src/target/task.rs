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

use crate::target::DownloaderShared;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use log::debug;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use strata_client::request_err;
use strata_common::state::{DlObj, Provider};
use strata_common::utils::TimeSpent;
use strata_common::{StoreError, StoreResult};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// A task is uniquely identified in its queue by `(link, bucket, object)`.
pub fn task_uid(link: &str, bucket: &str, objname: &str) -> String {
    format!("{}|{}|{}", link, bucket, objname)
}

/// One `(job, object)` download scheduled on exactly one mountpath.
pub struct DownloadTask {
    pub job_id: String,
    pub bucket: String,
    pub provider: Provider,
    pub owner: String,
    pub obj: DlObj,
    pub timeout: Option<Duration>,
    pub headers: HashMap<String, String>,

    // bytes fetched so far, updated as the response body streams in
    current_size: AtomicU64,
    cancel: CancellationToken,
    response_tx: Mutex<Option<oneshot::Sender<StoreResult<String>>>>,
}

impl DownloadTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: impl Into<String>,
        bucket: impl Into<String>,
        provider: Provider,
        owner: impl Into<String>,
        obj: DlObj,
        timeout: Option<Duration>,
        headers: HashMap<String, String>,
        response_tx: oneshot::Sender<StoreResult<String>>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            bucket: bucket.into(),
            provider,
            owner: owner.into(),
            obj,
            timeout,
            headers,
            current_size: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            response_tx: Mutex::new(Some(response_tx)),
        }
    }

    pub fn uid(&self) -> String {
        task_uid(&self.obj.link, &self.bucket, &self.obj.objname)
    }

    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn add_bytes(&self, n: u64) {
        self.current_size.fetch_add(n, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Deliver the admission outcome; at most once.
    pub fn respond(&self, res: StoreResult<String>) {
        if let Some(tx) = self.response_tx.lock().unwrap().take() {
            let _ = tx.send(res);
        }
    }

    /// Fetch the object and hand the stream to local storage. Cancellation
    /// aborts the in-flight request via the task's token; the configured
    /// timeout bounds the whole transfer.
    pub(crate) async fn download(self: Arc<Self>, shared: Arc<DownloaderShared>) -> StoreResult<()> {
        let lom = shared.store.resolve(&self.bucket, &self.obj.objname)?;
        if lom.exists() {
            return Err(StoreError::AlreadyExists(lom.uname()));
        }
        let workfile = shared.store.workfile(&lom);

        let timeout = self.timeout.unwrap_or(shared.conf.default_timeout);
        let mut req = shared.http.get(&self.obj.link).timeout(timeout);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        debug!("starting download for {}", self);
        let spent = TimeSpent::new();

        let transfer = async {
            let resp = req.send().await.map_err(request_err)?;
            let status = resp.status();
            if status.as_u16() >= 400 {
                return Err(StoreError::from_remote(
                    status.as_u16(),
                    format!("status code: {}", status.as_u16()),
                ));
            }
            let body = ProgressStream {
                inner: resp.bytes_stream().boxed(),
                task: self.clone(),
            };
            shared.store.receive(&workfile, body, &lom).await
        };

        let written = tokio::select! {
            res = transfer => {
                match res {
                    Ok(n) => n,
                    Err(e) => {
                        shared.metrics.add_error();
                        let _ = tokio::fs::remove_file(&workfile).await;
                        return Err(e);
                    }
                }
            }
            _ = self.cancel.cancelled() => {
                shared.metrics.add_error();
                let _ = tokio::fs::remove_file(&workfile).await;
                return Err(StoreError::Aborted(format!("task {} cancelled", self)));
            }
        };

        shared.metrics.add_download(written, spent.used_ms());
        Ok(())
    }
}

impl Display for DownloadTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{id: {:?}, objname: {:?}, link: {:?}, bucket: {:?}}}",
            self.job_id, self.obj.objname, self.obj.link, self.bucket
        )
    }
}

/// Accumulates streamed byte counts into the task as chunks pass through.
struct ProgressStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    task: Arc<DownloadTask>,
}

impl Stream for ProgressStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.task.add_bytes(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                Poll::Ready(Some(Err(std::io::Error::new(std::io::ErrorKind::Other, e))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
