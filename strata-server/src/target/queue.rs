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

use crate::target::DownloadTask;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use strata_common::{err_box, StoreError, StoreResult};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, Mutex};

struct QueueInner {
    // None once the queue is stopped
    tx: Option<mpsc::Sender<Arc<DownloadTask>>>,
    // uids stay in the set until the task completes, so an in-flight task
    // cannot be re-enqueued
    uids: HashSet<String>,
}

/// Bounded per-mountpath queue of pending downloads with O(1) duplicate
/// detection by task uid.
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    rx: Mutex<mpsc::Receiver<Arc<DownloadTask>>>,
    put_timeout: Duration,
}

impl TaskQueue {
    pub fn new(cap: usize, put_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(cap.max(1));
        Self {
            inner: Mutex::new(QueueInner {
                tx: Some(tx),
                uids: HashSet::new(),
            }),
            rx: Mutex::new(rx),
            put_timeout,
        }
    }

    /// `Ok(false)` means the task is already queued or running and was
    /// dropped idempotently. A full queue fails with a retryable timeout.
    pub async fn put(&self, task: Arc<DownloadTask>) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let uid = task.uid();
        if inner.uids.contains(&uid) {
            return Ok(false);
        }
        let tx = match &inner.tx {
            Some(tx) => tx.clone(),
            None => return err_box!("queue is stopped"),
        };

        match tx.send_timeout(task.clone(), self.put_timeout).await {
            Ok(()) => {
                inner.uids.insert(uid);
                Ok(true)
            }
            Err(SendTimeoutError::Timeout(_)) => Err(StoreError::Timeout(format!(
                "timeout when trying to put task {} in queue, try later",
                task
            ))),
            Err(SendTimeoutError::Closed(_)) => err_box!("queue is stopped"),
        }
    }

    /// Next task whose uid is still live; `None` once the queue is stopped
    /// and drained.
    pub async fn get(&self) -> Option<Arc<DownloadTask>> {
        loop {
            let task = self.rx.lock().await.recv().await?;
            let inner = self.inner.lock().await;
            if inner.uids.contains(&task.uid()) {
                return Some(task);
            }
            // deleted while queued; skip
        }
    }

    /// Forget a uid; returns whether it was known.
    pub async fn delete(&self, uid: &str) -> bool {
        self.inner.lock().await.uids.remove(uid)
    }

    pub async fn stop(&self) {
        self.inner.lock().await.tx = None;
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.uids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::state::{DlObj, Provider};
    use strata_common::utils::TimeSpent;

    fn new_task(objname: &str) -> Arc<DownloadTask> {
        let (tx, _rx) = tokio::sync::oneshot::channel();
        Arc::new(DownloadTask::new(
            "job-1",
            "bck",
            Provider::Local,
            "p1",
            DlObj {
                objname: objname.into(),
                link: format!("http://x/{}", objname),
            },
            None,
            Default::default(),
            tx,
        ))
    }

    #[tokio::test]
    async fn test_put_dedup() {
        let q = TaskQueue::new(4, Duration::from_millis(100));
        assert!(q.put(new_task("a")).await.unwrap());
        assert!(!q.put(new_task("a")).await.unwrap());
        assert!(q.put(new_task("b")).await.unwrap());
        assert_eq!(q.len().await, 2);
    }

    #[tokio::test]
    async fn test_put_timeout_on_full_queue() {
        let q = TaskQueue::new(1, Duration::from_millis(300));
        q.put(new_task("a")).await.unwrap();

        let spent = TimeSpent::new();
        let err = q.put(new_task("b")).await.unwrap_err();
        let used = spent.used_ms();

        assert!(matches!(err, StoreError::Timeout(_)));
        assert!((300..=500).contains(&used), "put returned after {} ms", used);
    }

    #[tokio::test]
    async fn test_get_skips_deleted() {
        let q = TaskQueue::new(4, Duration::from_millis(100));
        let a = new_task("a");
        let b = new_task("b");
        q.put(a.clone()).await.unwrap();
        q.put(b.clone()).await.unwrap();

        assert!(q.delete(&a.uid()).await);
        q.stop().await;

        // "a" was deleted while queued; only "b" comes out
        let got = q.get().await.unwrap();
        assert_eq!(got.uid(), b.uid());
        assert!(q.get().await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_uid_blocks_requeue() {
        let q = TaskQueue::new(4, Duration::from_millis(100));
        let a = new_task("a");
        q.put(a.clone()).await.unwrap();

        let got = q.get().await.unwrap();
        assert_eq!(got.uid(), a.uid());

        // still in flight: same uid must be dropped
        assert!(!q.put(new_task("a")).await.unwrap());

        // completion deletes the uid, then re-admission works
        assert!(q.delete(&a.uid()).await);
        assert!(q.put(new_task("a")).await.unwrap());
    }
}
