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

//! Demand-driven download executor: one jogger per mountpath, dispatch of
//! download/admin/mountpath requests through a single owner loop.

use crate::target::{
    task_uid, DownloadMetrics, DownloadNotifier, DownloadTask, JobDb, Jogger, ObjectStore,
};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use strata_common::conf::DownloadConf;
use strata_common::state::{DlBody, DlStatusResp, NotifMsg, NotifStats};
use strata_common::{err_box, err_msg, StoreResult};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

enum AdminReq {
    Status {
        id: String,
        tx: oneshot::Sender<StoreResult<DlStatusResp>>,
    },
    Cancel {
        id: String,
        tx: oneshot::Sender<StoreResult<String>>,
    },
}

enum MountpathReq {
    Add(String),
    Remove(String),
    Enable(String),
    Disable(String),
}

pub(crate) struct DownloaderShared {
    pub store: Arc<ObjectStore>,
    pub db: Arc<JobDb>,
    pub notifier: Arc<DownloadNotifier>,
    pub metrics: Arc<DownloadMetrics>,
    pub http: reqwest::Client,
    pub conf: DownloadConf,
    pending: AtomicI64,
}

impl DownloaderShared {
    pub fn inc_pending(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec_pending(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::Acquire)
    }

    /// Per-job progress derived from what is already on disk.
    pub fn job_progress(&self, body: &DlBody) -> (usize, usize) {
        let total = body.objs.len();
        let mut finished = 0;
        for obj in &body.objs {
            if let Ok(lom) = self.store.resolve(&body.bucket, &obj.objname) {
                if lom.exists() {
                    finished += 1;
                }
            }
        }
        (finished, total)
    }

    /// Report task completion to the owning proxy. Fire-and-forget; when the
    /// job is gone (cancelled) nothing is sent.
    pub async fn task_done(&self, task: &DownloadTask, res: StoreResult<()>) {
        let body = match self.db.get_job(&task.job_id) {
            Ok(body) => body,
            Err(_) => return,
        };
        let err_msg = match res {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        };
        let (finished, total) = self.job_progress(&body);
        let stats = NotifStats {
            finished: finished >= total,
            aborted: false,
            objs_done: finished,
            objs_total: total,
            bytes: task.current_size(),
        };
        let msg = NotifMsg::new(&task.job_id, &stats, err_msg);
        if stats.finished {
            self.notifier.finished(&body.owner, msg);
        } else {
            self.notifier.progress(&body.owner, msg);
        }
    }
}

/// The executor handle. All mutation of the jogger set happens on the owner
/// loop; the public methods only exchange requests with it.
pub struct Downloader {
    shared: Arc<DownloaderShared>,
    admin_tx: mpsc::Sender<AdminReq>,
    download_tx: mpsc::Sender<Arc<DownloadTask>>,
    mpath_tx: mpsc::Sender<MountpathReq>,
    stop: CancellationToken,
}

impl Downloader {
    pub fn start(
        store: Arc<ObjectStore>,
        db: Arc<JobDb>,
        notifier: Arc<DownloadNotifier>,
        conf: DownloadConf,
    ) -> Arc<Self> {
        let shared = Arc::new(DownloaderShared {
            store,
            db,
            notifier,
            metrics: Arc::new(DownloadMetrics::default()),
            http: reqwest::Client::new(),
            conf,
            pending: AtomicI64::new(0),
        });

        let (admin_tx, admin_rx) = mpsc::channel(1);
        let (download_tx, download_rx) = mpsc::channel(1);
        let (mpath_tx, mpath_rx) = mpsc::channel(1);
        let stop = CancellationToken::new();

        let runner = DownloaderRunner {
            shared: shared.clone(),
            joggers: HashMap::new(),
            admin_rx,
            download_rx,
            mpath_rx,
            stop: stop.clone(),
        };
        tokio::spawn(runner.run());

        Arc::new(Self {
            shared,
            admin_tx,
            download_tx,
            mpath_tx,
            stop,
        })
    }

    pub fn metrics(&self) -> Arc<DownloadMetrics> {
        self.shared.metrics.clone()
    }

    pub fn pending(&self) -> i64 {
        self.shared.pending()
    }

    /// Admit a job: persist it, enqueue one task per object, await the
    /// admission outcome of each. The first failure unwinds the remainder
    /// with a job-wide cancel.
    pub async fn download(&self, body: DlBody) -> StoreResult<()> {
        body.validate()?;
        let timeout = body.timeout()?;

        self.shared.db.set_job(&body.id, &body)?;

        let mut responses = Vec::with_capacity(body.objs.len());
        for obj in &body.objs {
            // pending is decremented when the task leaves the system: not
            // added, deleted on cancel, or completed by a jogger
            self.shared.inc_pending();

            let (tx, rx) = oneshot::channel();
            let task = Arc::new(DownloadTask::new(
                &body.id,
                &body.bucket,
                body.provider,
                &body.owner,
                obj.clone(),
                timeout,
                body.headers.clone(),
                tx,
            ));
            if self.download_tx.send(task).await.is_err() {
                self.shared.dec_pending();
                return err_box!("downloader is stopped");
            }
            responses.push(rx);
        }

        for rx in responses {
            match rx.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    // cancel whole job
                    if let Err(cancel_err) = self.cancel(&body.id).await {
                        warn!("cancel job {} after admission failure: {}", body.id, cancel_err);
                    }
                    return Err(e);
                }
                Err(_) => return err_box!("downloader is stopped"),
            }
        }
        Ok(())
    }

    pub async fn status(&self, id: &str) -> StoreResult<DlStatusResp> {
        let (tx, rx) = oneshot::channel();
        self.admin_tx
            .send(AdminReq::Status { id: id.into(), tx })
            .await
            .map_err(|_| err_msg!("downloader is stopped"))?;
        rx.await.map_err(|_| err_msg!("downloader is stopped"))?
    }

    pub async fn cancel(&self, id: &str) -> StoreResult<String> {
        let (tx, rx) = oneshot::channel();
        self.admin_tx
            .send(AdminReq::Cancel { id: id.into(), tx })
            .await
            .map_err(|_| err_msg!("downloader is stopped"))?;
        rx.await.map_err(|_| err_msg!("downloader is stopped"))?
    }

    pub async fn req_add_mountpath(&self, mpath: impl Into<String>) {
        let _ = self.mpath_tx.send(MountpathReq::Add(mpath.into())).await;
    }

    pub async fn req_remove_mountpath(&self, mpath: impl Into<String>) {
        let _ = self.mpath_tx.send(MountpathReq::Remove(mpath.into())).await;
    }

    pub async fn stop(&self) {
        self.stop.cancel();
    }
}

struct DownloaderRunner {
    shared: Arc<DownloaderShared>,
    joggers: HashMap<String, Jogger>,
    admin_rx: mpsc::Receiver<AdminReq>,
    download_rx: mpsc::Receiver<Arc<DownloadTask>>,
    mpath_rx: mpsc::Receiver<MountpathReq>,
    stop: CancellationToken,
}

impl DownloaderRunner {
    async fn run(mut self) {
        for mpath in self.shared.store.mountpaths() {
            self.add_jogger(mpath);
        }

        loop {
            tokio::select! {
                Some(req) = self.admin_rx.recv() => match req {
                    AdminReq::Status { id, tx } => {
                        let _ = tx.send(self.dispatch_status(&id));
                    }
                    AdminReq::Cancel { id, tx } => {
                        let _ = tx.send(self.dispatch_cancel(&id).await);
                    }
                },
                Some(task) = self.download_rx.recv() => self.dispatch_download(task).await,
                Some(req) = self.mpath_rx.recv() => match req {
                    MountpathReq::Add(mpath) => {
                        if let Err(e) = self.shared.store.add_mountpath(&mpath) {
                            warn!("add mountpath {:?}: {}", mpath, e);
                        } else {
                            self.add_jogger(mpath);
                        }
                    }
                    MountpathReq::Remove(mpath) => {
                        self.shared.store.remove_mountpath(&mpath);
                        self.remove_jogger(&mpath).await;
                    }
                    // enable/disable are no-ops for the executor
                    MountpathReq::Enable(_) | MountpathReq::Disable(_) => {}
                },
                _ = self.stop.cancelled() => break,
            }
        }

        for (_, jogger) in self.joggers.drain() {
            jogger.stop().await;
        }
        info!("downloader stopped");
    }

    fn add_jogger(&mut self, mpath: String) {
        if self.joggers.contains_key(&mpath) {
            warn!("attempted to add an already existing mountpath {:?}", mpath);
            return;
        }
        let jogger = Jogger::start(mpath.clone(), self.shared.clone());
        self.joggers.insert(mpath, jogger);
    }

    async fn remove_jogger(&mut self, mpath: &str) {
        match self.joggers.remove(mpath) {
            Some(jogger) => jogger.stop().await,
            None => warn!("invalid mountpath {:?}", mpath),
        }
    }

    /// Route the task onto the jogger owning its object's mountpath.
    async fn dispatch_download(&mut self, task: Arc<DownloadTask>) {
        let mut added = false;
        let res = match self.shared.store.resolve(&task.bucket, &task.obj.objname) {
            Err(e) => Err(e),
            Ok(lom) if lom.exists() => Ok(format!(
                "object {:?} already exists - skipping",
                task.obj.objname
            )),
            Ok(lom) => match self.joggers.get(&lom.mpath) {
                None => err_box!("no jogger exists for mountpath {:?} of {}", lom.mpath, task),
                Some(jogger) => match jogger.q.put(task.clone()).await {
                    Ok(true) => {
                        added = true;
                        Ok(format!("Download request {} added to queue", task))
                    }
                    Ok(false) => Ok(format!("Download request {} already in queue", task)),
                    Err(e) => Err(e),
                },
            },
        };

        task.respond(res);

        // error, object exists, or duplicate: the task never entered a queue
        if !added {
            self.shared.dec_pending();
        }
    }

    /// Cancel the running task when its uid matches, drain matching queued
    /// tasks, then drop the persisted job.
    async fn dispatch_cancel(&mut self, id: &str) -> StoreResult<String> {
        let body = self.shared.db.get_job(id)?;

        for jogger in self.joggers.values() {
            for obj in &body.objs {
                if let Ok(lom) = self.shared.store.resolve(&body.bucket, &obj.objname) {
                    if lom.exists() {
                        continue;
                    }
                }
                let uid = task_uid(&obj.link, &body.bucket, &obj.objname);

                if let Some(task) = jogger.current_task() {
                    if task.uid() == uid {
                        task.cancel();
                        continue;
                    }
                }

                if jogger.q.delete(&uid).await {
                    self.shared.dec_pending();
                }
            }
        }

        self.shared.db.del_job(id)?;

        let stats = NotifStats {
            aborted: true,
            ..Default::default()
        };
        self.shared
            .notifier
            .finished(&body.owner, NotifMsg::new(id, &stats, ""));

        Ok(format!("cancelled download job {}", id))
    }

    /// Objects already present locally count as finished; the in-flight
    /// task's byte count rides along in `current_bytes`.
    fn dispatch_status(&self, id: &str) -> StoreResult<DlStatusResp> {
        let body = self.shared.db.get_job(id)?;
        let (finished, total) = self.shared.job_progress(&body);

        let mut current_bytes = 0;
        for jogger in self.joggers.values() {
            if let Some(task) = jogger.current_task() {
                if task.job_id == id {
                    current_bytes += task.current_size();
                }
            }
        }

        Ok(DlStatusResp {
            finished,
            total,
            current_bytes,
            job_finished: finished >= total,
            aborted: false,
        })
    }
}
