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

use crate::target::{DownloadTask, DownloaderShared, TaskQueue};
use log::{error, info};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Default)]
struct JoggerState {
    task: Option<Arc<DownloadTask>>,
    stop_agent: bool,
}

/// The worker bound to one mountpath: drains the queue and runs downloads
/// one at a time.
pub(crate) struct Jogger {
    pub mpath: String,
    pub q: Arc<TaskQueue>,
    state: Arc<Mutex<JoggerState>>,
    terminate_rx: Option<oneshot::Receiver<()>>,
}

impl Jogger {
    pub fn start(mpath: String, shared: Arc<DownloaderShared>) -> Self {
        let q = Arc::new(TaskQueue::new(
            shared.conf.queue_cap,
            shared.conf.queue_put_timeout,
        ));
        let state = Arc::new(Mutex::new(JoggerState::default()));
        let (terminate_tx, terminate_rx) = oneshot::channel();

        tokio::spawn(jog(
            mpath.clone(),
            q.clone(),
            state.clone(),
            shared,
            terminate_tx,
        ));

        Self {
            mpath,
            q,
            state,
            terminate_rx: Some(terminate_rx),
        }
    }

    pub fn current_task(&self) -> Option<Arc<DownloadTask>> {
        self.state.lock().unwrap().task.clone()
    }

    /// Close the queue, abort the running task, await loop termination.
    pub async fn stop(mut self) {
        info!("stopping jogger for mountpath {:?}", self.mpath);
        self.q.stop().await;

        {
            let mut state = self.state.lock().unwrap();
            state.stop_agent = true;
            if let Some(task) = &state.task {
                task.cancel();
            }
        }

        if let Some(rx) = self.terminate_rx.take() {
            let _ = rx.await;
        }
    }
}

async fn jog(
    mpath: String,
    q: Arc<TaskQueue>,
    state: Arc<Mutex<JoggerState>>,
    shared: Arc<DownloaderShared>,
    terminate_tx: oneshot::Sender<()>,
) {
    info!("starting jogger for mountpath {:?}", mpath);
    loop {
        let task = match q.get().await {
            Some(task) => task,
            None => break,
        };

        {
            let mut st = state.lock().unwrap();
            if st.stop_agent {
                break;
            }
            st.task = Some(task.clone());
        }

        // run the download on its own task and await its completion
        let handle = tokio::spawn(task.clone().download(shared.clone()));
        let res = match handle.await {
            Ok(res) => res,
            Err(e) => Err(strata_common::err_msg!("download task panicked: {}", e)),
        };

        if let Err(e) = &res {
            error!("error occurred when downloading {}: {}", task, e);
        }

        state.lock().unwrap().task = None;
        if q.delete(&task.uid()).await {
            shared.dec_pending();
        }

        shared.task_done(&task, res).await;
    }

    let _ = terminate_tx.send(());
}
