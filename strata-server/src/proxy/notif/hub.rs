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

use crate::proxy::notif::{JsonNotifs, NlMsg, NotifListener};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use strata_common::cluster::{Smap, SmapListener, SmapOwner, Snode};
use strata_common::state::{DlStatusResp, NotifKind, NotifMsg};
use strata_common::utils::{LocalTime, SerdeUtils};
use strata_common::{api, StoreError, StoreResult};
use tokio_util::sync::CancellationToken;

/// Lookup filter: exact uuid, or kind plus an optional bucket query.
#[derive(Debug, Clone, Default)]
pub struct NlFilter {
    pub id: Option<String>,
    pub kind: Option<NotifKind>,
    pub buckets: Option<Vec<String>>,
}

impl NlFilter {
    fn matches(&self, nl: &NotifListener) -> bool {
        if let Some(id) = &self.id {
            if nl.uuid() == id {
                return true;
            }
        }
        if self.kind == Some(nl.kind()) {
            match &self.buckets {
                None => return true,
                Some(query) if query.is_empty() => return true,
                Some(query) => {
                    return nl.buckets().iter().any(|b| query.contains(b));
                }
            }
        }
        false
    }
}

/// One listener table; a listener lives in `running` xor `finished`.
/// Writers never take a table lock while holding a listener's own lock;
/// housekeeping snapshots the table and processes listeners after releasing
/// the R-lock.
#[derive(Default)]
struct Listeners {
    m: RwLock<HashMap<String, Arc<NotifListener>>>,
}

impl Listeners {
    fn entry(&self, uuid: &str) -> Option<Arc<NotifListener>> {
        self.m.read().unwrap().get(uuid).cloned()
    }

    /// Returns true when the uuid already existed.
    fn add(&self, nl: Arc<NotifListener>) -> bool {
        let mut m = self.m.write().unwrap();
        if m.contains_key(nl.uuid()) {
            return true;
        }
        m.insert(nl.uuid().to_string(), nl);
        false
    }

    fn del(&self, uuid: &str) -> bool {
        self.m.write().unwrap().remove(uuid).is_some()
    }

    fn len(&self) -> usize {
        self.m.read().unwrap().len()
    }

    fn snapshot(&self) -> Vec<Arc<NotifListener>> {
        self.m.read().unwrap().values().cloned().collect()
    }

    /// Latest-ended matching listener; a running match returns right away.
    fn find(&self, flt: &NlFilter) -> Option<Arc<NotifListener>> {
        let m = self.m.read().unwrap();
        let mut found: Option<Arc<NotifListener>> = None;
        let mut ftime = 0u64;
        for nl in m.values() {
            if nl.end_time() < ftime {
                continue;
            }
            if flt.matches(nl) {
                ftime = nl.end_time();
                found = Some(nl.clone());
            }
            if found.is_some() && !nl.finished() {
                return found;
            }
        }
        found
    }

    /// Merge semantics: an already-present uuid is dropped, a new listener
    /// is inserted with its added time refreshed.
    fn merge(&self, msgs: Vec<NlMsg>) {
        let mut m = self.m.write().unwrap();
        for msg in msgs {
            if m.contains_key(&msg.nl.uuid) {
                continue;
            }
            let nl = Arc::new(NotifListener::from_snapshot(msg.kind, msg.nl));
            nl.set_added_time();
            m.insert(nl.uuid().to_string(), nl);
        }
    }
}

/// The notification fabric of one proxy.
pub struct NotifHub {
    node_id: String,
    conf: strata_common::conf::NotifyConf,
    running: Listeners,
    fin: Listeners,
    smap_ver: AtomicU64,
    client: reqwest::Client,
    stop: CancellationToken,
}

impl NotifHub {
    pub fn new(node_id: impl Into<String>, conf: strata_common::conf::NotifyConf) -> Arc<Self> {
        let client = reqwest::Client::builder()
            .timeout(conf.bcast_timeout)
            .build()
            .unwrap_or_default();
        Arc::new(Self {
            node_id: node_id.into(),
            conf,
            running: Listeners::default(),
            fin: Listeners::default(),
            smap_ver: AtomicU64::new(0),
            client,
            stop: CancellationToken::new(),
        })
    }

    /// Register with the cluster-map owner and start housekeeping.
    pub fn start(self: &Arc<Self>, smap_owner: &SmapOwner) {
        smap_owner.reg_listener(self.clone());

        let me = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(me.conf.housekeep_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tick.tick().await; // the immediate first tick
            loop {
                tokio::select! {
                    _ = tick.tick() => me.housekeep().await,
                    _ = me.stop.cancelled() => break,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.stop.cancel();
    }

    /// Start listening for a job; idempotent by uuid.
    pub fn add(&self, nl: Arc<NotifListener>) -> StoreResult<()> {
        if nl.uuid().is_empty() {
            return Err(StoreError::invalid_input("listener without a uuid"));
        }
        if self.running.add(nl.clone()) {
            return Ok(());
        }
        nl.set_added_time();
        info!("add {}", nl);
        Ok(())
    }

    pub fn entry(&self, uuid: &str) -> Option<Arc<NotifListener>> {
        self.running.entry(uuid).or_else(|| self.fin.entry(uuid))
    }

    pub fn find(&self, flt: &NlFilter) -> Option<Arc<NotifListener>> {
        if let Some(id) = &flt.id {
            return self.entry(id);
        }
        if let Some(nl) = self.running.find(flt) {
            return Some(nl);
        }
        self.fin.find(flt)
    }

    pub fn owner(&self, uuid: &str) -> Option<String> {
        self.entry(uuid).map(|nl| nl.owner().to_string())
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn finished_count(&self) -> usize {
        self.fin.len()
    }

    /// Absorb the race between job admission and the first notification.
    async fn entry_with_retry(&self, uuid: &str) -> Option<Arc<NotifListener>> {
        for _ in 0..4 {
            if let Some(nl) = self.entry(uuid) {
                return Some(nl);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        None
    }

    /// Ingress from a target. Senders are fire-and-forget, so `not-found`,
    /// `unknown-notifier` and `already-finished` are benign and silent.
    pub async fn handle_msg(&self, kind: &str, caller: &str, msg: NotifMsg) -> StoreResult<()> {
        if kind != api::PROGRESS && kind != api::FINISHED {
            return Err(StoreError::invalid_input(format!(
                "invalid notification route {:?}",
                kind
            )));
        }

        let nl = match self.entry_with_retry(&msg.uuid).await {
            Some(nl) => nl,
            None => {
                debug!("{}: unknown listener for {}", self.node_id, msg);
                return Ok(());
            }
        };

        if !nl.notifiers().contains_key(caller) {
            debug!("{}: {} from unknown notifier {}", self.node_id, msg, caller);
            return Ok(());
        }
        if nl.has_finished(caller) {
            debug!("{}: duplicate {} from {}, {}", self.node_id, msg, caller, nl);
            return Ok(());
        }

        let err = if msg.err_msg.is_empty() {
            None
        } else {
            Some(msg.err_msg.clone())
        };

        if kind == api::PROGRESS {
            nl.apply_progress(caller, msg.data, err);
        } else {
            let aborted = msg.stats().aborted;
            let done = nl.apply_finished(caller, msg.data, aborted, err);
            if done {
                self.done(&nl);
            }
        }
        Ok(())
    }

    /// Move a completed listener from `running` to `finished`, broadcast a
    /// best-effort cancel when it aborted, and fire the callback.
    fn done(&self, nl: &Arc<NotifListener>) {
        if !self.running.del(nl.uuid()) {
            // already moved by a concurrent completion
            return;
        }
        nl.mark_done();
        self.fin.add(nl.clone());
        info!("done {}", nl);

        if nl.aborted() {
            for si in nl.notifiers().values() {
                self.bcast_abort(si, nl.uuid());
            }
        }
        nl.fire_callback();
    }

    fn bcast_abort(&self, si: &Arc<Snode>, uuid: &str) {
        let url = format!("{}{}", si.url(), api::join(&[api::DOWNLOAD]));
        let req = self
            .client
            .delete(url)
            .query(&[(api::PARAM_ID, uuid)])
            .header(api::HEADER_CALLER_ID, self.node_id.clone());
        let si = si.clone();
        tokio::spawn(async move {
            if let Err(e) = req.send().await {
                debug!("abort broadcast to {} failed: {}", si, e);
            }
        });
    }

    /// Periodic pass: evict expired finished listeners, then pull stats from
    /// tardy notifiers of every running listener.
    pub async fn housekeep(&self) {
        let now = LocalTime::mills();
        let keep_ms = self.conf.remove_after().as_millis() as u64;
        for nl in self.fin.snapshot() {
            if now.saturating_sub(nl.end_time()) > keep_ms {
                self.fin.del(nl.uuid());
            }
        }

        // snapshot under the table R-lock, process outside it
        for nl in self.running.snapshot() {
            self.sync_stats(&nl).await;
        }
    }

    /// Pull reconciliation for one listener. A 404 from a notifier that had
    /// time to start means the job is gone there; the listener finishes with
    /// an error rather than staying orphaned.
    pub async fn sync_stats(&self, nl: &Arc<NotifListener>) {
        let tardy = nl.nodes_tardy(self.conf.progress_interval);
        if tardy.is_empty() {
            return;
        }

        let mut done = false;
        let futs = tardy.iter().map(|si| {
            let path = format!("{}{}", si.url(), api::join(&[api::DOWNLOAD]));
            let req = self
                .client
                .get(path)
                .query(&[(api::PARAM_ID, nl.uuid())])
                .header(api::HEADER_CALLER_ID, self.node_id.clone());
            async move { (si.clone(), req.send().await) }
        });

        for (si, res) in futures::future::join_all(futs).await {
            match res {
                Ok(resp) if resp.status().is_success() => {
                    let Ok(status) = resp.json::<DlStatusResp>().await else {
                        warn!("{}: bad stats payload from {}", nl, si);
                        continue;
                    };
                    let value =
                        serde_json::to_value(&status).unwrap_or(Value::Null);
                    if status.job_finished || status.aborted {
                        done = nl.apply_finished(&si.id, value, status.aborted, None) || done;
                    } else {
                        nl.apply_progress(&si.id, value, None);
                    }
                }
                Ok(resp) if resp.status().as_u16() == 404 => {
                    let age = LocalTime::mills().saturating_sub(nl.added_time());
                    if age < self.conf.progress_interval.as_millis() as u64 {
                        // likely did not start yet - skipping
                        continue;
                    }
                    let err = format!("{}: {} not found at {}", self.node_id, nl, si);
                    // not-found at one notifier ends the whole listener
                    done = nl.apply_finished(&si.id, Value::Null, true, Some(err)) || done;
                }
                Ok(resp) => {
                    debug!("{}: pull from {} replied {}", nl, si, resp.status());
                }
                Err(e) => {
                    debug!("{}: pull from {} failed: {}", nl, si, e);
                }
            }
        }

        if done {
            self.done(nl);
        }
    }

    /// Sync then return the per-notifier stats of one job.
    pub async fn query_stats(&self, uuid: &str) -> Option<HashMap<String, Value>> {
        let nl = self.entry(uuid)?;
        self.sync_stats(&nl).await;
        Some(nl.stats())
    }

    pub fn marshal(&self) -> StoreResult<Vec<u8>> {
        let envelope = JsonNotifs {
            running: self
                .running
                .snapshot()
                .iter()
                .map(|nl| NlMsg {
                    kind: nl.kind(),
                    nl: nl.to_snapshot(),
                })
                .collect(),
            finished: self
                .fin
                .snapshot()
                .iter()
                .map(|nl| NlMsg {
                    kind: nl.kind(),
                    nl: nl.to_snapshot(),
                })
                .collect(),
        };
        SerdeUtils::to_json(&envelope)
    }

    pub fn unmarshal(&self, data: &[u8]) -> StoreResult<()> {
        let envelope: JsonNotifs = SerdeUtils::from_json(data)?;
        if !envelope.running.is_empty() {
            self.running.merge(envelope.running);
        }
        if !envelope.finished.is_empty() {
            self.fin.merge(envelope.finished);
        }
        Ok(())
    }
}

impl SmapListener for NotifHub {
    /// A notifier that vanished or entered maintenance aborts its listeners
    /// with `NodeNotFound` and completes them.
    fn smap_changed(&self, smap: &Arc<Smap>) {
        let prev = self.smap_ver.fetch_max(smap.version, Ordering::AcqRel);
        if prev >= smap.version {
            return;
        }
        if self.running.len() == 0 {
            return;
        }

        let mut gone = Vec::new();
        for nl in self.running.snapshot() {
            for id in nl.notifiers().keys() {
                let missing = match smap.get_node(id) {
                    None => true,
                    Some(node) => node.in_maint_or_decomm(),
                };
                if missing {
                    gone.push((nl.clone(), id.clone()));
                    break;
                }
            }
        }

        for (nl, sid) in gone {
            info!("{}: stop waiting for {}: node {} gone", self.node_id, nl, sid);
            nl.abort_with_err(StoreError::NodeNotFound(sid).to_string());
            if self.running.del(nl.uuid()) {
                nl.mark_done();
                self.fin.add(nl.clone());
                nl.fire_callback();
            }
        }
    }
}
