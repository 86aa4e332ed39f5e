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
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use strata_common::cluster::Snode;
use strata_common::state::NotifKind;
use strata_common::utils::LocalTime;

pub type NlCallback = Arc<dyn Fn(&NotifListener) + Send + Sync>;

#[derive(Default)]
struct NlState {
    // per-notifier stats blob and the time it last arrived
    stats: HashMap<String, Value>,
    last_update: HashMap<String, u64>,
    finished: HashSet<String>,
    aborted: bool,
    err: Option<String>,
    added_time: u64,
    end_time: u64,
    callback_fired: bool,
}

/// Per-job listener held on the owning proxy. The kind tag selects the
/// variant behavior; all variants share this capability set.
pub struct NotifListener {
    uuid: String,
    kind: NotifKind,
    buckets: Vec<String>,
    notifiers: HashMap<String, Arc<Snode>>,
    owner: String,
    callback: Mutex<Option<NlCallback>>,
    state: RwLock<NlState>,
}

impl NotifListener {
    pub fn new(
        uuid: impl Into<String>,
        kind: NotifKind,
        buckets: Vec<String>,
        notifiers: Vec<Arc<Snode>>,
        owner: impl Into<String>,
    ) -> Self {
        let notifiers = notifiers
            .into_iter()
            .map(|si| (si.id.clone(), si))
            .collect();
        Self {
            uuid: uuid.into(),
            kind,
            buckets,
            notifiers,
            owner: owner.into(),
            callback: Mutex::new(None),
            state: RwLock::new(NlState::default()),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn kind(&self) -> NotifKind {
        self.kind
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    pub fn notifiers(&self) -> &HashMap<String, Arc<Snode>> {
        &self.notifiers
    }

    pub fn set_callback(&self, cb: NlCallback) {
        *self.callback.lock().unwrap() = Some(cb);
    }

    pub fn set_added_time(&self) {
        self.state.write().unwrap().added_time = LocalTime::mills();
    }

    pub fn added_time(&self) -> u64 {
        self.state.read().unwrap().added_time
    }

    pub fn end_time(&self) -> u64 {
        self.state.read().unwrap().end_time
    }

    /// Listener-level completion: the end time is stamped when the listener
    /// moves to the finished table.
    pub fn finished(&self) -> bool {
        self.end_time() > 0
    }

    pub fn has_finished(&self, node_id: &str) -> bool {
        self.state.read().unwrap().finished.contains(node_id)
    }

    pub fn aborted(&self) -> bool {
        self.state.read().unwrap().aborted
    }

    pub fn err(&self) -> Option<String> {
        self.state.read().unwrap().err.clone()
    }

    pub fn stats(&self) -> HashMap<String, Value> {
        self.state.read().unwrap().stats.clone()
    }

    pub fn apply_progress(&self, node_id: &str, data: Value, err: Option<String>) {
        let mut st = self.state.write().unwrap();
        if let Some(e) = err {
            st.err = Some(e);
        }
        if !data.is_null() {
            st.stats.insert(node_id.to_string(), data);
        }
        st.last_update.insert(node_id.to_string(), LocalTime::mills());
    }

    /// Mark one notifier finished. Returns whether the whole listener is
    /// done: every notifier reported finish, or the listener is aborted.
    pub fn apply_finished(
        &self,
        node_id: &str,
        data: Value,
        aborted: bool,
        err: Option<String>,
    ) -> bool {
        let mut st = self.state.write().unwrap();
        if !data.is_null() {
            st.stats.insert(node_id.to_string(), data);
        }
        st.last_update.insert(node_id.to_string(), LocalTime::mills());
        st.finished.insert(node_id.to_string());

        if aborted {
            st.aborted = true;
            if err.is_none() && st.err.is_none() {
                // the sender supplied no error: synthesize one
                st.err = Some(format!("{} aborted, node {}", self, node_id));
            }
        }
        if let Some(e) = err {
            st.err = Some(e);
        }

        st.finished.len() >= self.notifiers.len() || st.aborted
    }

    /// Abort without any notifier report (cluster-map change path).
    pub fn abort_with_err(&self, err: impl Into<String>) {
        let mut st = self.state.write().unwrap();
        st.aborted = true;
        st.err = Some(err.into());
    }

    /// Notifiers that have not reported within `interval` and are not yet
    /// finished.
    pub fn nodes_tardy(&self, interval: Duration) -> Vec<Arc<Snode>> {
        let now = LocalTime::mills();
        let limit = interval.as_millis() as u64;
        let st = self.state.read().unwrap();
        self.notifiers
            .values()
            .filter(|si| {
                if st.finished.contains(&si.id) {
                    return false;
                }
                let last = st.last_update.get(&si.id).copied().unwrap_or(st.added_time);
                now.saturating_sub(last) > limit
            })
            .cloned()
            .collect()
    }

    pub fn mark_done(&self) {
        self.state.write().unwrap().end_time = LocalTime::mills();
    }

    /// Completion callback fires exactly once per listener lifetime.
    pub fn fire_callback(&self) {
        {
            let mut st = self.state.write().unwrap();
            if st.callback_fired {
                return;
            }
            st.callback_fired = true;
        }
        let cb = self.callback.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(self);
        }
    }

    pub fn to_snapshot(&self) -> NlSnapshot {
        let st = self.state.read().unwrap();
        NlSnapshot {
            uuid: self.uuid.clone(),
            kind: self.kind,
            buckets: self.buckets.clone(),
            owner: self.owner.clone(),
            notifiers: self
                .notifiers
                .values()
                .map(|si| si.as_ref().clone())
                .collect(),
            finished: st.finished.iter().cloned().collect(),
            aborted: st.aborted,
            err: st.err.clone(),
            added_time: st.added_time,
            end_time: st.end_time,
            stats: st.stats.clone(),
        }
    }

    /// Rebuild from a snapshot; `kind` comes from the envelope tag.
    pub fn from_snapshot(kind: NotifKind, snap: NlSnapshot) -> Self {
        let nl = NotifListener::new(
            snap.uuid,
            kind,
            snap.buckets,
            snap.notifiers.into_iter().map(Arc::new).collect(),
            snap.owner,
        );
        {
            let mut st = nl.state.write().unwrap();
            st.finished = snap.finished.into_iter().collect();
            st.aborted = snap.aborted;
            st.err = snap.err;
            st.added_time = snap.added_time;
            st.end_time = snap.end_time;
            st.stats = snap.stats;
        }
        nl
    }
}

impl Display for NotifListener {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "nl-{}[{}]", self.kind, self.uuid)
    }
}

/// Serialized listener form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlSnapshot {
    pub uuid: String,
    pub kind: NotifKind,
    pub buckets: Vec<String>,
    pub owner: String,
    pub notifiers: Vec<Snode>,
    pub finished: Vec<String>,
    pub aborted: bool,
    pub err: Option<String>,
    pub added_time: u64,
    pub end_time: u64,
    pub stats: HashMap<String, Value>,
}

/// Envelope entry: the kind tag rides outside the listener body so the
/// deserializer can pick the variant without inspecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlMsg {
    #[serde(rename = "type")]
    pub kind: NotifKind,
    pub nl: NlSnapshot,
}

/// Two-list persistence envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonNotifs {
    pub running: Vec<NlMsg>,
    pub finished: Vec<NlMsg>,
}
