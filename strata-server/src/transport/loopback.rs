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

use crate::transport::{RecordHdr, RecvFn, Transport};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use strata_common::cluster::Snode;
use strata_common::{err_box, StoreResult};

/// In-process transport: every node attaches one endpoint to the hub and
/// sends are delivered inline on the caller's thread. Stands in for the wire
/// library in single-process deployments and tests.
#[derive(Default)]
pub struct LoopbackHub {
    endpoints: Mutex<HashMap<String, RecvFn>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transport(self: &Arc<Self>, node_id: impl Into<String>) -> Arc<LoopbackTransport> {
        Arc::new(LoopbackTransport {
            node_id: node_id.into(),
            hub: self.clone(),
        })
    }
}

pub struct LoopbackTransport {
    node_id: String,
    hub: Arc<LoopbackHub>,
}

impl Transport for LoopbackTransport {
    fn attach(&self, recv: RecvFn) -> StoreResult<()> {
        let mut endpoints = self.hub.endpoints.lock().unwrap();
        if endpoints.contains_key(&self.node_id) {
            return err_box!("transport endpoint {} already attached", self.node_id);
        }
        endpoints.insert(self.node_id.clone(), recv);
        Ok(())
    }

    fn detach(&self) {
        self.hub.endpoints.lock().unwrap().remove(&self.node_id);
    }

    fn send(&self, hdr: RecordHdr, payload: Bytes, target: &Snode) -> StoreResult<()> {
        let recv = {
            let endpoints = self.hub.endpoints.lock().unwrap();
            endpoints.get(&target.id).cloned()
        };
        match recv {
            Some(recv) => {
                let mut reader = Cursor::new(payload);
                recv(&hdr, &mut reader)
            }
            None => err_box!("transport endpoint {} not attached", target.id),
        }
    }
}
