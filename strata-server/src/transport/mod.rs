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

//! Multi-streaming transport: one long-lived flow carries many concurrent
//! job streams, demultiplexed at the receiver by job id.

mod shared_dm;
pub use self::shared_dm::SharedDataMover;

mod loopback;
pub use self::loopback::{LoopbackHub, LoopbackTransport};

use bytes::Bytes;
use std::io::Read;
use std::sync::Arc;
use strata_common::cluster::Snode;
use strata_common::StoreResult;

/// Legacy in-band separator between the job id and a job-private sub-header
/// inside `opaque`. New senders put the job id in [`RecordHdr::xact_id`].
pub const SEPA: u8 = b'|';

/// Framed record header. `xact_id` is the structured demux field; `opaque`
/// is job-private payload metadata.
#[derive(Debug, Clone, Default)]
pub struct RecordHdr {
    pub xact_id: String,
    pub obj_name: String,
    pub opaque: Bytes,
}

impl RecordHdr {
    pub fn new(xact_id: impl Into<String>, obj_name: impl Into<String>) -> Self {
        Self {
            xact_id: xact_id.into(),
            obj_name: obj_name.into(),
            opaque: Bytes::new(),
        }
    }

    pub fn with_opaque(mut self, opaque: Bytes) -> Self {
        self.opaque = opaque;
        self
    }

    /// Demux id plus the job-private remainder of `opaque`. Falls back to
    /// splitting a legacy `xid|subhdr` opaque when `xact_id` is empty.
    pub fn demux_id(&self) -> (String, Bytes) {
        if !self.xact_id.is_empty() {
            return (self.xact_id.clone(), self.opaque.clone());
        }
        match self.opaque.iter().position(|&b| b == SEPA) {
            Some(i) if i > 0 => (
                String::from_utf8_lossy(&self.opaque[..i]).into_owned(),
                self.opaque.slice(i + 1..),
            ),
            _ => (
                String::from_utf8_lossy(&self.opaque).into_owned(),
                Bytes::new(),
            ),
        }
    }
}

/// Receive callback: runs on the transport's receive context and must not
/// re-enter registration calls.
pub type RecvFn = Arc<dyn Fn(&RecordHdr, &mut dyn Read) -> StoreResult<()> + Send + Sync>;

/// Contract of the underlying wire library: a single attached endpoint per
/// transport, plus framed sends addressed by node.
pub trait Transport: Send + Sync {
    fn attach(&self, recv: RecvFn) -> StoreResult<()>;
    fn detach(&self);
    fn send(&self, hdr: RecordHdr, payload: Bytes, target: &Snode) -> StoreResult<()>;
}
