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
use log::{info, warn};
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use strata_common::cluster::Snode;
use strata_common::{err_box, StoreResult};

const TRNAME: &str = "shared-dm";

/// Shared data-mover: one long-lived transport over which concurrent jobs
/// interleave objects, demultiplexed by job id at the receiver.
///
/// Explicitly constructed service; callers hold the handle. Lock order is
/// always open/close mutex first, receiver-table mutex second.
pub struct SharedDataMover {
    transport: Arc<dyn Transport>,
    opened: AtomicBool,
    ocmu: Mutex<()>,
    rxcbs: Mutex<HashMap<String, RecvFn>>,
}

impl SharedDataMover {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            opened: AtomicBool::new(false),
            ocmu: Mutex::new(()),
            rxcbs: Mutex::new(HashMap::new()),
        })
    }

    pub fn trname(&self) -> &'static str {
        TRNAME
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// True while any receiver remains registered.
    pub fn is_active(&self) -> bool {
        !self.rxcbs.lock().unwrap().is_empty()
    }

    /// Idempotent; attaches the demux endpoint to the transport.
    pub fn open(self: &Arc<Self>) -> StoreResult<()> {
        if self.is_open() {
            warn!("{} is already open", self.trname());
            return Ok(());
        }
        let _g = self.ocmu.lock().unwrap();
        if self.is_open() {
            warn!("{} is already open", self.trname());
            return Ok(());
        }

        self.rxcbs.lock().unwrap().clear();

        let me = self.clone();
        self.transport
            .attach(Arc::new(move |hdr, reader| me.recv(hdr, reader)))?;
        self.opened.store(true, Ordering::Release);

        info!("open {}", self.trname());
        Ok(())
    }

    /// Refused while any receiver is registered; the error names one of the
    /// still-registered job ids.
    pub fn close(&self) -> StoreResult<()> {
        if !self.is_open() {
            return Ok(());
        }
        let _g = self.ocmu.lock().unwrap();
        if !self.is_open() {
            return Ok(());
        }

        {
            let rxcbs = self.rxcbs.lock().unwrap();
            if let Some(xid) = rxcbs.keys().next() {
                return err_box!(
                    "cannot close {}: [{}, {}]",
                    self.trname(),
                    xid,
                    rxcbs.len()
                );
            }
        }

        self.opened.store(false, Ordering::Release);
        self.transport.detach();

        info!("close {}", self.trname());
        Ok(())
    }

    /// At most one active registration per job id.
    pub fn reg_recv(&self, xid: impl Into<String>, cb: RecvFn) -> StoreResult<()> {
        let xid = xid.into();
        let _g = self.ocmu.lock().unwrap();
        if !self.is_open() {
            return err_box!("{} is closed, cannot register {}", self.trname(), xid);
        }
        let mut rxcbs = self.rxcbs.lock().unwrap();
        if rxcbs.contains_key(&xid) {
            return err_box!("{}: receiver {} already registered", self.trname(), xid);
        }
        rxcbs.insert(xid, cb);
        Ok(())
    }

    pub fn unreg_recv(&self, xid: &str) -> StoreResult<()> {
        let _g = self.ocmu.lock().unwrap();
        if !self.is_open() {
            return err_box!("{} is closed, cannot unregister {}", self.trname(), xid);
        }
        self.rxcbs.lock().unwrap().remove(xid);
        Ok(())
    }

    pub fn send(&self, hdr: RecordHdr, payload: Bytes, tsi: &Snode) -> StoreResult<()> {
        self.transport.send(hdr, payload, tsi)
    }

    /// Inbound demux. Unknown job id or a closed mover drops the record with
    /// a descriptive error; never blocks, never panics.
    fn recv(&self, hdr: &RecordHdr, reader: &mut dyn Read) -> StoreResult<()> {
        let (xid, opaque) = hdr.demux_id();
        if xid.is_empty() {
            return err_box!("{}: record without a job id [oname: {}]", self.trname(), hdr.obj_name);
        }

        let cb = {
            let rxcbs = self.rxcbs.lock().unwrap();
            if !self.is_open() {
                return err_box!(
                    "{} is closed, dropping recv [xid: {}, oname: {}]",
                    self.trname(),
                    xid,
                    hdr.obj_name
                );
            }
            rxcbs.get(&xid).cloned()
        };

        match cb {
            Some(cb) => {
                let demuxed = RecordHdr {
                    xact_id: xid,
                    obj_name: hdr.obj_name.clone(),
                    opaque,
                };
                cb(&demuxed, reader)
            }
            None => err_box!(
                "{}: xid {} not found, dropping recv [oname: {}]",
                self.trname(),
                xid,
                hdr.obj_name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackHub;
    use strata_common::cluster::SnodeFlags;
    use std::sync::atomic::AtomicUsize;

    fn new_pair() -> (Arc<SharedDataMover>, Arc<SharedDataMover>, Snode, Snode) {
        let hub = LoopbackHub::new();
        let t1 = Snode::new("t1", "127.0.0.1:9001", SnodeFlags::default());
        let t2 = Snode::new("t2", "127.0.0.1:9002", SnodeFlags::default());
        let sdm1 = SharedDataMover::new(hub.transport("t1"));
        let sdm2 = SharedDataMover::new(hub.transport("t2"));
        (sdm1, sdm2, t1, t2)
    }

    fn record(xid: &str, oname: &str) -> RecordHdr {
        RecordHdr::new(xid, oname)
    }

    #[test]
    fn test_open_idempotent_and_roundtrip() {
        let (sdm1, sdm2, _t1, t2) = new_pair();
        sdm1.open().unwrap();
        sdm1.open().unwrap();
        sdm2.open().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let got = hits.clone();
        sdm2.reg_recv(
            "job-1",
            Arc::new(move |hdr, reader| {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).unwrap();
                assert_eq!(hdr.xact_id, "job-1");
                assert_eq!(buf, b"payload");
                got.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

        sdm1.send(record("job-1", "obj-a"), Bytes::from_static(b"payload"), &t2)
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // unknown job id is a descriptive error, not a panic
        let err = sdm1
            .send(record("job-x", "obj-b"), Bytes::new(), &t2)
            .unwrap_err();
        assert!(err.to_string().contains("job-x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_delivery_after_unreg() {
        let (sdm1, sdm2, _t1, t2) = new_pair();
        sdm1.open().unwrap();
        sdm2.open().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let got = hits.clone();
        sdm2.reg_recv(
            "job-1",
            Arc::new(move |_, _| {
                got.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
        sdm2.unreg_recv("job-1").unwrap();

        assert!(sdm1
            .send(record("job-1", "obj"), Bytes::new(), &t2)
            .is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_refused_while_registered() {
        let (_sdm1, sdm2, _t1, _t2) = new_pair();
        sdm2.open().unwrap();
        sdm2.reg_recv("job-7", Arc::new(|_, _| Ok(()))).unwrap();

        let err = sdm2.close().unwrap_err();
        assert!(err.to_string().contains("job-7"));
        assert!(sdm2.is_open());
        assert!(sdm2.is_active());

        sdm2.unreg_recv("job-7").unwrap();
        sdm2.close().unwrap();
        assert!(!sdm2.is_open());

        // closing twice is a no-op
        sdm2.close().unwrap();
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (sdm1, _sdm2, _t1, _t2) = new_pair();
        sdm1.open().unwrap();
        sdm1.reg_recv("job-1", Arc::new(|_, _| Ok(()))).unwrap();
        assert!(sdm1.reg_recv("job-1", Arc::new(|_, _| Ok(()))).is_err());
    }

    #[test]
    fn test_reg_requires_open() {
        let (sdm1, _sdm2, _t1, _t2) = new_pair();
        assert!(sdm1.reg_recv("job-1", Arc::new(|_, _| Ok(()))).is_err());
    }

    #[test]
    fn test_legacy_separator_demux() {
        let (sdm1, sdm2, _t1, t2) = new_pair();
        sdm1.open().unwrap();
        sdm2.open().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = seen.clone();
        sdm2.reg_recv(
            "job-9",
            Arc::new(move |hdr, _| {
                sub.lock().unwrap().push(hdr.opaque.clone());
                Ok(())
            }),
        )
        .unwrap();

        let legacy = RecordHdr::new("", "obj").with_opaque(Bytes::from_static(b"job-9|subhdr"));
        sdm1.send(legacy, Bytes::new(), &t2).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0][..], b"subhdr");
    }
}
