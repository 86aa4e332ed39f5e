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

mod common;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_common::cluster::{Smap, SmapOwner, Snode, SnodeFlags};
use strata_common::conf::NotifyConf;
use strata_common::state::{NotifKind, NotifMsg, NotifStats};
use strata_server::proxy::notif::{NlFilter, NotifHub, NotifListener};

fn target(id: &str) -> Arc<Snode> {
    Arc::new(Snode::new(id, "127.0.0.1:1", SnodeFlags::default()))
}

fn conf() -> NotifyConf {
    let mut conf = NotifyConf::default();
    conf.init().unwrap();
    conf
}

fn new_listener(
    uuid: &str,
    notifiers: Vec<Arc<Snode>>,
) -> (Arc<NotifListener>, Arc<AtomicUsize>) {
    let nl = Arc::new(NotifListener::new(
        uuid,
        NotifKind::DownloadSingle,
        vec!["bck".to_string()],
        notifiers,
        "p1",
    ));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    nl.set_callback(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    (nl, fired)
}

fn finished_msg(uuid: &str, aborted: bool) -> NotifMsg {
    let stats = NotifStats {
        finished: true,
        aborted,
        objs_done: 1,
        objs_total: 1,
        bytes: 10,
    };
    NotifMsg::new(uuid, &stats, "")
}

#[tokio::test]
async fn test_progress_and_finish_flow() {
    let hub = NotifHub::new("p1", conf());
    let (nl, fired) = new_listener("u-1", vec![target("t1"), target("t2")]);
    hub.add(nl.clone()).unwrap();
    assert_eq!(hub.running_count(), 1);

    // progress only records stats
    let stats = NotifStats {
        objs_done: 1,
        objs_total: 2,
        ..Default::default()
    };
    hub.handle_msg("progress", "t1", NotifMsg::new("u-1", &stats, ""))
        .await
        .unwrap();
    assert!(!nl.finished());
    assert!(nl.stats().contains_key("t1"));

    // one of two notifiers finishing does not complete the listener
    hub.handle_msg("finished", "t1", finished_msg("u-1", false))
        .await
        .unwrap();
    assert!(!nl.finished());
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // the second one does: running -> finished, callback fires once
    hub.handle_msg("finished", "t2", finished_msg("u-1", false))
        .await
        .unwrap();
    assert!(nl.finished());
    assert_eq!(hub.running_count(), 0);
    assert_eq!(hub.finished_count(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // still reachable by uuid after completion
    assert!(hub.entry("u-1").is_some());
}

#[tokio::test]
async fn test_duplicate_finished_is_silent() {
    let hub = NotifHub::new("p1", conf());
    let (nl, fired) = new_listener("u-2", vec![target("t1"), target("t2")]);
    hub.add(nl.clone()).unwrap();

    hub.handle_msg("finished", "t1", finished_msg("u-2", false))
        .await
        .unwrap();
    let stats_before = nl.stats();

    // same (uuid, caller) finished message again: ignored outright
    hub.handle_msg("finished", "t1", finished_msg("u-2", true))
        .await
        .unwrap();
    assert!(!nl.aborted());
    assert_eq!(nl.stats().len(), stats_before.len());
    assert!(!nl.finished());
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_uuid_and_notifier_are_benign() {
    let hub = NotifHub::new("p1", conf());
    // unknown uuid: silent success
    hub.handle_msg("finished", "t1", finished_msg("nope", false))
        .await
        .unwrap();

    let (nl, _) = new_listener("u-3", vec![target("t1")]);
    hub.add(nl.clone()).unwrap();

    // a caller outside the notifier set is dropped
    hub.handle_msg("finished", "t9", finished_msg("u-3", false))
        .await
        .unwrap();
    assert!(!nl.has_finished("t9"));
    assert!(!nl.finished());

    // bad route is a caller error though
    assert!(hub
        .handle_msg("started", "t1", finished_msg("u-3", false))
        .await
        .is_err());
}

#[tokio::test]
async fn test_abort_completes_and_synthesizes_error() {
    let hub = NotifHub::new("p1", conf());
    let (nl, fired) = new_listener("u-4", vec![target("t1"), target("t2")]);
    hub.add(nl.clone()).unwrap();

    // an aborted notifier completes the listener even with one report
    hub.handle_msg("finished", "t1", finished_msg("u-4", true))
        .await
        .unwrap();

    assert!(nl.finished());
    assert!(nl.aborted());
    let err = nl.err().expect("abort must leave an error");
    assert!(err.contains("abort"));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(hub.running_count(), 0);
}

#[tokio::test]
async fn test_add_requires_uuid_and_is_idempotent() {
    let hub = NotifHub::new("p1", conf());
    let (nl, _) = new_listener("", vec![target("t1")]);
    assert!(hub.add(nl).is_err());

    let (nl, _) = new_listener("u-5", vec![target("t1")]);
    hub.add(nl.clone()).unwrap();
    hub.add(nl).unwrap();
    assert_eq!(hub.running_count(), 1);
}

#[tokio::test]
async fn test_find_by_filter() {
    let hub = NotifHub::new("p1", conf());
    let (nl, _) = new_listener("u-6", vec![target("t1")]);
    hub.add(nl).unwrap();

    // exact uuid
    let flt = NlFilter {
        id: Some("u-6".into()),
        ..Default::default()
    };
    assert!(hub.find(&flt).is_some());

    // kind without bucket query
    let flt = NlFilter {
        kind: Some(NotifKind::DownloadSingle),
        ..Default::default()
    };
    assert_eq!(hub.find(&flt).unwrap().uuid(), "u-6");

    // kind with a matching bucket query
    let flt = NlFilter {
        kind: Some(NotifKind::DownloadSingle),
        buckets: Some(vec!["bck".into(), "other".into()]),
        ..Default::default()
    };
    assert!(hub.find(&flt).is_some());

    // wrong kind
    let flt = NlFilter {
        kind: Some(NotifKind::Xaction),
        ..Default::default()
    };
    assert!(hub.find(&flt).is_none());

    // bucket mismatch
    let flt = NlFilter {
        kind: Some(NotifKind::DownloadSingle),
        buckets: Some(vec!["else".into()]),
        ..Default::default()
    };
    assert!(hub.find(&flt).is_none());
}

#[tokio::test]
async fn test_serialize_roundtrip_and_merge() {
    let hub = NotifHub::new("p1", conf());

    let (running, _) = new_listener("u-run", vec![target("t1")]);
    hub.add(running).unwrap();

    let (fin, _) = new_listener("u-fin", vec![target("t1")]);
    hub.add(fin).unwrap();
    hub.handle_msg("finished", "t1", finished_msg("u-fin", false))
        .await
        .unwrap();

    let added_before = hub.entry("u-run").unwrap().added_time();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let blob = hub.marshal().unwrap();

    // deserialize into a fresh hub: same uuids and kinds, added times refreshed
    let other = NotifHub::new("p2", conf());
    other.unmarshal(&blob).unwrap();
    assert_eq!(other.running_count(), 1);
    assert_eq!(other.finished_count(), 1);

    let nl = other.entry("u-run").unwrap();
    assert_eq!(nl.kind(), NotifKind::DownloadSingle);
    assert!(nl.added_time() > added_before);
    assert!(other.entry("u-fin").unwrap().finished());

    // merging the same envelope again drops already-present uuids
    other.unmarshal(&blob).unwrap();
    assert_eq!(other.running_count(), 1);
    assert_eq!(other.finished_count(), 1);
}

#[tokio::test]
async fn test_smap_change_aborts_orphaned_listener() {
    let mut smap = Smap::new(1);
    smap.add_target(Snode::new("t1", "127.0.0.1:1", SnodeFlags::default()));
    smap.add_target(Snode::new("t2", "127.0.0.1:2", SnodeFlags::default()));
    let t1 = smap.tmap.get("t1").unwrap().clone();
    let t2 = smap.tmap.get("t2").unwrap().clone();
    let owner = Arc::new(SmapOwner::new(smap));

    let hub = NotifHub::new("p1", conf());
    owner.reg_listener(hub.clone());

    let (nl, fired) = new_listener("u-7", vec![t1.clone(), t2]);
    hub.add(nl.clone()).unwrap();

    // t2 disappears from the map
    let mut next = Smap::new(2);
    next.add_target(t1.as_ref().clone());
    owner.put(next).unwrap();

    assert!(nl.finished());
    assert!(nl.aborted());
    assert!(nl.err().unwrap().contains("t2"));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(hub.running_count(), 0);
    assert_eq!(hub.finished_count(), 1);

    // a stale map version is ignored
    let mut stale = Smap::new(2);
    stale.add_target(t1.as_ref().clone());
    assert!(owner.put(stale).is_err());
}

#[tokio::test]
async fn test_housekeeping_pull_interprets_404_as_all_done() {
    // stub target replying 404 to every status pull
    let app = Router::new().route(
        "/v1/download",
        get(|| async { (StatusCode::NOT_FOUND, "download job has not been found") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut conf = NotifyConf {
        progress_interval_str: "0s".to_string(),
        ..Default::default()
    };
    conf.init().unwrap();

    let hub = NotifHub::new("p1", conf);
    let stub = Arc::new(Snode::new("t1", addr.to_string(), SnodeFlags::default()));
    let (nl, fired) = new_listener("u-8", vec![stub]);
    hub.add(nl.clone()).unwrap();

    // let the notifier become tardy relative to the zero progress interval
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    hub.housekeep().await;

    assert!(nl.finished());
    assert!(nl.err().unwrap().contains("not found"));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(hub.running_count(), 0);
}
