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

//! Proxy + target wired over real HTTP on ephemeral ports, driven through
//! the download client.

mod common;

use common::{spawn_file_server, wait_for};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strata_client::DownloadClient;
use strata_common::cluster::{Smap, SmapOwner, Snode, SnodeFlags};
use strata_common::conf::ClusterConf;
use strata_common::state::{DlMultiBody, DlRangeBody, DlSingleBody};
use strata_server::proxy::ProxyServer;
use strata_server::target::TargetServer;
use strata_server::transport::LoopbackHub;

struct Cluster {
    client: DownloadClient,
    proxy: Arc<ProxyServer>,
    _target: Arc<TargetServer>,
    _dir: tempfile::TempDir,
}

async fn spawn_cluster() -> Cluster {
    let dir = tempfile::tempdir().unwrap();

    let proxy_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr: SocketAddr = proxy_listener.local_addr().unwrap();
    let target_addr: SocketAddr = target_listener.local_addr().unwrap();

    let mut conf = ClusterConf::default();
    conf.target.mountpaths = vec![dir.path().join("mp0").to_string_lossy().into_owned()];
    conf.target.state_dir = dir.path().join("state").to_string_lossy().into_owned();
    conf.init().unwrap();

    let mut smap = Smap::new(1);
    smap.add_proxy(Snode::new(
        "p1",
        proxy_addr.to_string(),
        SnodeFlags {
            ic: true,
            ..Default::default()
        },
    ));
    smap.add_target(Snode::new("t1", target_addr.to_string(), SnodeFlags::default()));
    let smap = Arc::new(SmapOwner::new(smap));

    let proxy = ProxyServer::new(conf.clone(), "p1", smap.clone());
    proxy.start();

    let transport = LoopbackHub::new().transport("t1");
    let target = TargetServer::new(conf, "t1", smap, transport, None).unwrap();

    let proxy_router = proxy.router();
    tokio::spawn(async move {
        axum::serve(proxy_listener, proxy_router).await.unwrap();
    });
    let target_router = target.router();
    tokio::spawn(async move {
        axum::serve(target_listener, target_router).await.unwrap();
    });

    let client = DownloadClient::connect(format!("http://{}", proxy_addr)).unwrap();
    Cluster {
        client,
        proxy,
        _target: target,
        _dir: dir,
    }
}

async fn await_status(cluster: &Cluster, id: &str, want: &str) {
    let mut last = String::new();
    for _ in 0..400 {
        if let Ok(out) = cluster.client.status(id).await {
            if out == want {
                return;
            }
            last = out;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("status never reached {:?}, last seen {:?}", want, last);
}

#[tokio::test]
async fn test_single_url_scenario() {
    let mut files = HashMap::new();
    files.insert("a.bin".to_string(), b"cluster payload".to_vec());
    let files_addr = spawn_file_server(files).await;

    let cluster = spawn_cluster().await;

    let id = cluster
        .client
        .submit_single(&DlSingleBody {
            bucket: "bck".into(),
            link: format!("http://{}/data/a.bin", files_addr),
            objname: "a.bin".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!id.is_empty());

    await_status(
        &cluster,
        &id,
        "Status: [finished: 1, total: 1, pct: 100.000%]",
    )
    .await;

    // the finished notification moved the listener out of `running`
    let notifs = cluster.proxy.notifs.clone();
    let uuid = id.clone();
    wait_for("listener to finish", move || {
        notifs
            .entry(&uuid)
            .map(|nl| nl.finished())
            .unwrap_or(false)
    })
    .await;
    assert_eq!(cluster.proxy.notifs.running_count(), 0);
    assert_eq!(cluster.proxy.notifs.finished_count(), 1);
}

#[tokio::test]
async fn test_range_template_scenario() {
    let mut files = HashMap::new();
    for i in 1..=3 {
        files.insert(format!("img-00{}.jpg", i), vec![i as u8; 16]);
    }
    let files_addr = spawn_file_server(files).await;

    let cluster = spawn_cluster().await;

    let id = cluster
        .client
        .submit_range(&DlRangeBody {
            bucket: "bck".into(),
            base: format!("http://{}/data/", files_addr),
            template: "img-{001..003}.jpg".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    await_status(
        &cluster,
        &id,
        "Status: [finished: 3, total: 3, pct: 100.000%]",
    )
    .await;
}

#[tokio::test]
async fn test_multi_array_scenario() {
    let mut files = HashMap::new();
    files.insert("x.tgz".to_string(), b"xx".to_vec());
    files.insert("y.tgz".to_string(), b"yy".to_vec());
    let files_addr = spawn_file_server(files).await;

    let cluster = spawn_cluster().await;

    let links = serde_json::json!([
        format!("http://{}/data/x.tgz", files_addr),
        format!("http://{}/data/y.tgz", files_addr),
    ]);
    let id = cluster
        .client
        .submit_multi(
            &DlMultiBody {
                bucket: "bck".into(),
                ..Default::default()
            },
            &links,
        )
        .await
        .unwrap();

    await_status(
        &cluster,
        &id,
        "Status: [finished: 2, total: 2, pct: 100.000%]",
    )
    .await;
}

#[tokio::test]
async fn test_cancel_scenario() {
    let mut files = HashMap::new();
    files.insert("slow.bin".to_string(), vec![9u8; 200]);
    let files_addr = spawn_file_server(files).await;

    let cluster = spawn_cluster().await;

    let id = cluster
        .client
        .submit_single(&DlSingleBody {
            bucket: "bck".into(),
            link: format!("http://{}/slow/slow.bin", files_addr),
            objname: "slow.bin".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    // in flight: one pending object
    let mut admitted = false;
    for _ in 0..400 {
        if let Ok(out) = cluster.client.status(&id).await {
            if out.contains("total: 1") {
                admitted = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(admitted);

    let out = cluster.client.cancel(&id).await.unwrap();
    assert!(out.contains(&id));

    // the job is gone cluster-wide: every target replies not-found
    let mut not_found = false;
    for _ in 0..400 {
        match cluster.client.status(&id).await {
            Err(e) if e.http_status() == 404 => {
                not_found = true;
                break;
            }
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }
    assert!(not_found, "status after cancel must surface not-found");
}

#[tokio::test]
async fn test_invalid_admissions_rejected() {
    let cluster = spawn_cluster().await;

    // empty bucket
    let err = cluster
        .client
        .submit_single(&DlSingleBody {
            link: "http://x/a".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);

    // bad template
    let err = cluster
        .client
        .submit_range(&DlRangeBody {
            bucket: "bck".into(),
            base: "http://x/".into(),
            template: "no-braces".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);

    // link with no derivable object name
    let links = serde_json::json!(["http://x/"]);
    let err = cluster
        .client
        .submit_multi(
            &DlMultiBody {
                bucket: "bck".into(),
                ..Default::default()
            },
            &links,
        )
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
}
