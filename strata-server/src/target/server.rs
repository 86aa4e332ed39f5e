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

use crate::http::{ApiError, ApiResult};
use crate::target::{DownloadNotifier, Downloader, JobDb, ObjectStore};
use crate::transport::{SharedDataMover, Transport};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use strata_common::cluster::SmapOwner;
use strata_common::conf::ClusterConf;
use strata_common::state::{BucketEntry, DlAdminBody, DlBody, DlStatusResp};
use strata_common::{api, StoreError, StoreResult};

/// Cloud-bucket access contract: listing for prefetch admission plus the
/// source link objects are fetched from.
pub trait CloudBackend: Send + Sync {
    fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<BucketEntry>>;
}

/// One storage target: download executor, persisted job store, shared
/// data-mover, plus the internal REST surface the proxy drives.
pub struct TargetServer {
    pub node_id: String,
    conf: ClusterConf,
    pub smap: Arc<SmapOwner>,
    pub downloader: Arc<Downloader>,
    pub sdm: Arc<SharedDataMover>,
    cloud: Option<Arc<dyn CloudBackend>>,
}

impl TargetServer {
    pub fn new(
        conf: ClusterConf,
        node_id: impl Into<String>,
        smap: Arc<SmapOwner>,
        transport: Arc<dyn Transport>,
        cloud: Option<Arc<dyn CloudBackend>>,
    ) -> StoreResult<Arc<Self>> {
        let node_id = node_id.into();

        let store = Arc::new(ObjectStore::new(&conf.target.mountpaths)?);
        let db = Arc::new(JobDb::new(
            PathBuf::from(&conf.target.state_dir).join("jobs"),
        )?);
        let notifier = DownloadNotifier::new(&node_id, smap.clone());
        let downloader = Downloader::start(store, db, notifier, conf.download.clone());
        let sdm = SharedDataMover::new(transport);

        Ok(Arc::new(Self {
            node_id,
            conf,
            smap,
            downloader,
            sdm,
            cloud,
        }))
    }

    pub fn router(self: &Arc<Self>) -> Router {
        let download_path = api::join(&[api::DOWNLOAD]);
        let objects_path = format!("{}/:bucket", api::join(&[api::OBJECTS]));
        Router::new()
            .route(
                &download_path,
                post(download_handler)
                    .get(status_handler)
                    .delete(cancel_handler),
            )
            .route(&objects_path, get(list_objects_handler))
            .with_state(self.clone())
    }

    pub async fn serve(self: Arc<Self>) -> StoreResult<()> {
        let addr = format!("{}:{}", self.conf.target.hostname, self.conf.target.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("target {} listening on {}", self.node_id, addr);

        let router = self.router();
        let downloader = self.downloader.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down target");
                downloader.stop().await;
            })
            .await?;
        Ok(())
    }

    fn list_cloud_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<BucketEntry>> {
        match &self.cloud {
            Some(cloud) => cloud.list_objects(bucket, prefix),
            None => Err(StoreError::invalid_input(
                "no cloud backend configured on this target",
            )),
        }
    }
}

// POST /v1/download
async fn download_handler(
    State(ctx): State<Arc<TargetServer>>,
    Json(body): Json<DlBody>,
) -> ApiResult<String> {
    ctx.downloader.download(body).await.map_err(ApiError)?;
    Ok(String::new())
}

// GET /v1/download?id=...
async fn status_handler(
    State(ctx): State<Arc<TargetServer>>,
    Query(payload): Query<DlAdminBody>,
) -> ApiResult<Json<DlStatusResp>> {
    payload.validate().map_err(ApiError)?;
    let resp = ctx.downloader.status(&payload.id).await.map_err(ApiError)?;
    Ok(Json(resp))
}

// DELETE /v1/download?id=...
async fn cancel_handler(
    State(ctx): State<Arc<TargetServer>>,
    Query(payload): Query<DlAdminBody>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    let resp = ctx.downloader.cancel(&payload.id).await.map_err(ApiError)?;
    Ok(resp)
}

#[derive(serde::Deserialize, Default)]
#[serde(default)]
struct ListQuery {
    prefix: String,
}

// GET /v1/objects/{bucket}?prefix=...
async fn list_objects_handler(
    State(ctx): State<Arc<TargetServer>>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<BucketEntry>>> {
    let entries = ctx
        .list_cloud_objects(&bucket, &query.prefix)
        .map_err(ApiError)?;
    Ok(Json(entries))
}
