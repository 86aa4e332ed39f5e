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
use crate::proxy::notif::NotifHub;
use crate::proxy::IntraClient;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, info};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use strata_common::cluster::SmapOwner;
use strata_common::conf::ClusterConf;
use strata_common::state::{
    objname_from_link, DlAdminBody, DlBucketBody, DlMultiBody, DlRangeBody, DlSingleBody,
    NotifKind, NotifMsg, Provider,
};
use strata_common::utils::BashTemplate;
use strata_common::{api, StoreError, StoreResult};
use uuid::Uuid;

/// One proxy: download admission and admin fan-out plus the notification
/// fabric of the jobs it owns.
pub struct ProxyServer {
    pub node_id: String,
    conf: ClusterConf,
    pub smap: Arc<SmapOwner>,
    pub notifs: Arc<NotifHub>,
    pub(crate) intra: IntraClient,
}

impl ProxyServer {
    pub fn new(
        conf: ClusterConf,
        node_id: impl Into<String>,
        smap: Arc<SmapOwner>,
    ) -> Arc<Self> {
        let node_id = node_id.into();
        let notifs = NotifHub::new(&node_id, conf.notify.clone());
        let intra = IntraClient::new(&node_id, conf.proxy.broadcast_timeout);
        Arc::new(Self {
            node_id,
            conf,
            smap,
            notifs,
            intra,
        })
    }

    /// Wire the notification fabric into the cluster-map owner and start
    /// its housekeeping.
    pub fn start(self: &Arc<Self>) {
        self.notifs.start(&self.smap);
    }

    pub fn router(self: &Arc<Self>) -> Router {
        let dl = api::join(&[api::DOWNLOAD]);
        Router::new()
            .route(
                &format!("{}/{}", dl, api::DOWNLOAD_SINGLE),
                post(single_download_handler),
            )
            .route(
                &format!("{}/{}", dl, api::DOWNLOAD_RANGE),
                post(range_download_handler),
            )
            .route(
                &format!("{}/{}", dl, api::DOWNLOAD_MULTI),
                post(multi_download_handler),
            )
            .route(
                &format!("{}/{}/:bucket", dl, api::DOWNLOAD_BUCKET),
                post(bucket_download_handler),
            )
            .route(&dl, get(status_handler).delete(cancel_handler))
            .route(
                &format!("{}/:kind", api::join(&[api::NOTIFS])),
                post(notifs_handler),
            )
            .with_state(self.clone())
    }

    pub async fn serve(self: Arc<Self>) -> StoreResult<()> {
        let addr = format!("{}:{}", self.conf.proxy.hostname, self.conf.proxy.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("proxy {} listening on {}", self.node_id, addr);

        let notifs = self.notifs.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down proxy");
                notifs.shutdown();
            })
            .await?;
        Ok(())
    }

    fn new_job_id() -> String {
        Uuid::new_v4().to_string()
    }
}

// POST /v1/download/single?bucket=...&link=...&objname=...
async fn single_download_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Query(mut payload): Query<DlSingleBody>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    debug!("single download payload {:?}", payload);

    let id = ProxyServer::new_job_id();
    let mut objects = HashMap::new();
    objects.insert(payload.objname.clone(), payload.link.clone());

    ctx.bulk_download(
        &id,
        &payload.bucket,
        payload.provider,
        payload.timeout.clone(),
        objects,
        NotifKind::DownloadSingle,
    )
    .await
    .map_err(ApiError)?;
    Ok(id)
}

// POST /v1/download/range?bucket=...&base=...&template=...
async fn range_download_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Query(payload): Query<DlRangeBody>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    debug!("range download payload {:?}", payload);

    let template = BashTemplate::parse(&payload.template).map_err(ApiError)?;
    let id = ProxyServer::new_job_id();

    let mut objects = HashMap::new();
    for objname in template.iter() {
        objects.insert(objname.clone(), format!("{}{}", payload.base, objname));
    }

    ctx.bulk_download(
        &id,
        &payload.bucket,
        payload.provider,
        payload.timeout.clone(),
        objects,
        NotifKind::DownloadRange,
    )
    .await
    .map_err(ApiError)?;
    Ok(id)
}

// POST /v1/download/multi?bucket=... with a map or array body
async fn multi_download_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Query(payload): Query<DlMultiBody>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    debug!("multi download payload {:?}", payload);

    let objects = multi_objects(&body).map_err(ApiError)?;
    let id = ProxyServer::new_job_id();

    ctx.bulk_download(
        &id,
        &payload.bucket,
        payload.provider,
        payload.timeout.clone(),
        objects,
        NotifKind::DownloadMulti,
    )
    .await
    .map_err(ApiError)?;
    Ok(id)
}

// POST /v1/download/bucket/{name}?provider=cloud&prefix=...&suffix=...
async fn bucket_download_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Path(bucket): Path<String>,
    Query(payload): Query<DlBucketBody>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    debug!("bucket download of {:?}, payload {:?}", bucket, payload);

    let id = ProxyServer::new_job_id();
    let entries = ctx
        .list_cloud_bucket(&id, &bucket, &payload)
        .await
        .map_err(ApiError)?;

    let mut objects = HashMap::new();
    for entry in entries {
        objects.insert(entry.name, entry.link);
    }
    if objects.is_empty() {
        return Err(ApiError(StoreError::invalid_input(format!(
            "no objects matching prefix {:?} suffix {:?} in bucket {:?}",
            payload.prefix, payload.suffix, bucket
        ))));
    }

    ctx.bulk_download(
        &id,
        &bucket,
        Provider::Cloud,
        None,
        objects,
        NotifKind::DownloadCloud,
    )
    .await
    .map_err(ApiError)?;
    Ok(id)
}

// GET /v1/download?id=...
async fn status_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Query(payload): Query<DlAdminBody>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    let out = ctx
        .broadcast_admin(Method::GET, &payload.id)
        .await
        .map_err(ApiError)?;
    Ok(out)
}

// DELETE /v1/download?id=...
async fn cancel_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Query(payload): Query<DlAdminBody>,
) -> ApiResult<String> {
    payload.validate().map_err(ApiError)?;
    let out = ctx
        .broadcast_admin(Method::DELETE, &payload.id)
        .await
        .map_err(ApiError)?;
    Ok(out)
}

// POST /v1/notifs/{progress|finished}
async fn notifs_handler(
    State(ctx): State<Arc<ProxyServer>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(msg): Json<NotifMsg>,
) -> ApiResult<String> {
    let caller = headers
        .get(api::HEADER_CALLER_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ctx.notifs
        .handle_msg(&kind, &caller, msg)
        .await
        .map_err(ApiError)?;
    Ok(String::new())
}

/// A multi body is either an `{objname: link}` map or a `[link]` array with
/// names derived from URL basenames.
fn multi_objects(body: &serde_json::Value) -> StoreResult<HashMap<String, String>> {
    let mut objects = HashMap::new();
    match body {
        serde_json::Value::Object(map) => {
            for (objname, link) in map {
                match link.as_str() {
                    Some(link) => {
                        objects.insert(objname.clone(), link.to_string());
                    }
                    None => {
                        return Err(StoreError::invalid_input(format!(
                            "values in map should be strings, found: {}",
                            link
                        )))
                    }
                }
            }
        }
        serde_json::Value::Array(links) => {
            for link in links {
                let link = link.as_str().ok_or_else(|| {
                    StoreError::invalid_input(format!(
                        "values in array should be strings, found: {}",
                        link
                    ))
                })?;
                let objname = objname_from_link(link)?;
                objects.insert(objname, link.to_string());
            }
        }
        other => {
            return Err(StoreError::invalid_input(format!(
                "JSON body should be a map (objname -> link) or an array of links, found: {}",
                other
            )))
        }
    }
    if objects.is_empty() {
        return Err(StoreError::invalid_input("no objects to download"));
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_objects_map() {
        let body = serde_json::json!({"a": "http://x/1", "b": "http://x/2"});
        let objects = multi_objects(&body).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects["a"], "http://x/1");
    }

    #[test]
    fn test_multi_objects_array_derives_names() {
        let body = serde_json::json!(["http://x/data/a.tgz", "http://x/b.tgz"]);
        let objects = multi_objects(&body).unwrap();
        assert_eq!(objects["a.tgz"], "http://x/data/a.tgz");
        assert_eq!(objects["b.tgz"], "http://x/b.tgz");
    }

    #[test]
    fn test_multi_objects_bad_inputs() {
        assert!(multi_objects(&serde_json::json!(["http://x/"])).is_err());
        assert!(multi_objects(&serde_json::json!({"a": 1})).is_err());
        assert!(multi_objects(&serde_json::json!("nope")).is_err());
        assert!(multi_objects(&serde_json::json!([])).is_err());
    }
}
