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

//! Proxy download coordinator: shards admitted jobs across targets by HRW
//! and aggregates admin fan-out replies.

use crate::proxy::notif::{NlCallback, NotifListener};
use crate::proxy::{DlResponse, ProxyServer};
use log::{error, info};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use strata_common::cluster::Snode;
use strata_common::state::{BucketEntry, DlBody, DlBucketBody, DlObj, DlStatusResp, NotifKind, Provider};
use strata_common::utils::SerdeUtils;
use strata_common::{api, err_box, StoreError, StoreResult};

impl ProxyServer {
    /// Shard `(object -> link)` pairs by HRW and POST one sub-list per
    /// target. There is no two-phase commit: on a per-target failure the
    /// error is returned and the caller is expected to cancel.
    pub(crate) async fn bulk_download(
        &self,
        id: &str,
        bucket: &str,
        provider: Provider,
        timeout: Option<String>,
        objects: HashMap<String, String>,
        kind: NotifKind,
    ) -> StoreResult<()> {
        let smap = self.smap.get();

        let mut per_target: HashMap<String, (Arc<Snode>, DlBody)> = HashMap::new();
        for (objname, link) in objects {
            let uname = format!("{}/{}", bucket, objname);
            let si = smap.hrw_target(&uname, true)?;
            let entry = per_target.entry(si.id.clone()).or_insert_with(|| {
                let body = DlBody {
                    id: id.to_string(),
                    bucket: bucket.to_string(),
                    provider,
                    timeout: timeout.clone(),
                    owner: self.node_id.clone(),
                    ..Default::default()
                };
                (si.clone(), body)
            });
            entry.1.objs.push(DlObj { objname, link });
        }

        // the listener goes in before the fan-out so that notifications
        // racing the admission still find it
        let notifiers: Vec<Arc<Snode>> = per_target.values().map(|(si, _)| si.clone()).collect();
        let nl = Arc::new(NotifListener::new(
            id,
            kind,
            vec![bucket.to_string()],
            notifiers,
            &self.node_id,
        ));
        nl.set_callback(completion_logger());
        self.notifs.add(nl)?;

        let path = api::join(&[api::DOWNLOAD]);
        let futs = per_target.into_values().map(|(si, body)| {
            let path = path.clone();
            let intra = &self.intra;
            async move {
                let resp = intra
                    .request(Method::POST, &si, &path, &[], Some(&body))
                    .await;
                (si, resp)
            }
        });

        let mut failures = Vec::new();
        for (si, resp) in futures::future::join_all(futs).await {
            if let Some(err) = resp.err {
                error!("download dispatch to {} failed: {}", si, err);
                failures.push(format!("{}: {}", si, err));
            }
        }
        if !failures.is_empty() {
            return err_box!("following downloads failed: {:?}", failures);
        }
        info!("admitted download job {} into bucket {:?}", id, bucket);
        Ok(())
    }

    /// Broadcast status (GET) or cancel (DELETE) to every target and merge
    /// the replies.
    pub(crate) async fn broadcast_admin(&self, method: Method, id: &str) -> StoreResult<String> {
        let smap = self.smap.get();
        if smap.count_targets() == 0 {
            return Err(StoreError::NoNodes {
                kind: "target",
                required: 1,
                available: 0,
            });
        }

        let path = api::join(&[api::DOWNLOAD]);
        let futs = smap.tmap.values().map(|si| {
            let si = si.clone();
            let method = method.clone();
            let path = path.clone();
            async move {
                self.intra
                    .request::<()>(method, &si, &path, &[(api::PARAM_ID, id)], None)
                    .await
            }
        });
        let responses = futures::future::join_all(futs).await;

        aggregate_admin(method, responses)
    }

    /// Enumerate the cloud bucket through the one target the job id hashes
    /// to, then filter by suffix.
    pub(crate) async fn list_cloud_bucket(
        &self,
        id: &str,
        bucket: &str,
        payload: &DlBucketBody,
    ) -> StoreResult<Vec<BucketEntry>> {
        let smap = self.smap.get();
        let si = smap.hrw_target_task(id)?;

        let path = format!("{}/{}", api::join(&[api::OBJECTS]), bucket);
        let resp = self
            .intra
            .request::<()>(
                Method::GET,
                &si,
                &path,
                &[("prefix", payload.prefix.as_str())],
                None,
            )
            .await;
        if let Some(err) = resp.err {
            return Err(err);
        }

        let entries: Vec<BucketEntry> = SerdeUtils::from_json(resp.body.as_bytes())?;
        Ok(entries
            .into_iter()
            .filter(|e| e.name.ends_with(&payload.suffix))
            .collect())
    }
}

fn completion_logger() -> NlCallback {
    Arc::new(|nl: &NotifListener| match nl.err() {
        Some(err) => info!("{} finished with error: {}", nl, err),
        None => info!("{} finished", nl),
    })
}

/// Merge fan-out replies. 404 is a benign "not known" unless every target
/// replied with it, in which case the first error is surfaced unchanged;
/// any other >= 400 wins outright. GET sums the valid statuses; DELETE
/// passes the first valid body through.
pub(crate) fn aggregate_admin(
    method: Method,
    responses: Vec<DlResponse>,
) -> StoreResult<String> {
    let mut not_found_cnt = 0;
    let mut first_not_found: Option<StoreError> = None;
    let mut first_err: Option<StoreError> = None;
    let mut valid = Vec::new();

    let total = responses.len();
    for resp in responses {
        if resp.status == 404 {
            not_found_cnt += 1;
            if first_not_found.is_none() {
                first_not_found = resp.err;
            }
        } else if let Some(err) = resp.err {
            if first_err.is_none() {
                first_err = Some(err);
            }
        } else {
            valid.push(resp);
        }
    }

    if not_found_cnt == total {
        // all targets replied 404: surface the first one unchanged
        return Err(first_not_found
            .unwrap_or_else(|| StoreError::from_remote(404, "not found")));
    }
    if let Some(err) = first_err {
        return Err(err);
    }

    if method == Method::GET {
        let mut finished = 0usize;
        let mut total_objs = 0usize;
        for resp in &valid {
            let status: DlStatusResp = SerdeUtils::from_json(resp.body.as_bytes())?;
            finished += status.finished;
            total_objs += status.total;
        }
        let pct = if total_objs == 0 {
            0.0
        } else {
            finished as f64 / total_objs as f64 * 100.0
        };
        Ok(format!(
            "Status: [finished: {}, total: {}, pct: {:.3}%]",
            finished, total_objs, pct
        ))
    } else if method == Method::DELETE {
        Ok(valid
            .into_iter()
            .next()
            .map(|resp| resp.body)
            .unwrap_or_default())
    } else {
        err_box!("unsupported admin method {}", method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> DlResponse {
        DlResponse {
            body: body.to_string(),
            status: 200,
            err: None,
        }
    }

    fn not_found(msg: &str) -> DlResponse {
        DlResponse {
            body: msg.to_string(),
            status: 404,
            err: Some(StoreError::from_remote(404, msg)),
        }
    }

    fn server_err(msg: &str) -> DlResponse {
        DlResponse {
            body: msg.to_string(),
            status: 500,
            err: Some(StoreError::from_remote(500, msg)),
        }
    }

    fn status_body(finished: usize, total: usize) -> String {
        serde_json::to_string(&DlStatusResp {
            finished,
            total,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_get_sums_valid_replies() {
        let out = aggregate_admin(
            Method::GET,
            vec![
                ok(&status_body(1, 2)),
                ok(&status_body(2, 2)),
                not_found("job u-1 not here"),
            ],
        )
        .unwrap();
        assert_eq!(out, "Status: [finished: 3, total: 4, pct: 75.000%]");
    }

    #[test]
    fn test_all_not_found_surfaces_first_unchanged() {
        let err = aggregate_admin(
            Method::GET,
            vec![not_found("first msg"), not_found("second msg")],
        )
        .unwrap_err();
        match err {
            StoreError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "first msg");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_first_non_404_error_wins() {
        let err = aggregate_admin(
            Method::GET,
            vec![
                not_found("ignored"),
                server_err("boom"),
                ok(&status_body(1, 1)),
            ],
        )
        .unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_delete_returns_first_valid_body() {
        let out = aggregate_admin(
            Method::DELETE,
            vec![not_found("gone"), ok("cancelled download job u-1")],
        )
        .unwrap();
        assert_eq!(out, "cancelled download job u-1");
    }

    #[test]
    fn test_full_completion_pct() {
        let out = aggregate_admin(Method::GET, vec![ok(&status_body(1, 1))]).unwrap();
        assert_eq!(out, "Status: [finished: 1, total: 1, pct: 100.000%]");
    }
}
