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

use crate::error::{StoreError, StoreResult};
use crate::utils::DurationUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Local,
    Cloud,
}

impl Provider {
    pub fn is_cloud(&self) -> bool {
        matches!(self, Provider::Cloud)
    }
}

/// One object of a download job: where to fetch it from and the name it is
/// stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlObj {
    pub objname: String,
    pub link: String,
}

/// The per-target download job body. Immutable after admission; persisted by
/// the target job store so status and cancel survive restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlBody {
    pub id: String,
    pub bucket: String,
    pub provider: Provider,
    pub timeout: Option<String>,
    /// Node id of the proxy that admitted the job (notification destination).
    pub owner: String,
    /// Extra headers forwarded on every GET of this job.
    pub headers: HashMap<String, String>,
    pub objs: Vec<DlObj>,
}

impl DlBody {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.is_empty() {
            return Err(StoreError::invalid_input("download body: empty job id"));
        }
        if self.bucket.is_empty() {
            return Err(StoreError::invalid_input("download body: empty bucket"));
        }
        if self.objs.is_empty() {
            return Err(StoreError::invalid_input("download body: no objects"));
        }
        for obj in &self.objs {
            if obj.objname.is_empty() || obj.link.is_empty() {
                return Err(StoreError::invalid_input(format!(
                    "download body: incomplete object {:?}",
                    obj
                )));
            }
        }
        if let Some(t) = &self.timeout {
            DurationUnit::from_str(t)?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> StoreResult<Option<Duration>> {
        match &self.timeout {
            Some(t) => Ok(Some(DurationUnit::from_str(t)?.as_duration())),
            None => Ok(None),
        }
    }
}

impl Display for DlBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{id: {:?}, bucket: {:?} (provider: {:?}), objs: {}}}",
            self.id,
            self.bucket,
            self.provider,
            self.objs.len()
        )
    }
}

/// Admin request addressing one job by id (status and cancel).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlAdminBody {
    pub id: String,
}

impl DlAdminBody {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.is_empty() {
            return Err(StoreError::invalid_input("admin body: empty job id"));
        }
        Ok(())
    }
}

/// One target's reply to a status request. `current_bytes` carries the byte
/// count of the task that is downloading right now.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlStatusResp {
    pub finished: usize,
    pub total: usize,
    pub current_bytes: u64,
    pub job_finished: bool,
    pub aborted: bool,
}

impl DlStatusResp {
    pub fn pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.finished as f64 / self.total as f64 * 100.0
    }
}

/// `POST /v1/download/single` query payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlSingleBody {
    pub bucket: String,
    pub link: String,
    pub objname: String,
    pub provider: Provider,
    pub timeout: Option<String>,
}

impl DlSingleBody {
    pub fn validate(&mut self) -> StoreResult<()> {
        if self.bucket.is_empty() {
            return Err(StoreError::invalid_input("single download: empty bucket"));
        }
        if self.link.is_empty() {
            return Err(StoreError::invalid_input("single download: empty link"));
        }
        if self.objname.is_empty() {
            self.objname = objname_from_link(&self.link)?;
        }
        if let Some(t) = &self.timeout {
            DurationUnit::from_str(t)?;
        }
        Ok(())
    }
}

/// `POST /v1/download/range` query payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlRangeBody {
    pub bucket: String,
    pub base: String,
    pub template: String,
    pub provider: Provider,
    pub timeout: Option<String>,
}

impl DlRangeBody {
    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.is_empty() {
            return Err(StoreError::invalid_input("range download: empty bucket"));
        }
        if self.base.is_empty() {
            return Err(StoreError::invalid_input("range download: empty base"));
        }
        if self.template.is_empty() {
            return Err(StoreError::invalid_input("range download: empty template"));
        }
        if let Some(t) = &self.timeout {
            DurationUnit::from_str(t)?;
        }
        Ok(())
    }
}

/// `POST /v1/download/multi` query payload; the object list rides in the
/// request body as either a `{objname: link}` map or a `[link]` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlMultiBody {
    pub bucket: String,
    pub provider: Provider,
    pub timeout: Option<String>,
}

impl DlMultiBody {
    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.is_empty() {
            return Err(StoreError::invalid_input("multi download: empty bucket"));
        }
        if let Some(t) = &self.timeout {
            DurationUnit::from_str(t)?;
        }
        Ok(())
    }
}

/// `POST /v1/download/bucket/{name}` query payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DlBucketBody {
    pub provider: Provider,
    pub prefix: String,
    pub suffix: String,
}

impl DlBucketBody {
    pub fn validate(&self) -> StoreResult<()> {
        if !self.provider.is_cloud() {
            return Err(StoreError::invalid_input(
                "bucket download requires a cloud bucket",
            ));
        }
        Ok(())
    }
}

/// One entry of a cloud bucket listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntry {
    pub name: String,
    pub link: String,
}

/// Derive the stored object name from the final path segment of a link.
pub fn objname_from_link(link: &str) -> StoreResult<String> {
    let rest = link.split_once("://").map(|(_, r)| r).unwrap_or(link);
    let path = rest.split(['?', '#']).next().unwrap_or(rest);
    let path = match path.find('/') {
        Some(i) => &path[i..],
        None => "",
    };
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if name.is_empty() || name == "." {
        return Err(StoreError::invalid_input(format!(
            "can not extract a valid object name from link {:?}",
            link
        )));
    }
    Ok(name.to_string())
}
