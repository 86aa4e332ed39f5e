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

use dashmap::DashMap;
use log::warn;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use strata_common::state::DlBody;
use strata_common::utils::SerdeUtils;
use strata_common::{StoreError, StoreResult};
use strata_common::FILE_BUFFER_SIZE;

/// Persisted job store keyed by job id: one state file per admitted job, so
/// status and cancel survive executor restarts within a target.
pub struct JobDb {
    dir: PathBuf,
    jobs: DashMap<String, DlBody>,
}

impl JobDb {
    pub fn new(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let db = Self {
            dir,
            jobs: DashMap::new(),
        };
        db.restore()?;
        Ok(db)
    }

    fn restore(&self) -> StoreResult<()> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let reader = BufReader::with_capacity(FILE_BUFFER_SIZE, File::open(&path)?);
            match SerdeUtils::deserialize_from::<_, DlBody>(reader) {
                Ok(body) => {
                    self.jobs.insert(body.id.clone(), body);
                }
                Err(e) => warn!("skipping unreadable job file {:?}: {}", path, e),
            }
        }
        Ok(())
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn set_job(&self, id: &str, body: &DlBody) -> StoreResult<()> {
        let path = self.job_path(id);
        let tmp = self.dir.join(format!("{}.json.tmp", id));
        {
            let writer = BufWriter::with_capacity(FILE_BUFFER_SIZE, File::create(&tmp)?);
            SerdeUtils::serialize_into(writer, body)?;
        }
        std::fs::rename(&tmp, &path)?;
        self.jobs.insert(id.to_string(), body.clone());
        Ok(())
    }

    pub fn get_job(&self, id: &str) -> StoreResult<DlBody> {
        match self.jobs.get(id) {
            Some(body) => Ok(body.clone()),
            None => Err(StoreError::job_not_found(id)),
        }
    }

    pub fn del_job(&self, id: &str) -> StoreResult<()> {
        self.jobs.remove(id);
        match std::fs::remove_file(self.job_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
