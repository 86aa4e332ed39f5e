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

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use strata_common::cluster::hrw;
use strata_common::utils::LocalTime;
use strata_common::{err_box, StoreError, StoreResult};
use tokio::io::AsyncWriteExt;

const WORK_DIR: &str = ".work";

struct Mountpath {
    path: PathBuf,
    digest: u64,
}

/// Local object metadata handle: existence check plus FQN resolution on the
/// owning mountpath.
#[derive(Debug, Clone)]
pub struct Lom {
    pub bucket: String,
    pub objname: String,
    pub mpath: String,
    pub fqn: PathBuf,
}

impl Lom {
    pub fn uname(&self) -> String {
        format!("{}/{}", self.bucket, self.objname)
    }

    pub fn exists(&self) -> bool {
        self.fqn.is_file()
    }
}

/// Per-target local storage. Objects are placed on the mountpath that wins
/// the rendezvous hash over `bucket/objname`, so placement inside a target
/// is as stable under mountpath changes as placement across targets.
pub struct ObjectStore {
    mountpaths: RwLock<HashMap<String, Mountpath>>,
}

impl ObjectStore {
    pub fn new(paths: &[String]) -> StoreResult<Self> {
        let store = Self {
            mountpaths: RwLock::new(HashMap::new()),
        };
        for path in paths {
            store.add_mountpath(path)?;
        }
        Ok(store)
    }

    pub fn add_mountpath(&self, path: impl AsRef<str>) -> StoreResult<()> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let mut mountpaths = self.mountpaths.write().unwrap();
        if mountpaths.contains_key(path) {
            return err_box!("mountpath {} already registered", path);
        }
        mountpaths.insert(
            path.to_string(),
            Mountpath {
                path: PathBuf::from(path),
                digest: hrw::node_digest(path),
            },
        );
        Ok(())
    }

    pub fn remove_mountpath(&self, path: impl AsRef<str>) -> bool {
        self.mountpaths
            .write()
            .unwrap()
            .remove(path.as_ref())
            .is_some()
    }

    pub fn mountpaths(&self) -> Vec<String> {
        self.mountpaths.read().unwrap().keys().cloned().collect()
    }

    /// Rendezvous-pick the owning mountpath and resolve the final FQN.
    pub fn resolve(&self, bucket: &str, objname: &str) -> StoreResult<Lom> {
        if bucket.is_empty() || objname.is_empty() {
            return Err(StoreError::invalid_input("empty bucket or object name"));
        }
        let uname = format!("{}/{}", bucket, objname);
        let digest = hrw::key_digest(&uname);

        let mountpaths = self.mountpaths.read().unwrap();
        let mut max = 0u64;
        let mut chosen: Option<&Mountpath> = None;
        for mp in mountpaths.values() {
            let cs = hrw::mix(mp.digest ^ digest);
            if cs >= max {
                max = cs;
                chosen = Some(mp);
            }
        }
        let mp = match chosen {
            Some(mp) => mp,
            None => return err_box!("no mountpaths to store {}", uname),
        };

        Ok(Lom {
            bucket: bucket.to_string(),
            objname: objname.to_string(),
            mpath: mp.path.to_string_lossy().into_owned(),
            fqn: mp.path.join(bucket).join(objname),
        })
    }

    /// Unique workfile path on the object's own mountpath.
    pub fn workfile(&self, lom: &Lom) -> PathBuf {
        let name = format!(
            "{}.{}.{}",
            lom.bucket,
            lom.objname.replace('/', "_"),
            LocalTime::nanos()
        );
        PathBuf::from(&lom.mpath).join(WORK_DIR).join(name)
    }

    /// Stream the payload into `workfile`, then commit it under the final
    /// FQN with a rename. Returns the number of bytes received.
    pub async fn receive<S>(&self, workfile: &PathBuf, mut body: S, lom: &Lom) -> StoreResult<u64>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        if let Some(parent) = workfile.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(workfile).await?;

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if let Some(parent) = lom.fqn.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(workfile, &lom.fqn).await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|&p| Ok::<_, std::io::Error>(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_resolve_stable() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<String> = (0..3)
            .map(|i| dir.path().join(format!("mp{}", i)).to_string_lossy().into_owned())
            .collect();
        let store = ObjectStore::new(&paths).unwrap();

        let a = store.resolve("bck", "obj-1").unwrap();
        for _ in 0..16 {
            let b = store.resolve("bck", "obj-1").unwrap();
            assert_eq!(a.mpath, b.mpath);
            assert_eq!(a.fqn, b.fqn);
        }
        assert!(!a.exists());
    }

    #[test]
    fn test_no_mountpaths() {
        let store = ObjectStore::new(&[]).unwrap();
        assert!(store.resolve("bck", "obj").is_err());
    }

    #[tokio::test]
    async fn test_receive_commits_object() {
        let dir = tempfile::tempdir().unwrap();
        let mp = dir.path().join("mp0").to_string_lossy().into_owned();
        let store = ObjectStore::new(&[mp]).unwrap();

        let lom = store.resolve("bck", "obj-1").unwrap();
        let workfile = store.workfile(&lom);
        let n = store
            .receive(&workfile, chunks(&[b"hello ", b"world"]), &lom)
            .await
            .unwrap();

        assert_eq!(n, 11);
        assert!(lom.exists());
        assert!(!workfile.exists());
        assert_eq!(std::fs::read(&lom.fqn).unwrap(), b"hello world");
    }
}
