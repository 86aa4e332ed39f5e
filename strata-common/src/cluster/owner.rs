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

use crate::cluster::Smap;
use crate::error::StoreResult;
use crate::err_box;
use std::sync::{Arc, RwLock};

/// Subscribers register through this interface instead of holding a pointer
/// back into the owner.
pub trait SmapListener: Send + Sync {
    fn smap_changed(&self, smap: &Arc<Smap>);
}

/// Copy-on-write owner of the current cluster map. `put` replaces the whole
/// snapshot and fans the new version out to registered listeners.
pub struct SmapOwner {
    inner: RwLock<Arc<Smap>>,
    listeners: RwLock<Vec<Arc<dyn SmapListener>>>,
}

impl SmapOwner {
    pub fn new(smap: Smap) -> Self {
        Self {
            inner: RwLock::new(Arc::new(smap)),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self) -> Arc<Smap> {
        self.inner.read().unwrap().clone()
    }

    pub fn put(&self, smap: Smap) -> StoreResult<()> {
        let smap = Arc::new(smap);
        {
            let mut cur = self.inner.write().unwrap();
            if smap.version <= cur.version {
                return err_box!(
                    "stale cluster map: v{} <= current v{}",
                    smap.version,
                    cur.version
                );
            }
            *cur = smap.clone();
        }

        let listeners = self.listeners.read().unwrap().clone();
        for l in listeners {
            l.smap_changed(&smap);
        }
        Ok(())
    }

    pub fn reg_listener(&self, listener: Arc<dyn SmapListener>) {
        self.listeners.write().unwrap().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Recorder(AtomicU64);

    impl SmapListener for Recorder {
        fn smap_changed(&self, smap: &Arc<Smap>) {
            self.0.store(smap.version, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_put_and_notify() {
        let owner = SmapOwner::new(Smap::new(1));
        let rec = Arc::new(Recorder(AtomicU64::new(0)));
        owner.reg_listener(rec.clone());

        owner.put(Smap::new(2)).unwrap();
        assert_eq!(rec.0.load(Ordering::SeqCst), 2);
        assert_eq!(owner.get().version, 2);

        // versions are strictly monotonic
        assert!(owner.put(Smap::new(2)).is_err());
        assert!(owner.put(Smap::new(1)).is_err());
    }
}
