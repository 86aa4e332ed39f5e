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

//! A variant of consistent hash based on the rendezvous algorithm by Thaler
//! and Ravishankar, aka highest random weight (HRW).

use crate::cluster::{Smap, Snode};
use crate::error::{StoreError, StoreResult};
use fnv::FnvHasher;
use std::hash::Hasher;
use std::sync::Arc;

/// Fixed seed for the placement key digest.
pub const KEY_SEED: u64 = 1103515245;

/// 64-bit FNV-1a over the placement key, seeded with [`KEY_SEED`].
pub fn key_digest(uname: &str) -> u64 {
    let mut hasher = FnvHasher::with_key(KEY_SEED);
    hasher.write(uname.as_bytes());
    hasher.finish()
}

/// Node digests use the same seeded hash over the node id so they stay
/// stable for the node's lifetime.
pub fn node_digest(id: &str) -> u64 {
    key_digest(id)
}

/// Nonlinear 64-bit permutation applied to `node.digest ^ key_digest`.
#[inline]
pub fn mix(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl Smap {
    pub fn hrw_target(&self, uname: &str, skip_maint: bool) -> StoreResult<Arc<Snode>> {
        self.hrw_target_digest(key_digest(uname), skip_maint)
    }

    pub fn hrw_target_digest(&self, digest: u64, skip_maint: bool) -> StoreResult<Arc<Snode>> {
        let mut max = 0u64;
        let mut chosen: Option<&Arc<Snode>> = None;
        for tsi in self.tmap.values() {
            if skip_maint && tsi.in_maint_or_decomm() {
                continue;
            }
            let cs = mix(tsi.digest ^ digest);
            if cs >= max {
                max = cs;
                chosen = Some(tsi);
            }
        }
        match chosen {
            Some(si) => Ok(si.clone()),
            None => Err(StoreError::NoNodes {
                kind: "target",
                required: 1,
                available: self.tmap.len(),
            }),
        }
    }

    /// Proxy selection skips the given id plus non-electable and
    /// in-maintenance nodes; ranked by node digest alone.
    pub fn hrw_proxy(&self, id_to_skip: &str) -> StoreResult<Arc<Snode>> {
        let mut max = 0u64;
        let mut chosen: Option<&Arc<Snode>> = None;
        for (pid, psi) in &self.pmap {
            if pid == id_to_skip {
                continue;
            }
            if psi.flags.non_electable || psi.in_maint_or_decomm() {
                continue;
            }
            if psi.digest >= max {
                max = psi.digest;
                chosen = Some(psi);
            }
        }
        match chosen {
            Some(pi) => Ok(pi.clone()),
            None => Err(StoreError::NoNodes {
                kind: "proxy",
                required: 1,
                available: self.pmap.len(),
            }),
        }
    }

    /// Pick the Information-Center member responsible for the given uuid.
    pub fn hrw_ic(&self, uuid: &str) -> StoreResult<Arc<Snode>> {
        let digest = key_digest(uuid);
        let mut max = 0u64;
        let mut chosen: Option<&Arc<Snode>> = None;
        for psi in self.pmap.values() {
            if psi.in_maint_or_decomm() || !psi.is_ic() {
                continue;
            }
            let cs = mix(psi.digest ^ digest);
            if cs >= max {
                max = cs;
                chosen = Some(psi);
            }
        }
        match chosen {
            Some(pi) => Ok(pi.clone()),
            None => Err(StoreError::common(format!("IC is empty: {}", self))),
        }
    }

    /// Pick one target for a cluster-wide task, e.g. listing a cloud bucket.
    pub fn hrw_target_task(&self, uuid: &str) -> StoreResult<Arc<Snode>> {
        self.hrw_target_digest(key_digest(uuid), true)
    }

    /// All eligible targets sorted by their HRW weight in descending order,
    /// truncated to `count`. Errors when fewer than `count` targets exist.
    pub fn hrw_target_list(&self, uname: &str, count: usize) -> StoreResult<Vec<Arc<Snode>>> {
        let cnt = self.count_targets();
        if cnt < count {
            return Err(StoreError::NoNodes {
                kind: "target",
                required: count,
                available: cnt,
            });
        }
        let digest = key_digest(uname);
        let mut hlist = HrwList::new(count);
        for tsi in self.tmap.values() {
            if tsi.in_maint_or_decomm() {
                continue;
            }
            hlist.add(mix(tsi.digest ^ digest), tsi.clone());
        }
        let sis = hlist.get();
        if count != cnt && sis.len() < count {
            return Err(StoreError::NoNodes {
                kind: "target",
                required: count,
                available: sis.len(),
            });
        }
        Ok(sis)
    }
}

/// Keeps the top-`n` nodes sorted on the fly with insertion sort.
struct HrwList {
    hs: Vec<u64>,
    sis: Vec<Arc<Snode>>,
    n: usize,
}

impl HrwList {
    fn new(count: usize) -> Self {
        Self {
            hs: Vec::with_capacity(count),
            sis: Vec::with_capacity(count),
            n: count,
        }
    }

    fn get(self) -> Vec<Arc<Snode>> {
        self.sis
    }

    fn add(&mut self, weight: u64, sinfo: Arc<Snode>) {
        let mut l = self.sis.len();
        if l == self.n && weight <= self.hs[l - 1] {
            return;
        }
        if l == self.n {
            self.hs[l - 1] = weight;
            self.sis[l - 1] = sinfo;
        } else {
            self.hs.push(weight);
            self.sis.push(sinfo);
            l += 1;
        }
        let mut idx = l - 1;
        while idx > 0 && self.hs[idx - 1] < self.hs[idx] {
            self.hs.swap(idx, idx - 1);
            self.sis.swap(idx, idx - 1);
            idx -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SnodeFlags;

    fn fixed_smap() -> Smap {
        let mut smap = Smap::new(1);
        for (id, digest) in [("A", 0x1u64), ("B", 0x2), ("C", 0x3), ("D", 0x4)] {
            smap.add_target(Snode::with_digest(
                id,
                format!("127.0.0.1:91{}", digest),
                digest,
                SnodeFlags::default(),
            ));
        }
        smap
    }

    fn key_for_digest() -> u64 {
        0xDEAD
    }

    #[test]
    fn test_hrw_deterministic() {
        let smap = fixed_smap();
        let a = smap.hrw_target("bck/obj-1", true).unwrap();
        for _ in 0..32 {
            let b = smap.hrw_target("bck/obj-1", true).unwrap();
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn test_hrw_list_head_matches_single() {
        let smap = fixed_smap();
        for i in 0..64 {
            let uname = format!("bck/obj-{}", i);
            let one = smap.hrw_target(&uname, true).unwrap();
            let list = smap.hrw_target_list(&uname, 2).unwrap();
            assert_eq!(list.len(), 2);
            assert_eq!(list[0].id, one.id);
        }
    }

    #[test]
    fn test_hrw_list_descending() {
        let smap = fixed_smap();
        let digest = key_digest("bck/some-object");
        let list = smap.hrw_target_list("bck/some-object", 4).unwrap();
        let weights: Vec<u64> = list.iter().map(|si| mix(si.digest ^ digest)).collect();
        for w in weights.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_fixed_digests_with_maintenance() {
        let mut smap = fixed_smap();
        let digest = key_for_digest();

        // pick the expected winner by hand
        let mut best = 0u64;
        let mut expect = String::new();
        for (id, d) in [("A", 0x1u64), ("B", 0x2), ("C", 0x3), ("D", 0x4)] {
            let cs = mix(d ^ digest);
            if cs >= best {
                best = cs;
                expect = id.to_string();
            }
        }
        let chosen = smap.hrw_target_digest(digest, true).unwrap();
        assert_eq!(chosen.id, expect);

        // flip the winner into maintenance: it must drop out of scoring
        let flagged = Snode::with_digest(
            chosen.id.clone(),
            chosen.addr.clone(),
            chosen.digest,
            SnodeFlags {
                maintenance: true,
                ..Default::default()
            },
        );
        smap.version += 1;
        smap.add_target(flagged);

        let rechosen = smap.hrw_target_digest(digest, true).unwrap();
        assert_ne!(rechosen.id, chosen.id);

        let list = smap.hrw_target_list("ignored", 2).unwrap();
        assert!(list.iter().all(|si| si.id != chosen.id));
    }

    #[test]
    fn test_not_enough_targets() {
        let smap = fixed_smap();
        let res = smap.hrw_target_list("bck/o", 5);
        assert!(matches!(
            res,
            Err(StoreError::NoNodes {
                kind: "target",
                required: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_map() {
        let smap = Smap::new(1);
        assert!(smap.hrw_target("bck/o", true).is_err());
        assert!(smap.hrw_proxy("").is_err());
    }

    #[test]
    fn test_hrw_proxy_skips() {
        let mut smap = Smap::new(1);
        smap.add_proxy(Snode::with_digest("p1", "127.0.0.1:81", 10, SnodeFlags::default()));
        smap.add_proxy(Snode::with_digest(
            "p2",
            "127.0.0.1:82",
            20,
            SnodeFlags {
                non_electable: true,
                ..Default::default()
            },
        ));
        smap.add_proxy(Snode::with_digest(
            "p3",
            "127.0.0.1:83",
            30,
            SnodeFlags {
                maintenance: true,
                ..Default::default()
            },
        ));

        // highest-digest eligible proxy wins
        assert_eq!(smap.hrw_proxy("").unwrap().id, "p1");
        // skipping the only eligible proxy leaves nothing
        assert!(smap.hrw_proxy("p1").is_err());
    }

    #[test]
    fn test_hrw_ic() {
        let mut smap = Smap::new(1);
        smap.add_proxy(Snode::with_digest("p1", "127.0.0.1:81", 10, SnodeFlags::default()));
        assert!(smap.hrw_ic("uuid-1").is_err());

        smap.add_proxy(Snode::with_digest(
            "p2",
            "127.0.0.1:82",
            20,
            SnodeFlags {
                ic: true,
                ..Default::default()
            },
        ));
        assert_eq!(smap.hrw_ic("uuid-1").unwrap().id, "p2");
    }
}
