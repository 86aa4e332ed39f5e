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

use crate::cluster::Snode;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Versioned cluster map: proxies and targets keyed by node id. A map is
/// immutable once published; a version bump replaces the whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct Smap {
    pub version: u64,
    pub pmap: HashMap<String, Arc<Snode>>,
    pub tmap: HashMap<String, Arc<Snode>>,
}

impl Smap {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            pmap: HashMap::new(),
            tmap: HashMap::new(),
        }
    }

    pub fn add_proxy(&mut self, node: Snode) {
        self.pmap.insert(node.id.clone(), Arc::new(node));
    }

    pub fn add_target(&mut self, node: Snode) {
        self.tmap.insert(node.id.clone(), Arc::new(node));
    }

    pub fn get_node(&self, id: &str) -> Option<&Arc<Snode>> {
        self.tmap.get(id).or_else(|| self.pmap.get(id))
    }

    pub fn count_targets(&self) -> usize {
        self.tmap.len()
    }

    pub fn count_proxies(&self) -> usize {
        self.pmap.len()
    }
}

impl Display for Smap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "smap v{}[p={}, t={}]",
            self.version,
            self.pmap.len(),
            self.tmap.len()
        )
    }
}
