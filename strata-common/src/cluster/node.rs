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

use crate::cluster::hrw;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SnodeFlags {
    pub non_electable: bool,
    pub maintenance: bool,
    pub decommission: bool,
    pub ic: bool,
}

/// One cluster node. The digest is computed once from the node id and stays
/// stable for the node's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snode {
    pub id: String,
    pub addr: String,
    pub digest: u64,
    #[serde(default)]
    pub flags: SnodeFlags,
}

impl Snode {
    pub fn new(id: impl Into<String>, addr: impl Into<String>, flags: SnodeFlags) -> Self {
        let id = id.into();
        let digest = hrw::node_digest(&id);
        Self {
            id,
            addr: addr.into(),
            digest,
            flags,
        }
    }

    /// Test-only style constructor with a caller-chosen digest.
    pub fn with_digest(
        id: impl Into<String>,
        addr: impl Into<String>,
        digest: u64,
        flags: SnodeFlags,
    ) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
            digest,
            flags,
        }
    }

    pub fn in_maint_or_decomm(&self) -> bool {
        self.flags.maintenance || self.flags.decommission
    }

    pub fn is_ic(&self) -> bool {
        self.flags.ic
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl PartialEq for Snode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Snode {}

impl Display for Snode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.id, self.addr)
    }
}
