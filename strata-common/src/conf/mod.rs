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

mod download_conf;
pub use self::download_conf::DownloadConf;

mod notify_conf;
pub use self::notify_conf::NotifyConf;

use crate::cluster::{Smap, Snode, SnodeFlags};
use crate::error::{StoreError, StoreResult};
use crate::utils::DurationUnit;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConf {
    pub hostname: String,
    pub port: u16,

    // Per-request timeout for intra-cluster broadcasts
    #[serde(skip)]
    pub broadcast_timeout: Duration,
    #[serde(alias = "broadcast_timeout")]
    pub broadcast_timeout_str: String,
}

impl Default for ProxyConf {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 8090,
            broadcast_timeout: Default::default(),
            broadcast_timeout_str: "30s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConf {
    pub hostname: String,
    pub port: u16,

    // Filesystem roots this target owns; one download worker each.
    pub mountpaths: Vec<String>,

    // Directory holding the persisted job store.
    pub state_dir: String,
}

impl Default for TargetConf {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 8091,
            mountpaths: vec![],
            state_dir: "state".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConf {
    pub level: String,
}

impl Default for LogConf {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Proxy,
    Target,
}

/// Static cluster membership entry; the initial cluster map is built from
/// these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConf {
    pub id: String,
    pub role: NodeRole,
    pub addr: String,
    pub non_electable: bool,
    pub ic: bool,
}

impl Default for NodeConf {
    fn default() -> Self {
        Self {
            id: String::new(),
            role: NodeRole::Target,
            addr: String::new(),
            non_electable: false,
            ic: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConf {
    pub cluster_name: String,
    pub proxy: ProxyConf,
    pub target: TargetConf,
    pub download: DownloadConf,
    pub notify: NotifyConf,
    pub log: LogConf,
    pub nodes: Vec<NodeConf>,
}

impl ClusterConf {
    pub const ENV_CONF_FILE: &'static str = "STRATA_CONF_FILE";

    pub fn from_file(path: impl AsRef<str>) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut conf: ClusterConf = toml::from_str(&text)
            .map_err(|e| StoreError::invalid_input(format!("bad conf file: {}", e)))?;
        conf.init()?;
        Ok(conf)
    }

    pub fn with_defaults() -> StoreResult<Self> {
        let mut conf = ClusterConf::default();
        conf.init()?;
        Ok(conf)
    }

    pub fn init(&mut self) -> StoreResult<()> {
        self.proxy.broadcast_timeout =
            DurationUnit::from_str(&self.proxy.broadcast_timeout_str)?.as_duration();
        self.download.init()?;
        self.notify.init()?;
        Ok(())
    }

    /// Build the version-1 cluster map from the static membership section.
    pub fn build_smap(&self) -> StoreResult<Smap> {
        let mut smap = Smap::new(1);
        for node in &self.nodes {
            if node.id.is_empty() || node.addr.is_empty() {
                return Err(StoreError::invalid_input(format!(
                    "node entry missing id or addr: {:?}",
                    node
                )));
            }
            if smap.get_node(&node.id).is_some() {
                return Err(StoreError::invalid_input(format!(
                    "duplicate node id {} in conf",
                    node.id
                )));
            }
            let flags = SnodeFlags {
                non_electable: node.non_electable,
                ic: node.ic,
                ..Default::default()
            };
            let snode = Snode::new(&node.id, &node.addr, flags);
            match node.role {
                NodeRole::Proxy => smap.add_proxy(snode),
                NodeRole::Target => smap.add_target(snode),
            }
        }
        Ok(smap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_and_init() {
        let conf = ClusterConf::with_defaults().unwrap();
        assert_eq!(conf.download.queue_cap, 200);
        assert_eq!(
            conf.download.queue_put_timeout,
            Duration::from_secs(10)
        );
        assert_eq!(conf.notify.housekeep_interval, Duration::from_secs(120));
        assert_eq!(conf.notify.remove_mult, 3);
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            cluster_name = "dev"

            [download]
            queue_put_timeout = "2s"

            [[nodes]]
            id = "p1"
            role = "proxy"
            addr = "127.0.0.1:8090"
            ic = true

            [[nodes]]
            id = "t1"
            role = "target"
            addr = "127.0.0.1:8091"
        "#;
        let mut conf: ClusterConf = toml::from_str(text).unwrap();
        conf.init().unwrap();
        assert_eq!(conf.download.queue_put_timeout, Duration::from_secs(2));

        let smap = conf.build_smap().unwrap();
        assert_eq!(smap.count_proxies(), 1);
        assert_eq!(smap.count_targets(), 1);
        assert!(smap.pmap.get("p1").unwrap().is_ic());
    }

    #[test]
    fn test_duplicate_node_id() {
        let mut conf = ClusterConf::default();
        conf.nodes = vec![
            NodeConf {
                id: "n1".into(),
                role: NodeRole::Target,
                addr: "127.0.0.1:8091".into(),
                ..Default::default()
            },
            NodeConf {
                id: "n1".into(),
                role: NodeRole::Proxy,
                addr: "127.0.0.1:8090".into(),
                ..Default::default()
            },
        ];
        assert!(conf.build_smap().is_err());
    }
}
