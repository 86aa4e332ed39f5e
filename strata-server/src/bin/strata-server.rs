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

use clap::{Parser, ValueEnum};
use std::sync::Arc;
use strata_common::cluster::SmapOwner;
use strata_common::conf::ClusterConf;
use strata_common::utils::Logger;
use strata_common::{version, StoreResult};
use strata_server::proxy::ProxyServer;
use strata_server::target::TargetServer;
use strata_server::transport::LoopbackHub;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Role {
    Proxy,
    Target,
}

#[derive(Debug, Parser)]
#[command(version = version::VERSION, about = "strata cluster node", long_about = None)]
struct ServerArgs {
    /// Configuration file path (optional)
    #[arg(short, long)]
    conf: Option<String>,

    /// Node role
    #[arg(long, value_enum)]
    role: Role,

    /// Node id; must match an entry of the conf `nodes` section
    #[arg(long)]
    id: String,
}

fn main() {
    let args = ServerArgs::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: ServerArgs) -> StoreResult<()> {
    let conf_path = args
        .conf
        .clone()
        .or_else(|| std::env::var(ClusterConf::ENV_CONF_FILE).ok());
    let conf = match conf_path {
        Some(path) => ClusterConf::from_file(path)?,
        None => ClusterConf::with_defaults()?,
    };
    Logger::init(&conf.log.level);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let smap = Arc::new(SmapOwner::new(conf.build_smap()?));
        match args.role {
            Role::Proxy => {
                let proxy = ProxyServer::new(conf, &args.id, smap);
                proxy.start();
                proxy.serve().await
            }
            Role::Target => {
                let transport = LoopbackHub::new().transport(&args.id);
                let target = TargetServer::new(conf, &args.id, smap, transport, None)?;
                target.serve().await
            }
        }
    })
}
