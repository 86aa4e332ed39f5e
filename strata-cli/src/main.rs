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

mod commands;

use clap::Parser;
use commands::Commands;
use strata_client::DownloadClient;
use strata_common::utils::Logger;
use strata_common::{version, StoreResult};

#[derive(Debug, Parser)]
#[command(version = version::VERSION, about = "strata download admin", long_about = None)]
pub struct StrataArgs {
    /// Proxy base URL
    #[arg(long, default_value = "http://127.0.0.1:8090", global = true)]
    pub proxy: String,

    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let args = StrataArgs::parse();
    Logger::init(&args.log_level);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: StrataArgs) -> StoreResult<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let client = DownloadClient::connect(&args.proxy)?;
        args.command.execute(client).await
    })
}
