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

use clap::{Args, Subcommand, ValueEnum};
use strata_client::DownloadClient;
use strata_common::state::{DlBucketBody, DlMultiBody, DlRangeBody, DlSingleBody, Provider};
use strata_common::{version, StoreResult};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ProviderArg {
    #[default]
    Local,
    Cloud,
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Local => Provider::Local,
            ProviderArg::Cloud => Provider::Cloud,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download one URL into a bucket
    Single(SingleCmd),
    /// Download a bash-template range, e.g. 'img-{001..100}.jpg'
    Range(RangeCmd),
    /// Download a list of links (object names derived from URL basenames)
    Multi(MultiCmd),
    /// Prefetch a cloud bucket by prefix/suffix
    Bucket(BucketCmd),
    /// Print the cluster-wide status of a download job
    Status(AdminCmd),
    /// Cancel a download job
    Cancel(AdminCmd),
    /// Print the version
    Version,
}

#[derive(Debug, Args)]
pub struct SingleCmd {
    #[arg(long)]
    bucket: String,
    #[arg(long)]
    link: String,
    #[arg(long, default_value = "")]
    objname: String,
    #[arg(long, value_enum, default_value = "local")]
    provider: ProviderArg,
    #[arg(long)]
    timeout: Option<String>,
}

#[derive(Debug, Args)]
pub struct RangeCmd {
    #[arg(long)]
    bucket: String,
    #[arg(long)]
    base: String,
    #[arg(long)]
    template: String,
    #[arg(long, value_enum, default_value = "local")]
    provider: ProviderArg,
    #[arg(long)]
    timeout: Option<String>,
}

#[derive(Debug, Args)]
pub struct MultiCmd {
    #[arg(long)]
    bucket: String,
    #[arg(long, value_enum, default_value = "local")]
    provider: ProviderArg,
    #[arg(long)]
    timeout: Option<String>,
    /// Links to download
    #[arg(required = true)]
    links: Vec<String>,
}

#[derive(Debug, Args)]
pub struct BucketCmd {
    #[arg(long)]
    bucket: String,
    #[arg(long, default_value = "")]
    prefix: String,
    #[arg(long, default_value = "")]
    suffix: String,
}

#[derive(Debug, Args)]
pub struct AdminCmd {
    /// Job uuid returned on admission
    #[arg(long)]
    id: String,
}

impl Commands {
    pub async fn execute(self, client: DownloadClient) -> StoreResult<()> {
        match self {
            Commands::Single(cmd) => {
                let body = DlSingleBody {
                    bucket: cmd.bucket,
                    link: cmd.link,
                    objname: cmd.objname,
                    provider: cmd.provider.into(),
                    timeout: cmd.timeout,
                };
                let id = client.submit_single(&body).await?;
                println!("{}", id);
            }
            Commands::Range(cmd) => {
                let body = DlRangeBody {
                    bucket: cmd.bucket,
                    base: cmd.base,
                    template: cmd.template,
                    provider: cmd.provider.into(),
                    timeout: cmd.timeout,
                };
                let id = client.submit_range(&body).await?;
                println!("{}", id);
            }
            Commands::Multi(cmd) => {
                let query = DlMultiBody {
                    bucket: cmd.bucket,
                    provider: cmd.provider.into(),
                    timeout: cmd.timeout,
                };
                let links = serde_json::json!(cmd.links);
                let id = client.submit_multi(&query, &links).await?;
                println!("{}", id);
            }
            Commands::Bucket(cmd) => {
                let body = DlBucketBody {
                    provider: Provider::Cloud,
                    prefix: cmd.prefix,
                    suffix: cmd.suffix,
                };
                let id = client.submit_bucket(&cmd.bucket, &body).await?;
                println!("{}", id);
            }
            Commands::Status(cmd) => {
                let out = client.status(&cmd.id).await?;
                println!("{}", out);
            }
            Commands::Cancel(cmd) => {
                let out = client.cancel(&cmd.id).await?;
                println!("{}", out);
            }
            Commands::Version => {
                println!("strata-cli {}", version::VERSION);
            }
        }
        Ok(())
    }
}
