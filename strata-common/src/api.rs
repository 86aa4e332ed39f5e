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

//! REST surface constants shared by the proxy, the targets and the client.

pub const VERSION_PREFIX: &str = "/v1";

pub const DOWNLOAD: &str = "download";
pub const DOWNLOAD_SINGLE: &str = "single";
pub const DOWNLOAD_RANGE: &str = "range";
pub const DOWNLOAD_MULTI: &str = "multi";
pub const DOWNLOAD_BUCKET: &str = "bucket";

pub const NOTIFS: &str = "notifs";
pub const PROGRESS: &str = "progress";
pub const FINISHED: &str = "finished";

pub const OBJECTS: &str = "objects";

/// Node id of the sending node, set on every intra-cluster request.
pub const HEADER_CALLER_ID: &str = "x-strata-caller-id";

pub const PARAM_ID: &str = "id";

pub fn join(items: &[&str]) -> String {
    let mut path = String::from(VERSION_PREFIX);
    for item in items {
        path.push('/');
        path.push_str(item);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join(&[DOWNLOAD, DOWNLOAD_SINGLE]), "/v1/download/single");
        assert_eq!(join(&[NOTIFS, PROGRESS]), "/v1/notifs/progress");
    }
}
