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

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a small HTTP file server:
/// - `GET /data/{name}` replies with the payload at once
/// - `GET /slow/{name}` streams it one byte per 50 ms
pub async fn spawn_file_server(files: HashMap<String, Vec<u8>>) -> SocketAddr {
    let files = Arc::new(files);
    let app = Router::new()
        .route("/data/:name", get(serve_file))
        .route("/slow/:name", get(serve_slow))
        .with_state(files);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn serve_file(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    Path(name): Path<String>,
) -> Response {
    match files.get(&name) {
        Some(data) => data.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "no such file").into_response(),
    }
}

async fn serve_slow(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    Path(name): Path<String>,
) -> Response {
    let data = match files.get(&name) {
        Some(data) => data.clone(),
        None => return (StatusCode::NOT_FOUND, "no such file").into_response(),
    };
    let stream = futures::stream::iter(data).then(|b| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, Infallible>(Bytes::copy_from_slice(&[b]))
    });
    Body::from_stream(stream).into_response()
}

/// Await a condition with a bounded number of polls.
pub async fn wait_for<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {}", what);
}
