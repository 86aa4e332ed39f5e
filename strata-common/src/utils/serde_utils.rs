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

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Marshal failures are internal errors: they carry a `serde` marker so they
/// are never mistaken for a remote/user failure.
pub struct SerdeUtils;

impl SerdeUtils {
    pub fn to_json<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::common(format!("serde marshal: {}", e)))
    }

    pub fn to_json_string<T: Serialize>(value: &T) -> StoreResult<String> {
        serde_json::to_string(value)
            .map_err(|e| StoreError::common(format!("serde marshal: {}", e)))
    }

    pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::common(format!("serde unmarshal: {}", e)))
    }

    pub fn serialize_into<W: Write, T: Serialize>(writer: W, value: &T) -> StoreResult<()> {
        serde_json::to_writer(writer, value)
            .map_err(|e| StoreError::common(format!("serde marshal: {}", e)))
    }

    pub fn deserialize_from<R: Read, T: DeserializeOwned>(reader: R) -> StoreResult<T> {
        serde_json::from_reader(reader)
            .map_err(|e| StoreError::common(format!("serde unmarshal: {}", e)))
    }
}
