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

use std::io;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Common(String),

    #[error("download job {0} not found")]
    JobNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("object {0} already exists")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not enough {kind}s in the cluster map: required {required}, available {available}")]
    NoNodes {
        kind: &'static str,
        required: usize,
        available: usize,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("node {0} is gone from the cluster map")]
    NodeNotFound(String),

    #[error(transparent)]
    IO(#[from] io::Error),

    #[error("remote replied {status}: {message}")]
    Status { status: u16, message: String },
}

impl StoreError {
    pub fn common(msg: impl Into<String>) -> Self {
        StoreError::Common(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        StoreError::InvalidInput(msg.into())
    }

    pub fn job_not_found(id: impl Into<String>) -> Self {
        StoreError::JobNotFound(id.into())
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        StoreError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::JobNotFound(_)
                | StoreError::NotFound(_)
                | StoreError::NodeNotFound(_)
                | StoreError::Status { status: 404, .. }
        )
    }

    /// HTTP status used when this error crosses the REST surface.
    pub fn http_status(&self) -> u16 {
        match self {
            StoreError::JobNotFound(_) | StoreError::NotFound(_) | StoreError::NodeNotFound(_) => {
                404
            }
            StoreError::AlreadyExists(_) => 409,
            StoreError::InvalidInput(_) => 400,
            StoreError::Timeout(_) => 408,
            StoreError::NoNodes { .. } => 503,
            StoreError::Aborted(_) => 409,
            StoreError::Status { status, .. } => *status,
            StoreError::Common(_) | StoreError::IO(_) => 500,
        }
    }

    /// Rebuild an error from the status a remote node replied with, keeping
    /// `not-found` distinguishable for the admin fan-out aggregation.
    pub fn from_remote(status: u16, message: impl Into<String>) -> Self {
        StoreError::Status {
            status,
            message: message.into(),
        }
    }
}

/// Return `Err(StoreError::Common(..))` built from a format string.
#[macro_export]
macro_rules! err_box {
    ($($args:tt)*) => {
        Err($crate::error::StoreError::Common(format!($($args)*)))
    };
}

/// Build a `StoreError::Common` value from a format string.
#[macro_export]
macro_rules! err_msg {
    ($($args:tt)*) => {
        $crate::error::StoreError::Common(format!($($args)*))
    };
}

/// Return `Err` with an explicitly constructed error value.
#[macro_export]
macro_rules! err_ext {
    ($e:expr) => {
        Err($e)
    };
}
