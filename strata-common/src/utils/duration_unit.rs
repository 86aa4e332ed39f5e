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
use std::time::Duration;

/// Human-readable duration, e.g. `"500ms"`, `"10s"`, `"2m"`, `"1h"`, `"7d"`.
/// A bare number is taken as seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationUnit {
    millis: u64,
}

impl DurationUnit {
    pub fn from_str(s: impl AsRef<str>) -> StoreResult<Self> {
        let s = s.as_ref().trim();
        if s.is_empty() {
            return Err(StoreError::invalid_input("empty duration"));
        }

        let (num, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
            Some(pos) => s.split_at(pos),
            None => (s, "s"),
        };

        let value: u64 = num
            .parse()
            .map_err(|_| StoreError::invalid_input(format!("bad duration {}", s)))?;

        let millis = match unit {
            "ms" => value,
            "s" => value * 1000,
            "m" => value * 60 * 1000,
            "h" => value * 60 * 60 * 1000,
            "d" => value * 24 * 60 * 60 * 1000,
            _ => return Err(StoreError::invalid_input(format!("bad duration unit {}", s))),
        };

        Ok(Self { millis })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }
}

#[cfg(test)]
mod tests {
    use super::DurationUnit;
    use std::time::Duration;

    #[test]
    fn test_parse() {
        assert_eq!(
            DurationUnit::from_str("500ms").unwrap().as_duration(),
            Duration::from_millis(500)
        );
        assert_eq!(
            DurationUnit::from_str("10s").unwrap().as_duration(),
            Duration::from_secs(10)
        );
        assert_eq!(
            DurationUnit::from_str("2m").unwrap().as_duration(),
            Duration::from_secs(120)
        );
        assert_eq!(
            DurationUnit::from_str("1h").unwrap().as_duration(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            DurationUnit::from_str("30").unwrap().as_duration(),
            Duration::from_secs(30)
        );
        assert!(DurationUnit::from_str("").is_err());
        assert!(DurationUnit::from_str("10x").is_err());
    }
}
