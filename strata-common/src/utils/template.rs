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

/// Bash-style range template: `prefix{START..END[..STEP]}suffix`, where the
/// START token's width (leading zeros included) sets the zero-pad width of
/// the generated names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BashTemplate {
    pub prefix: String,
    pub suffix: String,
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub digit_count: usize,
}

impl BashTemplate {
    pub fn parse(template: impl AsRef<str>) -> StoreResult<Self> {
        let template = template.as_ref();
        let open = template
            .find('{')
            .ok_or_else(|| StoreError::invalid_input(format!("no '{{' in template {}", template)))?;
        let close = template
            .rfind('}')
            .filter(|&c| c > open)
            .ok_or_else(|| StoreError::invalid_input(format!("no '}}' in template {}", template)))?;

        let prefix = &template[..open];
        let suffix = &template[close + 1..];
        let inner = &template[open + 1..close];

        let parts: Vec<&str> = inner.split("..").collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(StoreError::invalid_input(format!(
                "template range must be START..END[..STEP], got {{{}}}",
                inner
            )));
        }

        let parse_num = |s: &str| -> StoreResult<i64> {
            s.parse()
                .map_err(|_| StoreError::invalid_input(format!("bad number {:?} in template", s)))
        };

        let start = parse_num(parts[0])?;
        let end = parse_num(parts[1])?;
        let step = if parts.len() == 3 {
            parse_num(parts[2])?
        } else {
            1
        };

        if start > end {
            return Err(StoreError::invalid_input(format!(
                "template start {} > end {}",
                start, end
            )));
        }
        if step < 1 {
            return Err(StoreError::invalid_input(format!(
                "template step {} must be positive",
                step
            )));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            start,
            end,
            step,
            digit_count: parts[0].len(),
        })
    }

    pub fn count(&self) -> usize {
        ((self.end - self.start) / self.step + 1) as usize
    }

    /// Generated names, ascending by index.
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        (self.start..=self.end)
            .step_by(self.step as usize)
            .map(move |i| {
                format!(
                    "{}{:0width$}{}",
                    self.prefix,
                    i,
                    self.suffix,
                    width = self.digit_count
                )
            })
    }
}
