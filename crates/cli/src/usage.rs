// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage reported by the agent.
//!
//! Each counter is parsed independently from either a JSON integer or a
//! numeric string. A missing or unparsable counter becomes `None` without
//! affecting its siblings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Input/output/total token counts, each independently optional.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "lenient_count")]
    pub input_tokens: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub output_tokens: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_tokens: Option<i64>,
}

impl TokenUsage {
    pub fn new(input: Option<i64>, output: Option<i64>, total: Option<i64>) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: total,
        }
    }

    /// Parse from a `{inputTokens, outputTokens, totalTokens}` object.
    ///
    /// Never fails: anything that is not an object yields all-`None`.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(parse_count);
        Self {
            input_tokens: field("inputTokens"),
            output_tokens: field("outputTokens"),
            total_tokens: field("totalTokens"),
        }
    }

    /// Overlay `self` on `previous`: counters missing here keep the previous value.
    pub fn merged_over(self, previous: Option<TokenUsage>) -> Self {
        let previous = previous.unwrap_or_default();
        Self {
            input_tokens: self.input_tokens.or(previous.input_tokens),
            output_tokens: self.output_tokens.or(previous.output_tokens),
            total_tokens: self.total_tokens.or(previous.total_tokens),
        }
    }

    /// True when no counter is known.
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }
}

/// Parse a counter from an integer, an integral float, or a numeric string.
pub fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_count(&value))
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
