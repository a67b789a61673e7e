//! Mock research capabilities shipped with every session.
//!
//! Results are canned or computed locally; nothing here reaches the network.

mod search;
mod summary;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::tools::{CapabilityRegistry, Parameters};

pub use search::{NewsArticle, SearchCapability, SearchNewsCapability, SearchResult};
pub use summary::{
    CompareTextsCapability, ComparisonResult, ExtractKeyPointsCapability, SummarizeCapability,
    SummaryStyle,
};

/// Registry holding search, searchNews, summarize, extractKeyPoints and compareTexts.
pub fn default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(SearchCapability::descriptor(), SearchCapability);
    registry.register(SearchNewsCapability::descriptor(), SearchNewsCapability);
    registry.register(SummarizeCapability::descriptor(), SummarizeCapability);
    registry.register(ExtractKeyPointsCapability::descriptor(), ExtractKeyPointsCapability);
    registry.register(CompareTextsCapability::descriptor(), CompareTextsCapability);
    registry
}

fn string_param<'a>(parameters: &'a Parameters, name: &str) -> Result<&'a str> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("parameter `{name}` must be a string"))
}

fn count_param(parameters: &Parameters, name: &str, default: usize) -> usize {
    match parameters.get(name) {
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_f64().filter(|number| *number >= 0.0).map(|number| number as u64))
            .map(|number| number as usize)
            .unwrap_or(0),
        None => default,
    }
}

/// Sentences split on runs of `.`, `!` and `?`, trimmed, blanks dropped.
fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?']).map(str::trim).filter(|sentence| !sentence.is_empty()).collect()
}
