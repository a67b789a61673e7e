use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{count_param, sentences, string_param};
use crate::tools::{
    CapabilityDescriptor, CapabilityInvoker, ParameterKind, ParameterSpec, Parameters,
};

const DEFAULT_KEY_POINTS: usize = 5;
const KEY_POINT_MIN_CHARS: usize = 20;
const COMPARISON_LIST_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryStyle {
    Brief,
    Detailed,
    Bullet,
}

impl FromStr for SummaryStyle {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "detailed" => Ok(Self::Detailed),
            "bullet" => Ok(Self::Bullet),
            other => Err(anyhow!("unsupported summary style `{other}` (expected brief|detailed|bullet)")),
        }
    }
}

pub struct SummarizeCapability;

impl SummarizeCapability {
    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new("summarize", "Summarize text in different styles")
            .parameter(ParameterSpec::required("text", ParameterKind::String, "Text to summarize"))
            .parameter(
                ParameterSpec::optional(
                    "style",
                    ParameterKind::String,
                    "Summary style: brief, detailed, or bullet",
                )
                .default_value(json!("brief")),
            )
    }

    pub fn summarize(text: &str, style: SummaryStyle) -> String {
        let sentences = sentences(text);
        match style {
            SummaryStyle::Brief => {
                if sentences.is_empty() {
                    return String::new();
                }
                let lead = sentences.iter().take(3).copied().collect::<Vec<_>>().join(". ");
                format!("{lead}.")
            }
            SummaryStyle::Detailed => {
                let points = sentences
                    .iter()
                    .take(5)
                    .map(|sentence| format!("- {sentence}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "This text contains {} sentences covering the following:\n\n{points}",
                    sentences.len()
                )
            }
            SummaryStyle::Bullet => sentences
                .iter()
                .take(7)
                .map(|sentence| format!("• {sentence}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[async_trait]
impl CapabilityInvoker for SummarizeCapability {
    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        let text = string_param(&parameters, "text")?;
        let style = match parameters.get("style").and_then(Value::as_str) {
            Some(style) => style.parse::<SummaryStyle>()?,
            None => SummaryStyle::Brief,
        };

        Ok(Value::String(Self::summarize(text, style)))
    }
}

/// Longest sentences first; short fragments are ignored.
pub struct ExtractKeyPointsCapability;

impl ExtractKeyPointsCapability {
    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new("extractKeyPoints", "Extract key points from text")
            .parameter(ParameterSpec::required("text", ParameterKind::String, "Source text"))
            .parameter(
                ParameterSpec::optional("count", ParameterKind::Integer, "Number of key points")
                    .default_value(json!(DEFAULT_KEY_POINTS)),
            )
    }

    pub fn key_points(text: &str, count: usize) -> Vec<String> {
        let mut candidates = sentences(text)
            .into_iter()
            .filter(|sentence| sentence.chars().count() > KEY_POINT_MIN_CHARS)
            .collect::<Vec<_>>();
        candidates.sort_by(|left, right| right.chars().count().cmp(&left.chars().count()));
        candidates.into_iter().take(count).map(str::to_owned).collect()
    }
}

#[async_trait]
impl CapabilityInvoker for ExtractKeyPointsCapability {
    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        let text = string_param(&parameters, "text")?;
        let count = count_param(&parameters, "count", DEFAULT_KEY_POINTS);

        Ok(json!(Self::key_points(text, count)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub similarity: f64,
    pub common_themes: Vec<String>,
    pub unique_to_first: Vec<String>,
    pub unique_to_second: Vec<String>,
}

pub struct CompareTextsCapability;

impl CompareTextsCapability {
    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new("compareTexts", "Compare and contrast two texts")
            .parameter(ParameterSpec::required("text1", ParameterKind::String, "First text"))
            .parameter(ParameterSpec::required("text2", ParameterKind::String, "Second text"))
    }

    pub fn compare(first: &str, second: &str) -> ComparisonResult {
        let first_words = distinct_words(first);
        let second_words = distinct_words(second);
        let first_set = first_words.iter().map(String::as_str).collect::<HashSet<_>>();
        let second_set = second_words.iter().map(String::as_str).collect::<HashSet<_>>();

        let common = first_words
            .iter()
            .filter(|word| second_set.contains(word.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        let unique_to_first = first_words
            .iter()
            .filter(|word| !second_set.contains(word.as_str()))
            .take(COMPARISON_LIST_LIMIT)
            .cloned()
            .collect();
        let unique_to_second = second_words
            .iter()
            .filter(|word| !first_set.contains(word.as_str()))
            .take(COMPARISON_LIST_LIMIT)
            .cloned()
            .collect();

        let largest = first_words.len().max(second_words.len());
        let similarity = if largest == 0 { 0.0 } else { common.len() as f64 / largest as f64 };

        ComparisonResult {
            similarity,
            common_themes: common.into_iter().take(COMPARISON_LIST_LIMIT).collect(),
            unique_to_first,
            unique_to_second,
        }
    }
}

/// Lowercased whitespace-separated words, first occurrence order.
fn distinct_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

#[async_trait]
impl CapabilityInvoker for CompareTextsCapability {
    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        let first = string_param(&parameters, "text1")?;
        let second = string_param(&parameters, "text2")?;

        Ok(serde_json::to_value(Self::compare(first, second))?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        CompareTextsCapability, ExtractKeyPointsCapability, SummarizeCapability, SummaryStyle,
    };
    use crate::tools::{CapabilityInvoker, Parameters};

    const TEXT: &str = "Solar capacity doubled last year. Wind followed. \
        Storage costs keep falling across most markets! Is grid modernization keeping pace? \
        Policy support remains uneven between regions.";

    #[test]
    fn brief_summary_keeps_first_three_sentences() {
        assert_eq!(
            SummarizeCapability::summarize(TEXT, SummaryStyle::Brief),
            "Solar capacity doubled last year. Wind followed. Storage costs keep falling across most markets."
        );
        assert_eq!(SummarizeCapability::summarize("  ", SummaryStyle::Brief), "");
    }

    #[test]
    fn detailed_summary_counts_sentences() {
        let summary = SummarizeCapability::summarize(TEXT, SummaryStyle::Detailed);

        assert!(summary.starts_with("This text contains 5 sentences covering the following:\n\n"));
        assert!(summary.contains("- Wind followed"));
    }

    #[test]
    fn bullet_summary_uses_bullets() {
        let summary = SummarizeCapability::summarize(TEXT, SummaryStyle::Bullet);

        assert_eq!(summary.lines().count(), 5);
        assert!(summary.lines().all(|line| line.starts_with("• ")));
    }

    #[test]
    fn unknown_style_is_rejected() {
        assert!("verbose".parse::<SummaryStyle>().is_err());
        assert_eq!(" Bullet ".parse::<SummaryStyle>().ok(), Some(SummaryStyle::Bullet));
    }

    #[tokio::test]
    async fn summarize_invoker_surfaces_bad_style() {
        let parameters = json!({ "text": TEXT, "style": "haiku" });
        let error = SummarizeCapability
            .invoke(parameters.as_object().cloned().unwrap_or_default())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("haiku"));
    }

    #[test]
    fn key_points_prefer_longer_sentences() {
        let points = ExtractKeyPointsCapability::key_points(TEXT, 2);

        assert_eq!(
            points,
            vec![
                "Storage costs keep falling across most markets",
                "Policy support remains uneven between regions"
            ]
        );
    }

    #[tokio::test]
    async fn key_points_default_count_is_five() {
        let mut parameters = Parameters::new();
        parameters.insert("text".to_owned(), json!(TEXT));

        let value = ExtractKeyPointsCapability.invoke(parameters).await.unwrap();

        // "Wind followed" is too short to qualify.
        assert_eq!(value.as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn comparison_reports_overlap() {
        let result = CompareTextsCapability::compare("the quick brown fox", "The lazy brown dog");

        assert_eq!(result.common_themes, vec!["the", "brown"]);
        assert_eq!(result.unique_to_first, vec!["quick", "fox"]);
        assert_eq!(result.unique_to_second, vec!["lazy", "dog"]);
        assert!((result.similarity - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn comparison_of_empty_texts_is_zero() {
        let result = CompareTextsCapability::compare("", "   ");
        assert_eq!(result.similarity, 0.0);
        assert!(result.common_themes.is_empty());
    }

    #[tokio::test]
    async fn comparison_serializes_camel_case() {
        let parameters = json!({ "text1": "a b", "text2": "b c" });
        let value = CompareTextsCapability
            .invoke(parameters.as_object().cloned().unwrap_or_default())
            .await
            .unwrap();

        assert_eq!(value["commonThemes"], json!(["b"]));
        assert_eq!(value["uniqueToFirst"], json!(["a"]));
    }
}
