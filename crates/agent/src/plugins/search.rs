use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{count_param, string_param};
use crate::tools::{
    CapabilityDescriptor, CapabilityInvoker, ParameterKind, ParameterSpec, Parameters,
};

const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: String,
}

impl SearchResult {
    fn new(title: impl Into<String>, snippet: impl Into<String>, url: String, source: &str) -> Self {
        Self { title: title.into(), snippet: snippet.into(), url, source: source.to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewsArticle {
    pub title: String,
    pub source: String,
    pub date: String,
    pub snippet: String,
    pub url: String,
}

/// `example.com/<section>/<term>` with the term percent-encoded as one segment.
fn example_url(section: &str, term: &str) -> String {
    let Ok(mut url) = Url::parse("https://example.com/") else {
        return format!("https://example.com/{section}");
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(section);
        if !term.is_empty() {
            segments.push(term);
        }
    }
    url.into()
}

fn topic_results(query: &str) -> Vec<SearchResult> {
    let query_lower = query.to_lowercase();

    if query_lower.contains("artificial intelligence") {
        return vec![
            SearchResult::new(
                "Introduction to Artificial Intelligence",
                "AI refers to the simulation of human intelligence in machines programmed to think and learn.",
                example_url("ai-intro", ""),
                "AI Encyclopedia",
            ),
            SearchResult::new(
                "Machine Learning vs Deep Learning",
                "Understanding the differences between ML and DL approaches in AI development.",
                example_url("ml-dl", ""),
                "Tech Research Journal",
            ),
            SearchResult::new(
                "AI in Enterprise Applications",
                "How businesses are leveraging AI for automation and decision-making.",
                example_url("enterprise-ai", ""),
                "Business Technology Review",
            ),
        ];
    }

    if query_lower.contains("climate change") {
        return vec![
            SearchResult::new(
                "Climate Change: The Science Explained",
                "Understanding the causes and effects of global climate change.",
                example_url("climate-science", ""),
                "Environmental Science Institute",
            ),
            SearchResult::new(
                "Renewable Energy Solutions",
                "Exploring solar, wind, and other renewable alternatives to fossil fuels.",
                example_url("renewables", ""),
                "Green Energy Foundation",
            ),
        ];
    }

    vec![
        SearchResult::new(
            format!("Research on {query}"),
            format!("Comprehensive overview of {query} including key findings and analysis."),
            example_url("research", query),
            "Research Database",
        ),
        SearchResult::new(
            format!("{query}: A Complete Guide"),
            format!("Everything you need to know about {query} in one comprehensive guide."),
            example_url("guide", query),
            "Knowledge Base",
        ),
    ]
}

/// `search(query, maxResults)` over a small canned corpus.
pub struct SearchCapability;

impl SearchCapability {
    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new("search", "Search for information on a topic")
            .parameter(ParameterSpec::required("query", ParameterKind::String, "Search query"))
            .parameter(
                ParameterSpec::optional("maxResults", ParameterKind::Integer, "Maximum results")
                    .default_value(json!(DEFAULT_MAX_RESULTS)),
            )
    }

    pub fn search(query: &str, max_results: usize) -> Vec<SearchResult> {
        let mut results = topic_results(query);
        results.truncate(max_results);
        results
    }
}

#[async_trait]
impl CapabilityInvoker for SearchCapability {
    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        let query = string_param(&parameters, "query")?;
        let max_results = count_param(&parameters, "maxResults", DEFAULT_MAX_RESULTS);
        debug!(query, max_results, "searching mock corpus");

        Ok(serde_json::to_value(Self::search(query, max_results))?)
    }
}

/// `searchNews(topic)`: two articles dated today.
pub struct SearchNewsCapability;

impl SearchNewsCapability {
    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::new("searchNews", "Search for recent news articles")
            .parameter(ParameterSpec::required("topic", ParameterKind::String, "News topic"))
    }

    pub fn articles(topic: &str) -> Vec<NewsArticle> {
        let date = Utc::now().date_naive().to_string();
        vec![
            NewsArticle {
                title: format!("Latest developments in {topic}"),
                source: "Tech News Daily".to_owned(),
                date: date.clone(),
                snippet: format!("Recent advancements in {topic} have shown promising results..."),
                url: example_url("news", topic),
            },
            NewsArticle {
                title: format!("{topic}: What experts are saying"),
                source: "Industry Weekly".to_owned(),
                date,
                snippet: format!(
                    "Leading experts in the field of {topic} have released new findings..."
                ),
                url: example_url("expert-analysis", topic),
            },
        ]
    }
}

#[async_trait]
impl CapabilityInvoker for SearchNewsCapability {
    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        let topic = string_param(&parameters, "topic")?;
        debug!(topic, "searching mock news");

        Ok(serde_json::to_value(Self::articles(topic))?)
    }
}
