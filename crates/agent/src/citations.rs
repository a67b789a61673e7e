use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::parser::compile_regex;

/// Characters kept on each side of a marker's start.
pub const CONTEXT_RADIUS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub source: String,
    pub context: String,
}

fn source_marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_regex(r"\[Source: (?P<source>[^\]]+)\]", "source_marker")).as_ref()
}

/// One citation per `[Source: NAME]` marker, in order, duplicates included.
///
/// The context window is measured in characters around the marker's start and
/// clipped at both ends of the text.
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let Some(regex) = source_marker_regex() else {
        return Vec::new();
    };

    let mut citations = Vec::new();
    for captures in regex.captures_iter(text) {
        let (Some(marker), Some(source)) = (captures.get(0), captures.name("source")) else {
            continue;
        };

        let position = text[..marker.start()].chars().count();
        let skip = position.saturating_sub(CONTEXT_RADIUS);
        let take = position + CONTEXT_RADIUS - skip;
        let context = text.chars().skip(skip).take(take).collect::<String>();

        citations.push(Citation { source: source.as_str().to_owned(), context });
    }

    citations
}
