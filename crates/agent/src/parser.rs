//! Detection of capability requests in model output.
//!
//! Grammar, matched left to right and case-sensitive on the tag keywords:
//!
//! ```text
//! call    := '<call' WS+ 'name="' IDENT '"' WS* '>' PAYLOAD '</call' WS* '>'
//! IDENT   := [A-Za-z_][A-Za-z0-9_]*
//! PAYLOAD := shortest text up to the first closing tag, free of '<call';
//!            must trim to a JSON object
//! ```
//!
//! A payload that is not a JSON object drops only its own block. Braces nest
//! freely inside the payload because the block ends at the closing tag, not at
//! a balancing brace. A closing tag embedded in a JSON string cuts the payload
//! short, so that block is dropped. An opening tag that reaches another `<call`
//! before its closing tag is unterminated: it is not a match, and scanning
//! resumes at the later tag.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, error};

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub parameters: Map<String, Value>,
}

const OPEN_TAG_PREFIX: &str = "<call";

fn open_tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile_regex(r#"<call\s+name="(?P<name>[A-Za-z_][A-Za-z0-9_]*)"\s*>"#, "call_open")
    })
    .as_ref()
}

fn close_tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_regex(r"</call\s*>", "call_close")).as_ref()
}

pub(crate) fn compile_regex(pattern: &str, label: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            error!("invalid agent regex {label}: {err}");
            None
        }
    }
}

/// Returns every well-formed call block in order of appearance.
pub fn parse_function_calls(text: &str) -> Vec<FunctionCall> {
    let (Some(open_tag), Some(close_tag)) = (open_tag_regex(), close_tag_regex()) else {
        return Vec::new();
    };

    let mut calls = Vec::new();
    let mut cursor = 0;
    while let Some(captures) = open_tag.captures(&text[cursor..]) {
        let (Some(tag), Some(name)) = (captures.get(0), captures.name("name")) else {
            break;
        };
        let body_start = cursor + tag.end();
        let name = name.as_str();

        let Some(close) = close_tag.find(&text[body_start..]) else {
            break;
        };
        let payload = &text[body_start..body_start + close.start()];
        if let Some(next_open) = payload.find(OPEN_TAG_PREFIX) {
            debug!(capability = name, "skipping call block without a closing tag");
            cursor = body_start + next_open;
            continue;
        }
        cursor = body_start + close.end();

        match serde_json::from_str::<Value>(payload.trim()) {
            Ok(Value::Object(parameters)) => {
                calls.push(FunctionCall { name: name.to_owned(), parameters });
            }
            Ok(_) => {
                debug!(capability = name, "dropping call block whose payload is not an object");
            }
            Err(err) => {
                debug!(capability = name, error = %err, "dropping call block with malformed payload");
            }
        }
    }

    calls
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_function_calls;

    #[test]
    fn plain_text_yields_no_calls() {
        assert!(parse_function_calls("AI is moving fast. [Source: AI Encyclopedia]").is_empty());
        assert!(parse_function_calls("").is_empty());
    }

    #[test]
    fn single_call_is_extracted() {
        let text = r#"Let me look that up. <call name="search">{"query":"artificial intelligence"}</call>"#;

        let calls = parse_function_calls(text);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].parameters.get("query"), Some(&json!("artificial intelligence")));
    }

    #[test]
    fn calls_preserve_order_of_appearance() {
        let text = concat!(
            r#"<call name="search">{"query":"a"}</call> then "#,
            r#"<call name="summarize">{"text":"b","style":"bullet"}</call> and "#,
            r#"<call name="searchNews">{"topic":"c"}</call>"#
        );

        let names =
            parse_function_calls(text).into_iter().map(|call| call.name).collect::<Vec<_>>();

        assert_eq!(names, vec!["search", "summarize", "searchNews"]);
    }

    #[test]
    fn malformed_payload_skips_only_that_block() {
        let text = concat!(
            r#"<call name="first">{"ok":1}</call>"#,
            r#"<call name="broken">{"query": </call>"#,
            r#"<call name="third">{"ok":3}</call>"#
        );

        let names =
            parse_function_calls(text).into_iter().map(|call| call.name).collect::<Vec<_>>();

        assert_eq!(names, vec!["first", "third"]);
    }

    #[test]
    fn non_object_payload_is_dropped() {
        let text = r#"<call name="search">["not","an","object"]</call><call name="x">42</call>"#;
        assert!(parse_function_calls(text).is_empty());
    }

    #[test]
    fn nested_braces_and_multiline_payloads_parse() {
        let text = "<call name=\"compareTexts\">\n  {\"text1\": \"a\", \"meta\": {\"inner\": {\"depth\": 2}}}\n</call>";

        let calls = parse_function_calls(text);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parameters["meta"]["inner"]["depth"], json!(2));
    }

    #[test]
    fn unterminated_tag_is_not_a_match() {
        let text = r#"<call name="search">{"query":"never closed"}"#;
        assert!(parse_function_calls(text).is_empty());
    }

    #[test]
    fn unterminated_tag_does_not_swallow_later_blocks() {
        let text = r#"<call name="a">{"x":1} then <call name="b">{"y":2}</call>"#;

        let names =
            parse_function_calls(text).into_iter().map(|call| call.name).collect::<Vec<_>>();

        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn unterminated_tag_between_valid_blocks_is_skipped() {
        let text = concat!(
            r#"<call name="first">{"ok":1}</call> "#,
            r#"<call name="dangling">{"ok":2} "#,
            r#"<call name="third">{"ok":3}</call>"#
        );

        let calls = parse_function_calls(text);

        let names = calls.iter().map(|call| call.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["first", "third"]);
        assert_eq!(calls[1].parameters.get("ok"), Some(&json!(3)));
    }

    #[test]
    fn tag_keywords_are_case_sensitive() {
        let text = r#"<CALL name="search">{"query":"x"}</CALL><Call name="search">{"query":"y"}</Call>"#;
        assert!(parse_function_calls(text).is_empty());
    }

    #[test]
    fn invalid_identifier_is_not_a_match() {
        let text = r#"<call name="9lives">{}</call><call name="has space">{}</call>"#;
        assert!(parse_function_calls(text).is_empty());
    }

    #[test]
    fn empty_object_payload_is_accepted() {
        let calls = parse_function_calls(r#"<call name="ping">{}</call>"#);

        assert_eq!(calls.len(), 1);
        assert!(calls[0].parameters.is_empty());
    }

    #[test]
    fn whitespace_around_attributes_and_closing_tag_is_tolerated() {
        let calls = parse_function_calls("<call   name=\"search\" >{\"query\":\"x\"}</call >");
        assert_eq!(calls.len(), 1);
    }
}
