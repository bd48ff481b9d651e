//! Locating structured content inside free-form model replies

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

lazy_static! {
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
}

/// Narrows a reply down to the text most likely to hold a JSON document
///
/// A ```` ```json ```` fence wins over a bare ```` ``` ```` fence. Inside
/// whatever remains, the span from the first `{` to the last `}` is taken.
/// Without braces the trimmed text is returned as is.
pub fn extract_json_block(raw: &str) -> &str {
    let unfenced = fenced_block(raw, "```json")
        .or_else(|| fenced_block(raw, "```"))
        .unwrap_or(raw);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if end > start => &unfenced[start..=end],
        _ => unfenced.trim(),
    }
}

fn fenced_block<'a>(raw: &'a str, opener: &str) -> Option<&'a str> {
    let start = raw.find(opener)? + opener.len();
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Parses JSON, retrying once with trailing commas removed
pub fn parse_json_lenient(text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(first) => {
            let cleaned = strip_trailing_commas(text);
            if matches!(cleaned, Cow::Borrowed(_)) {
                debug!("Reply is not JSON: {}", first);
                return None;
            }
            match serde_json::from_str(&cleaned) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Reply is not JSON even after cleanup: {}", e);
                    None
                }
            }
        }
    }
}

fn strip_trailing_commas(text: &str) -> Cow<'_, str> {
    TRAILING_COMMA.replace_all(text, "$1")
}

/// Pulls a JSON value out of a model reply
///
/// The narrowed block is tried first, then the whole trimmed reply, so a
/// top-level array is still recovered.
pub fn extract_json(raw: &str) -> Option<Value> {
    let block = extract_json_block(raw);
    parse_json_lenient(block).or_else(|| {
        let whole = raw.trim();
        if whole == block {
            None
        } else {
            parse_json_lenient(whole)
        }
    })
}

const GOAL_MARKER: &str = "# Goal:";

/// Finds a revised Markdown plan embedded in a chat reply
///
/// Returns the text from `# Goal:` onwards, but only when that text also has
/// month and week headings.
pub fn extract_markdown_plan(reply: &str) -> Option<&str> {
    let start = reply.find(GOAL_MARKER)?;
    let candidate = &reply[start..];
    if candidate.contains("## Month") && candidate.contains("### Week") {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_prefers_json_fence() {
        let raw = "Here you go:\n```\nnot this\n```\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_bare_fence() {
        let raw = "```\n{\"months\": []}\n```\nHope that helps!";
        assert_eq!(extract_json_block(raw), "{\"months\": []}");
    }

    #[test]
    fn test_extract_braces_from_prose() {
        let raw = "Sure! {\"a\": {\"b\": 2}} Let me know.";
        assert_eq!(extract_json_block(raw), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_extract_without_braces() {
        assert_eq!(extract_json_block("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn test_lenient_trailing_commas() {
        let value = parse_json_lenient("{\"weeks\": [1, 2,], \"x\": {\"y\": 1,},}").unwrap();
        assert_eq!(value, json!({"weeks": [1, 2], "x": {"y": 1}}));
        assert!(parse_json_lenient("{nope}").is_none());
    }

    #[test]
    fn test_extract_json_top_level_array() {
        let value = extract_json("[{\"a\": 1}, {\"b\": 2}]").unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_extract_markdown_plan() {
        let reply = "Sure, here's the update.\n\n# Goal: Run\n## Month 1: Base\n### Week 1: Easy\n- jog";
        assert_eq!(
            extract_markdown_plan(reply),
            Some("# Goal: Run\n## Month 1: Base\n### Week 1: Easy\n- jog")
        );

        assert_eq!(extract_markdown_plan("# Goal: Run\n## Month 1: Base"), None);
        assert_eq!(extract_markdown_plan("No plan here"), None);
    }
}
