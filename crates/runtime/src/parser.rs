//! Model-output parser.
//!
//! A reply is free text optionally followed by one tool-call block:
//!
//! ```text
//! Saving that for you.
//! <tool_code>
//! [{"name": "MEMORY_WRITE", "params": {"new_memory": {"city": "Lisbon"}}}]
//! </tool_code>
//! ```
//!
//! Only the first block is honoured. Anything after it is discarded.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use sc_domain::ActionCall;

/// Minimum share of printable characters in a reply.
pub const MIN_PRINTABLE_RATIO: f64 = 0.8;

/// Minimum reply length, in characters, after trimming.
pub const MIN_REPLY_CHARS: usize = 2;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("empty response")]
    Empty,
    #[error("response too short ({0} chars)")]
    TooShort(usize),
    #[error("response looks garbled ({:.0}% printable)", .0 * 100.0)]
    Unprintable(f64),
    #[error("invalid tool_code block: {0}")]
    Actions(#[from] serde_json::Error),
    #[error("invalid tool_code block: expected a list of actions")]
    NotAList,
    #[error("tool_code pattern: {0}")]
    Pattern(regex::Error),
}

/// Parsed model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub message: String,
    /// `None` when the reply carried no tool-call block at all.
    pub actions: Option<Vec<ActionCall>>,
}

fn tool_block() -> Result<&'static Regex, ParseError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tool_code>\s*(.*?)\s*</tool_code>"))
        .as_ref()
        .map_err(|e| ParseError::Pattern(e.clone()))
}

/// Newline, tab and visible characters. Control and format characters,
/// line/paragraph separators, non-ASCII spaces and private-use code points
/// are not printable.
fn is_printable(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return true;
    }
    !(c.is_control() || is_format(c) || (c.is_whitespace() && c != ' ') || is_private_use(c))
}

/// General category Cf.
fn is_format(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

fn is_private_use(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// Split a raw model reply into its message and optional action list.
pub fn parse(raw: &str) -> Result<ParsedResponse, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let total = text.chars().count();
    if total < MIN_REPLY_CHARS {
        return Err(ParseError::TooShort(total));
    }

    let printable = text.chars().filter(|c| is_printable(*c)).count();
    let ratio = printable as f64 / total as f64;
    if ratio < MIN_PRINTABLE_RATIO {
        return Err(ParseError::Unprintable(ratio));
    }

    let Some(caps) = tool_block()?.captures(text) else {
        return Ok(ParsedResponse {
            message: text.to_string(),
            actions: None,
        });
    };

    let (block, body) = match (caps.get(0), caps.get(1)) {
        (Some(block), Some(body)) => (block, body.as_str()),
        _ => {
            return Ok(ParsedResponse {
                message: text.to_string(),
                actions: None,
            })
        }
    };

    let message = text[..block.start()].trim().to_string();
    let actions = decode_actions(body)?;

    Ok(ParsedResponse {
        message,
        actions: Some(actions),
    })
}

/// Decode a block body. A lone object is accepted as a one-element list.
fn decode_actions(body: &str) -> Result<Vec<ActionCall>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(ParseError::NotAList),
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<ActionCall>(item)
                .map(ActionCall::normalized)
                .map_err(ParseError::from)
        })
        .collect()
}

/// Render calls as a tool-call block, the inverse of [`parse`].
pub fn render_block(calls: &[ActionCall]) -> Result<String, ParseError> {
    Ok(format!(
        "<tool_code>\n{}\n</tool_code>",
        serde_json::to_string_pretty(calls)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_and_whitespace_fail() {
        assert!(matches!(parse(""), Err(ParseError::Empty)));
        assert!(matches!(parse("   \n\t  "), Err(ParseError::Empty)));
    }

    #[test]
    fn single_char_fails() {
        assert!(matches!(parse("k"), Err(ParseError::TooShort(1))));
        assert!(matches!(parse("  é  "), Err(ParseError::TooShort(1))));
    }

    #[test]
    fn two_chars_is_enough() {
        let parsed = parse("ok").unwrap();
        assert_eq!(parsed.message, "ok");
        assert!(parsed.actions.is_none());
    }

    #[test]
    fn garbled_output_fails() {
        let raw = "ab\u{0}\u{1}\u{2}\u{3}\u{7}\u{8}";
        assert!(matches!(parse(raw), Err(ParseError::Unprintable(_))));
    }

    #[test]
    fn invisible_characters_are_not_printable() {
        let raw = "ok\u{200D}\u{200B}\u{FEFF}\u{2028}\u{2029}\u{00A0}\u{3000}\u{E000}";
        assert!(matches!(parse(raw), Err(ParseError::Unprintable(_))));
        assert!(!is_printable('\u{00AD}'));
        assert!(!is_printable('\u{E0041}'));
        assert!(is_printable(' '));
        assert!(is_printable('é'));
        assert!(is_printable('😀'));
    }

    #[test]
    fn mostly_printable_passes() {
        // 9 printable of 10 chars.
        let raw = "abcdefghi\u{1}";
        assert!(parse(raw).is_ok());
    }

    #[test]
    fn newlines_and_tabs_count_as_printable() {
        let raw = "line one\n\tline two\n\tline three";
        assert_eq!(parse(raw).unwrap().message, raw);
    }

    #[test]
    fn scenario_done_with_empty_block() {
        let parsed = parse("Done.\n<tool_code>[]</tool_code>").unwrap();
        assert_eq!(parsed.message, "Done.");
        assert_eq!(parsed.actions, Some(vec![]));
    }

    #[test]
    fn block_is_case_insensitive_and_spans_lines() {
        let raw = "Saving.\n<TOOL_CODE>\n[\n  {\"name\": \"memory_write\",\n   \"params\": {\"new_memory\": {\"k\": \"v\"}}}\n]\n</Tool_Code>";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.message, "Saving.");
        let actions = parsed.actions.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "MEMORY_WRITE");
        assert_eq!(actions[0].params["new_memory"], json!({"k": "v"}));
    }

    #[test]
    fn only_first_block_is_honoured() {
        let raw = "Hi <tool_code>[{\"name\":\"A\"}]</tool_code> trailing <tool_code>[{\"name\":\"B\"}]</tool_code>";
        let actions = parse(raw).unwrap().actions.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "A");
    }

    #[test]
    fn text_after_block_is_discarded() {
        let parsed = parse("Before.<tool_code>[]</tool_code>After.").unwrap();
        assert_eq!(parsed.message, "Before.");
    }

    #[test]
    fn block_with_no_message() {
        let parsed = parse("<tool_code>[{\"name\":\"PING\"}]</tool_code>").unwrap();
        assert_eq!(parsed.message, "");
        assert!(parsed.actions.unwrap()[0].params.is_empty());
    }

    #[test]
    fn invalid_json_in_block_fails() {
        let err = parse("Hi <tool_code>[{name: PING}]</tool_code>").unwrap_err();
        assert!(matches!(err, ParseError::Actions(_)));
        assert!(err.to_string().starts_with("invalid tool_code block"));
    }

    #[test]
    fn empty_block_fails() {
        assert!(matches!(
            parse("Hi <tool_code>   </tool_code>"),
            Err(ParseError::Actions(_))
        ));
    }

    #[test]
    fn scalar_block_fails() {
        assert!(matches!(
            parse("Hi <tool_code>42</tool_code>"),
            Err(ParseError::NotAList)
        ));
    }

    #[test]
    fn item_without_name_fails() {
        assert!(matches!(
            parse("Hi <tool_code>[{\"params\": {}}]</tool_code>"),
            Err(ParseError::Actions(_))
        ));
    }

    #[test]
    fn lone_object_is_one_action() {
        let actions = parse("Hi <tool_code>{\"name\":\"hello_world\"}</tool_code>")
            .unwrap()
            .actions
            .unwrap();
        assert_eq!(actions, vec![ActionCall::new("HELLO_WORLD", Map::new())]);
    }

    #[test]
    fn unclosed_block_is_plain_text() {
        let raw = "Hmm <tool_code>[{\"name\":\"A\"}]";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.message, raw);
        assert!(parsed.actions.is_none());
    }

    #[test]
    fn render_then_parse_preserves_calls_and_message() {
        let calls = vec![
            ActionCall::new("MEMORY_WRITE", params(json!({"new_memory": {"a": 1}}))),
            ActionCall::new("HELLO_WORLD", Map::new()),
        ];
        let raw = format!("Working on it.  \n\n{}", render_block(&calls).unwrap());
        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.message, "Working on it.");
        assert_eq!(parsed.actions, Some(calls));
    }
}
