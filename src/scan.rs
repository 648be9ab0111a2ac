//! Brace-balanced JSON extraction
//!
//! LLM replies wrap JSON in prose, markdown fences, or `TOOL_CALL:` markers.
//! This module walks the text with an explicit scanner state machine
//! (`Normal` / `InString` / `Escape`) tracking brace depth, so nested objects
//! and escaped quotes inside strings do not break extraction.

use serde_json::{Map, Value};

/// Marker preceding a free-text tool call in assistant content
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

/// Scanner state while walking candidate JSON text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Outside any string literal
    Normal,
    /// Inside a string literal
    InString,
    /// Immediately after a backslash inside a string
    Escape,
}

/// A tool call parsed from a free-text `TOOL_CALL:` block
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    /// Tool name
    pub name: String,
    /// Tool arguments
    pub args: Map<String, Value>,
}

/// Find the end (exclusive byte offset) of the balanced object starting at
/// `start`, which must point at a `{`.
///
/// Returns `None` when the text ends before the braces balance.
pub fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    if !text[start..].starts_with('{') {
        return None;
    }

    let mut state = ScanState::Normal;
    let mut depth: usize = 0;

    for (offset, ch) in text[start..].char_indices() {
        match state {
            ScanState::Escape => state = ScanState::InString,
            ScanState::InString => match ch {
                '\\' => state = ScanState::Escape,
                '"' => state = ScanState::Normal,
                _ => {}
            },
            ScanState::Normal => match ch {
                '"' => state = ScanState::InString,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(start + offset + ch.len_utf8());
                    }
                }
                _ => {}
            },
        }
    }

    None
}

/// Extract the first balanced `{…}` block from the text.
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = balanced_object_end(text, start)?;
    Some(&text[start..end])
}

/// Extract every `TOOL_CALL: { … }` block from assistant content.
///
/// Each candidate must parse as a JSON object with a string `name` and an
/// object `args`; candidates that fail to parse are dropped and scanning
/// continues with the rest of the text.
pub fn extract_tool_call_blocks(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(TOOL_CALL_MARKER) {
        let marker_end = cursor + found + TOOL_CALL_MARKER.len();
        cursor = marker_end;

        let after = &text[marker_end..];
        let Some(ws) = after.find(|c: char| !c.is_whitespace()) else {
            break;
        };
        let object_start = marker_end + ws;
        if !text[object_start..].starts_with('{') {
            continue;
        }

        let Some(object_end) = balanced_object_end(text, object_start) else {
            continue;
        };

        if let Some(call) = parse_candidate(&text[object_start..object_end]) {
            calls.push(call);
            cursor = object_end;
        }
    }

    calls
}

fn parse_candidate(candidate: &str) -> Option<ParsedToolCall> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.to_string();
    let args = object.get("args")?.as_object()?.clone();
    Some(ParsedToolCall { name, args })
}
