//! Tool-call extraction from free-form model output.
//!
//! Two syntaxes, parsed in a single pass over the text:
//!
//! 1. JSON blocks delimited by `<tool_call>…</tool_call>` holding an object
//!    with `name` and `arguments` (the latter possibly stringified JSON).
//! 2. Inline invocations of the form `@tool(args)`: triple-quoted multiline
//!    write/append, two-argument search, and quoted or unquoted
//!    single-argument forms.
//!
//! The parser is total: no panics, no partial results. Unknown tool names
//! in JSON blocks are ignored; a malformed JSON block falls through to the
//! inline phase. A later unquoted match that would produce the same
//! `(tool, arg)` as an earlier quoted match is suppressed.

use std::collections::HashSet;
use std::sync::LazyLock;

use hive_core::tools::{ToolCall, ToolName};
use regex::Regex;
use serde_json::Value;

/// Wrapper tokens some models emit around inline invocations. Stripped
/// before the inline phase.
const WRAPPERS: [&str; 6] = [
    "<tool_call>",
    "</tool_call>",
    "<|tool_call|>",
    "<tool_use>",
    "[TOOL_CALL]",
    "[TOOL_CALLS]",
];

static RE_MULTILINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)@(write_file|append_file)\(\s*([^,]+?)\s*,\s*"""(.*?)"""\s*\)"#)
        .expect("static regex")
});
static RE_SEARCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@search_files\(\s*([^,()\n]+?)\s*,\s*([^()\n]+?)\s*\)").expect("static regex")
});
static RE_DOUBLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@(read_file|list_dir|run_command|report_error)\(\s*"((?:[^"\\]|\\.)*)"\s*\)"#)
        .expect("static regex")
});
static RE_SINGLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(read_file|list_dir|run_command|report_error)\(\s*'((?:[^'\\]|\\.)*)'\s*\)")
        .expect("static regex")
});
static RE_UNQUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(read_file|list_dir|run_command|report_error)\(([^)]*)\)").expect("static regex")
});

/// Extract every tool call from `text`, in textual order.
#[must_use]
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut accepted: Vec<(usize, usize, ToolCall)> = Vec::new();
    let mut masked = text.as_bytes().to_vec();

    parse_json_blocks(text, &mut masked, &mut accepted);

    let inline_text = strip_wrappers(&masked);
    parse_inline(&inline_text, &mut accepted);

    accepted.sort_by_key(|(start, _, _)| *start);
    accepted.into_iter().map(|(_, _, call)| call).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 1: JSON blocks
// ─────────────────────────────────────────────────────────────────────────────

fn parse_json_blocks(
    text: &str,
    masked: &mut [u8],
    accepted: &mut Vec<(usize, usize, ToolCall)>,
) {
    const OPEN: &str = "<tool_call>";
    const CLOSE: &str = "</tool_call>";

    let mut cursor = 0;
    while let Some(open_rel) = text[cursor..].find(OPEN) {
        let open = cursor + open_rel;
        let inner_start = open + OPEN.len();
        let Some(close_rel) = text[inner_start..].find(CLOSE) else {
            break;
        };
        let inner_end = inner_start + close_rel;
        let span_end = inner_end + CLOSE.len();
        let inner = text[inner_start..inner_end].trim();

        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            // Valid JSON consumes the block whether or not the name is known.
            if let Some(call) = call_from_json(&value) {
                accepted.push((open, span_end, call));
            }
            blank(masked, open, span_end);
            cursor = span_end;
        } else {
            // Malformed block: leave it for the inline phase.
            cursor = inner_start;
        }
    }
}

/// Build a call from a parsed JSON block. `None` for unknown or absent
/// tool names.
fn call_from_json(value: &Value) -> Option<ToolCall> {
    let tool = ToolName::parse(value.get("name")?.as_str()?)?;

    // Arguments may arrive as an object or as stringified JSON.
    let arguments = match value.get("arguments") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Some(ToolCall::new(tool, positional_args(tool, &arguments)))
}

/// Map named JSON keys (with aliases) onto the tool's positional vector.
fn positional_args(tool: ToolName, arguments: &Value) -> Vec<String> {
    let lookup = |aliases: &[&str]| -> String {
        for key in aliases {
            if let Some(value) = arguments.get(*key) {
                return match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
        String::new()
    };

    match tool {
        ToolName::ReadFile | ToolName::ListDir => vec![lookup(&["path", "file", "filename"])],
        ToolName::WriteFile | ToolName::AppendFile => {
            vec![lookup(&["path", "file", "filename"]), lookup(&["content"])]
        }
        ToolName::SearchFiles => vec![lookup(&["pattern", "glob"]), lookup(&["query", "search"])],
        ToolName::RunCommand => vec![lookup(&["command", "cmd"])],
        ToolName::ReportError => vec![lookup(&["description", "message", "error"])],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 2: inline invocations
// ─────────────────────────────────────────────────────────────────────────────

fn parse_inline(text: &str, accepted: &mut Vec<(usize, usize, ToolCall)>) {
    // (start, end, priority, quoted, call) — lower priority wins at equal
    // starts, so specific forms beat the unquoted catch-all.
    let mut candidates: Vec<(usize, usize, u8, bool, ToolCall)> = Vec::new();

    for captures in RE_MULTILINE.captures_iter(text) {
        let (Some(m), Some(tool)) = (captures.get(0), ToolName::parse(&captures[1])) else {
            continue;
        };
        let call = ToolCall::new(
            tool,
            vec![captures[2].trim().to_owned(), captures[3].to_owned()],
        );
        candidates.push((m.start(), m.end(), 0, true, call));
    }
    for captures in RE_SEARCH.captures_iter(text) {
        let Some(m) = captures.get(0) else { continue };
        let call = ToolCall::new(
            ToolName::SearchFiles,
            vec![captures[1].trim().to_owned(), captures[2].trim().to_owned()],
        );
        candidates.push((m.start(), m.end(), 1, true, call));
    }
    for (regex, priority) in [(&RE_DOUBLE_QUOTED, 2u8), (&RE_SINGLE_QUOTED, 3u8)] {
        for captures in regex.captures_iter(text) {
            let (Some(m), Some(tool)) = (captures.get(0), ToolName::parse(&captures[1])) else {
                continue;
            };
            let call = ToolCall::new(tool, vec![unescape(&captures[2])]);
            candidates.push((m.start(), m.end(), priority, true, call));
        }
    }
    for captures in RE_UNQUOTED.captures_iter(text) {
        let (Some(m), Some(tool)) = (captures.get(0), ToolName::parse(&captures[1])) else {
            continue;
        };
        let call = ToolCall::new(tool, vec![captures[2].trim().to_owned()]);
        candidates.push((m.start(), m.end(), 4, false, call));
    }

    candidates.sort_by_key(|(start, _, priority, _, _)| (*start, *priority));

    let mut quoted_seen: HashSet<(ToolName, String)> = HashSet::new();
    for (start, end, _, quoted, call) in candidates {
        let overlaps = accepted
            .iter()
            .any(|(a_start, a_end, _)| start < *a_end && *a_start < end);
        if overlaps {
            continue;
        }
        if quoted {
            if let Some(arg) = call.args.first() {
                let _ = quoted_seen.insert((call.tool, arg.clone()));
            }
        } else if call
            .args
            .first()
            .is_some_and(|arg| quoted_seen.contains(&(call.tool, arg.clone())))
        {
            continue;
        }
        accepted.push((start, end, call));
    }
}

/// Blank a byte span with spaces so later phases skip it while every other
/// match keeps its offset.
fn blank(masked: &mut [u8], start: usize, end: usize) {
    for byte in &mut masked[start..end] {
        *byte = b' ';
    }
}

/// Remove wrapper tokens, preserving offsets.
fn strip_wrappers(masked: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(masked).into_owned();
    for wrapper in WRAPPERS {
        while let Some(pos) = text.find(wrapper) {
            text.replace_range(pos..pos + wrapper.len(), &" ".repeat(wrapper.len()));
        }
    }
    text
}

/// Resolve backslash escapes inside a quoted argument.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> ToolCall {
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1, "expected one call in {text:?}");
        calls.into_iter().next().unwrap()
    }

    // -- JSON blocks --

    #[test]
    fn json_block_with_object_arguments() {
        let call = single(
            r#"<tool_call>{"name": "read_file", "arguments": {"path": "src/main.rs"}}</tool_call>"#,
        );
        assert_eq!(call.tool, ToolName::ReadFile);
        assert_eq!(call.args, vec!["src/main.rs"]);
    }

    #[test]
    fn json_block_with_stringified_arguments() {
        let call = single(
            r#"<tool_call>{"name": "run_command", "arguments": "{\"command\": \"cargo test\"}"}</tool_call>"#,
        );
        assert_eq!(call.tool, ToolName::RunCommand);
        assert_eq!(call.args, vec!["cargo test"]);
    }

    #[test]
    fn json_block_key_aliases() {
        let call = single(
            r#"<tool_call>{"name": "write_file", "arguments": {"filename": "a.txt", "content": "hi"}}</tool_call>"#,
        );
        assert_eq!(call.args, vec!["a.txt", "hi"]);

        let call = single(
            r#"<tool_call>{"name": "search_files", "arguments": {"glob": "*.rs", "search": "todo"}}</tool_call>"#,
        );
        assert_eq!(call.args, vec!["*.rs", "todo"]);

        let call = single(
            r#"<tool_call>{"name": "report_error", "arguments": {"message": "stuck"}}</tool_call>"#,
        );
        assert_eq!(call.args, vec!["stuck"]);
    }

    #[test]
    fn json_block_unknown_name_is_ignored() {
        let calls = parse_tool_calls(
            r#"<tool_call>{"name": "rm_everything", "arguments": {}}</tool_call>"#,
        );
        assert!(calls.is_empty());
    }

    #[test]
    fn malformed_json_block_falls_through_to_inline() {
        let calls = parse_tool_calls("<tool_call>@read_file(README.md)</tool_call>");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, ToolName::ReadFile);
        assert_eq!(calls[0].args, vec!["README.md"]);
    }

    // -- Inline forms --

    #[test]
    fn inline_unquoted() {
        let call = single("Let me check. @read_file(README.md)");
        assert_eq!(call.tool, ToolName::ReadFile);
        assert_eq!(call.args, vec!["README.md"]);
    }

    #[test]
    fn inline_double_quoted_with_escapes() {
        let call = single(r#"@run_command("echo \"hello\"")"#);
        assert_eq!(call.args, vec![r#"echo "hello""#]);
    }

    #[test]
    fn inline_single_quoted() {
        let call = single("@list_dir('src')");
        assert_eq!(call.tool, ToolName::ListDir);
        assert_eq!(call.args, vec!["src"]);
    }

    #[test]
    fn inline_multiline_triple_quoted() {
        let text = "@write_file(src/lib.rs, \"\"\"fn answer() -> u32 {\n    42\n}\n\"\"\")";
        let call = single(text);
        assert_eq!(call.tool, ToolName::WriteFile);
        assert_eq!(call.args[0], "src/lib.rs");
        assert_eq!(call.args[1], "fn answer() -> u32 {\n    42\n}\n");
    }

    #[test]
    fn inline_append_triple_quoted_keeps_parens_in_content() {
        let call = single("@append_file(notes.md, \"\"\"f(x) = y\"\"\")");
        assert_eq!(call.tool, ToolName::AppendFile);
        assert_eq!(call.args[1], "f(x) = y");
    }

    #[test]
    fn inline_search_two_args() {
        let call = single("@search_files(*.rs, async fn)");
        assert_eq!(call.tool, ToolName::SearchFiles);
        assert_eq!(call.args, vec!["*.rs", "async fn"]);
    }

    #[test]
    fn wrapper_prefixes_are_stripped() {
        for wrapper in ["<|tool_call|>", "<tool_use>", "[TOOL_CALL]", "[TOOL_CALLS]"] {
            let text = format!("{wrapper}@read_file(a.txt)");
            let call = single(&text);
            assert_eq!(call.args, vec!["a.txt"]);
        }
    }

    #[test]
    fn quoted_suppresses_later_unquoted_duplicate() {
        let calls = parse_tool_calls("@read_file(\"a.txt\") and again @read_file(a.txt)");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["a.txt"]);
    }

    #[test]
    fn distinct_unquoted_call_survives_dedup() {
        let calls = parse_tool_calls("@read_file(\"a.txt\") then @read_file(b.txt)");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec!["b.txt"]);
    }

    // -- Ordering and mixing --

    #[test]
    fn calls_come_back_in_textual_order() {
        let text = "@list_dir(.)\nthen\n@read_file(Cargo.toml)\nthen\n@run_command(cargo check)";
        let calls = parse_tool_calls(text);
        let tools: Vec<ToolName> = calls.iter().map(|c| c.tool).collect();
        assert_eq!(
            tools,
            vec![ToolName::ListDir, ToolName::ReadFile, ToolName::RunCommand]
        );
    }

    #[test]
    fn json_and_inline_mix_preserves_order() {
        let text = concat!(
            "@list_dir(src)\n",
            r#"<tool_call>{"name": "read_file", "arguments": {"path": "a.rs"}}</tool_call>"#,
            "\n@run_command(ls)",
        );
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].tool, ToolName::ListDir);
        assert_eq!(calls[1].tool, ToolName::ReadFile);
        assert_eq!(calls[2].tool, ToolName::RunCommand);
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(parse_tool_calls("I'll read the file and get back to you.").is_empty());
        assert!(parse_tool_calls("").is_empty());
    }

    #[test]
    fn email_like_text_does_not_match() {
        assert!(parse_tool_calls("contact me @example(com)").is_empty());
    }

    // -- Round-trip --

    #[test]
    fn parse_serialise_reparse_is_identity() {
        let text = concat!(
            "@read_file(Cargo.toml)\n",
            "@write_file(src/a.rs, \"\"\"mod a;\nfn f() {}\n\"\"\")\n",
            "@search_files(*.toml, version)\n",
            "@run_command(cargo build)\n",
            "@report_error(missing linker)",
        );
        let first = parse_tool_calls(text);
        assert_eq!(first.len(), 5);

        let rendered: Vec<String> = first.iter().map(ToolCall::to_inline).collect();
        let second = parse_tool_calls(&rendered.join("\n"));
        assert_eq!(first, second);
    }
}
