//! Delegation extraction from leader output.
//!
//! Matches `@delegate(Agent, "task")`: the agent is everything up to the
//! first comma (trimmed); the task is a single- or double-quoted string
//! with backslash escapes; the closing quote must be followed by optional
//! whitespace and `)`.
//!
//! Text inside triple-backtick fenced blocks and inline backtick spans is
//! excluded from matching, so documentation and examples in the model's
//! prose never trigger delegations. Once a match starts outside code, its
//! quoted task is read verbatim.
//!
//! The function is pure and total. In the streaming path it is called on a
//! monotonically growing prefix after each chunk; the caller tracks how
//! many delegations it has already dispatched and only acts on indices at
//! or beyond that count.

use hive_core::delegation::Delegation;

const NEEDLE: &str = "@delegate(";
const FENCE: &str = "```";

/// Extract every delegation from `text`, in textual order.
#[must_use]
pub fn parse_delegations(text: &str) -> Vec<Delegation> {
    let mut out = Vec::new();
    let mut in_fence = false;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];

        if rest.starts_with(FENCE) {
            in_fence = !in_fence;
            i += FENCE.len();
            continue;
        }
        if in_fence {
            i += char_len(rest);
            continue;
        }
        if rest.starts_with('`') {
            // Inline code span: skip to the closing backtick. An
            // unterminated span masks the rest of the buffer, which keeps
            // incremental calls consistent with the final parse.
            match rest[1..].find('`') {
                Some(close) => i += close + 2,
                None => break,
            }
            continue;
        }
        if rest.starts_with(NEEDLE) {
            if let Some((delegation, consumed)) = parse_one(&rest[NEEDLE.len()..]) {
                out.push(delegation);
                i += NEEDLE.len() + consumed;
                continue;
            }
        }
        i += char_len(rest);
    }

    out
}

fn char_len(rest: &str) -> usize {
    rest.chars().next().map_or(1, char::len_utf8)
}

/// Parse the argument list after `@delegate(`. Returns the delegation and
/// how many bytes were consumed, through the closing `)`.
fn parse_one(args: &str) -> Option<(Delegation, usize)> {
    // Agent name: everything up to the first comma. A `)` before any comma
    // means this is not a delegation.
    let comma = args.find(',')?;
    if args[..comma].contains(')') {
        return None;
    }
    let agent = args[..comma].trim();
    if agent.is_empty() {
        return None;
    }

    let mut i = comma + 1;
    i += count_leading_whitespace(&args[i..]);

    let quote = args[i..].chars().next().filter(|c| *c == '"' || *c == '\'')?;
    i += 1;

    // Quoted task with backslash escapes.
    let mut task = String::new();
    let mut chars = args[i..].char_indices();
    let close_offset = loop {
        let (offset, c) = chars.next()?;
        if c == '\\' {
            let (_, escaped) = chars.next()?;
            task.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
        } else if c == quote {
            break offset;
        } else {
            task.push(c);
        }
    };
    i += close_offset + 1;

    // Only accept when optional whitespace then `)` follows.
    i += count_leading_whitespace(&args[i..]);
    if !args[i..].starts_with(')') {
        return None;
    }

    Some((Delegation::new(agent, task), i + 1))
}

fn count_leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> Delegation {
        let found = parse_delegations(text);
        assert_eq!(found.len(), 1, "expected one delegation in {text:?}");
        found.into_iter().next().unwrap()
    }

    #[test]
    fn basic_double_quoted() {
        let d = single(r#"@delegate(Developer, "implement the parser")"#);
        assert_eq!(d.agent, "Developer");
        assert_eq!(d.task, "implement the parser");
    }

    #[test]
    fn single_quoted_task() {
        let d = single("@delegate(QA, 'run the tests')");
        assert_eq!(d.agent, "QA");
        assert_eq!(d.task, "run the tests");
    }

    #[test]
    fn agent_name_is_trimmed() {
        let d = single(r#"@delegate(  Data Analyst , "crunch numbers")"#);
        assert_eq!(d.agent, "Data Analyst");
    }

    #[test]
    fn escaped_quotes_inside_task() {
        let d = single(r#"@delegate(Dev, "rename \"old\" to \"new\"")"#);
        assert_eq!(d.task, r#"rename "old" to "new""#);
    }

    #[test]
    fn embedded_other_quote_style() {
        let d = single(r#"@delegate(Dev, "use the 'fast' path")"#);
        assert_eq!(d.task, "use the 'fast' path");
    }

    #[test]
    fn whitespace_before_closing_paren() {
        let d = single("@delegate(Dev, \"task\"  )");
        assert_eq!(d.task, "task");
    }

    #[test]
    fn task_with_parens_and_commas() {
        let d = single(r#"@delegate(Dev, "refactor f(a, b) carefully")"#);
        assert_eq!(d.task, "refactor f(a, b) carefully");
    }

    #[test]
    fn multiple_in_textual_order() {
        let text = r#"
First: @delegate(D1, "task one")
then @delegate(D1, "task two") and @delegate(D2, "task three").
"#;
        let found = parse_delegations(text);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].task, "task one");
        assert_eq!(found[1].task, "task two");
        assert_eq!(found[2].agent, "D2");
    }

    // -- rejection --

    #[test]
    fn unquoted_task_is_rejected() {
        assert!(parse_delegations("@delegate(Dev, do the thing)").is_empty());
    }

    #[test]
    fn missing_closing_paren_is_rejected() {
        assert!(parse_delegations(r#"@delegate(Dev, "task" extra)"#).is_empty());
        assert!(parse_delegations(r#"@delegate(Dev, "task""#).is_empty());
    }

    #[test]
    fn missing_comma_is_rejected() {
        assert!(parse_delegations(r#"@delegate(Dev "task")"#).is_empty());
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(parse_delegations("I will delegate this later.").is_empty());
        assert!(parse_delegations("").is_empty());
    }

    // -- code exclusion --

    #[test]
    fn fenced_block_is_excluded() {
        let text = r#"
Here is how delegation works:
```
@delegate(Developer, "example task")
```
Now for real: @delegate(QA, "run tests")
"#;
        let found = parse_delegations(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent, "QA");
    }

    #[test]
    fn fenced_block_with_language_tag_is_excluded() {
        let text = "```markdown\n@delegate(Dev, \"demo\")\n```";
        assert!(parse_delegations(text).is_empty());
    }

    #[test]
    fn inline_span_is_excluded() {
        let text = r#"The syntax is `@delegate(Name, "task")` as shown."#;
        assert!(parse_delegations(text).is_empty());
    }

    #[test]
    fn unterminated_fence_masks_the_tail() {
        let text = "```\n@delegate(Dev, \"hidden\")";
        assert!(parse_delegations(text).is_empty());
    }

    #[test]
    fn prefixing_any_fenced_block_changes_nothing() {
        let real = r#"@delegate(QA, "run tests") and @delegate(Dev, "fix bug")"#;
        let baseline = parse_delegations(real);

        let noisy = format!(
            "```\n@delegate(Ghost, \"never\")\n@delegate(Another, 'nope')\n```\n{real}"
        );
        assert_eq!(parse_delegations(&noisy), baseline);
    }

    // -- incremental contract --

    #[test]
    fn growing_prefix_is_monotonic() {
        let full = r#"@delegate(D1, "one") middle @delegate(D2, "two")"#;
        let mut dispatched = 0;
        let mut seen: Vec<Delegation> = Vec::new();

        for end in 1..=full.len() {
            if !full.is_char_boundary(end) {
                continue;
            }
            let found = parse_delegations(&full[..end]);
            for d in found.into_iter().skip(dispatched) {
                seen.push(d);
                dispatched += 1;
            }
        }

        assert_eq!(dispatched, 2);
        assert_eq!(seen[0].agent, "D1");
        assert_eq!(seen[1].agent, "D2");
    }
}
