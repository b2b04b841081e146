//! Prompt-shape conversions for backend quirks.
//!
//! Three transformations cover every backend in the vocabulary:
//!
//! - [`split_system`] — backends that treat the system message specially
//!   (Anthropic) get it extracted from the sequence.
//! - [`coalesce_same_role`] — backends that forbid consecutive same-role
//!   messages get adjacent runs joined.
//! - [`completion_prompt`] — pure-completion backends get the role-tagged
//!   sequence flattened into one prompt string.

use crate::provider::{ChatMessage, ChatRole};

/// Extract system content from a prompt sequence.
///
/// All system messages are joined with blank lines; the returned sequence
/// contains only user/assistant messages in their original order.
#[must_use]
pub fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<ChatMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut rest = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role == ChatRole::System {
            system_parts.push(&message.content);
        } else {
            rest.push(message.clone());
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, rest)
}

/// Join consecutive same-role messages with blank lines.
///
/// Anthropic rejects non-alternating role sequences; the engine can produce
/// them (e.g. a user message directly after a tool-result continuation).
#[must_use]
pub fn coalesce_same_role(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        match out.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => out.push(message),
        }
    }
    out
}

/// Flatten a role-tagged sequence into a single completion prompt.
///
/// Messages are joined with `System:` / `Human:` / `Assistant:` prefixes
/// and the prompt ends with a bare `Assistant:` line to cue the model.
#[must_use]
pub fn completion_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let prefix = match message.role {
            ChatRole::System => "System",
            ChatRole::User => "Human",
            ChatRole::Assistant => "Assistant",
        };
        prompt.push_str(prefix);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_system_extracts_and_joins() {
        let messages = vec![
            ChatMessage::system("You are a developer."),
            ChatMessage::user("hi"),
            ChatMessage::system("Be terse."),
            ChatMessage::assistant("hello"),
        ];
        let (system, rest) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("You are a developer.\n\nBe terse."));
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].role, ChatRole::User);
        assert_eq!(rest[1].role, ChatRole::Assistant);
    }

    #[test]
    fn split_system_none_when_absent() {
        let (system, rest) = split_system(&[ChatMessage::user("hi")]);
        assert!(system.is_none());
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn coalesce_joins_adjacent_runs() {
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::user("second"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("third"),
        ];
        let out = coalesce_same_role(messages);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].content, "first\n\nsecond");
        assert_eq!(out[1].content, "reply");
        assert_eq!(out[2].content, "third");
    }

    #[test]
    fn coalesce_leaves_alternating_untouched() {
        let messages = vec![ChatMessage::user("a"), ChatMessage::assistant("b")];
        assert_eq!(coalesce_same_role(messages.clone()), messages);
    }

    #[test]
    fn completion_prompt_prefixes_and_trailing_cue() {
        let messages = vec![
            ChatMessage::system("Rules."),
            ChatMessage::user("Question?"),
            ChatMessage::assistant("Answer."),
        ];
        let prompt = completion_prompt(&messages);
        assert_eq!(
            prompt,
            "System: Rules.\nHuman: Question?\nAssistant: Answer.\nAssistant:"
        );
    }

    #[test]
    fn completion_prompt_empty_sequence() {
        assert_eq!(completion_prompt(&[]), "Assistant:");
    }
}
