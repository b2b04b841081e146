//! Prompt composition.
//!
//! Order: system instructions; roster + delegation lesson (leaders at the
//! top of the recursion only); reference documents; todo checkboxes;
//! project context + tool vocabulary (project-bound agents); the trailing
//! history window; the current user message.

use hive_core::agent::{Agent, SanitizedAgent};
use hive_core::config::SwarmConfig;
use hive_core::history::Role;
use hive_llm::provider::{ChatMessage, ChatRole};

const DELEGATION_LESSON: &str = "\
To delegate a subtask to another agent, write @delegate(AgentName, \"task description\") \
on its own line. The task runs on that agent and its response comes back to you. \
If an agent reports an error, decide whether to retry, reassign, or adjust your plan.";

const TOOL_DOCS: &str = "\
## Tools
You can operate on project files with these tools:
- @read_file(path) — read a file
- @write_file(path, \"\"\"content\"\"\") — write a file; content between triple quotes may span multiple lines
- @append_file(path, \"\"\"content\"\"\") — append to a file
- @list_dir(path) — list a directory
- @search_files(pattern, query) — search files matching a glob pattern for a text query
- @run_command(command) — run a shell command in the project root
- @report_error(description) — report that you are blocked

Use paths relative to the project root. Emit each tool invocation on its own line.";

/// Compose the prompt sequence for one turn.
///
/// `roster` is present only for leaders at recursion depth 0 and lists all
/// agents (the composer filters out the agent itself).
pub fn compose(
    agent: &Agent,
    roster: Option<&[SanitizedAgent]>,
    config: &SwarmConfig,
    message: &str,
) -> Vec<ChatMessage> {
    let mut system = agent.instructions.trim().to_owned();
    let mut push_section = |section: String| {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(&section);
    };

    if let Some(roster) = roster {
        let others: Vec<&SanitizedAgent> = roster.iter().filter(|a| a.id != agent.id).collect();
        if !others.is_empty() {
            let mut section = String::from("## Your team\n");
            for other in others {
                section.push_str(&format!(
                    "- {} ({}): {}\n",
                    other.name, other.role, other.description
                ));
            }
            section.push('\n');
            section.push_str(DELEGATION_LESSON);
            push_section(section);
        }
    }

    for doc in &agent.rag_docs {
        push_section(format!("## Reference: {}\n{}", doc.name, doc.content));
    }

    if !agent.todos.is_empty() {
        let mut section = String::from("## Todo list\n");
        for todo in &agent.todos {
            let mark = if todo.done { 'x' } else { ' ' };
            section.push_str(&format!("- [{mark}] {}\n", todo.text));
        }
        push_section(section.trim_end().to_owned());
    }

    if let Some(project) = &agent.project {
        push_section(format!(
            "## Project context\nYou are working in project \"{project}\". \
             All file operations are confined to this project.\n\n{TOOL_DOCS}"
        ));
    }

    let mut messages = Vec::with_capacity(agent.history.len() + 2);
    if !system.is_empty() {
        messages.push(ChatMessage::system(system));
    }

    let start = agent.history.len().saturating_sub(config.history_window);
    for entry in &agent.history[start..] {
        let role = match entry.role {
            Role::System => ChatRole::System,
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        };
        messages.push(ChatMessage {
            role,
            content: entry.content.clone(),
        });
    }

    messages.push(ChatMessage::user(message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::agent::{AgentSpec, ProviderKind, RagDoc, Todo};
    use hive_core::history::HistoryEntry;

    fn agent() -> Agent {
        let mut spec = AgentSpec::new("Lead", ProviderKind::LocalChat, "llama3.1");
        spec.instructions = Some("You coordinate the team.".into());
        spec.is_leader = Some(true);
        Agent::from_spec(spec)
    }

    fn teammate(name: &str) -> SanitizedAgent {
        let mut spec = AgentSpec::new(name, ProviderKind::LocalChat, "llama3.1");
        spec.role = Some("developer".into());
        spec.description = Some("writes code".into());
        Agent::from_spec(spec).sanitized()
    }

    #[test]
    fn instructions_open_the_system_message() {
        let messages = compose(&agent(), None, &SwarmConfig::default(), "hi");
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.starts_with("You coordinate the team."));
        assert_eq!(messages.last().unwrap().content, "hi");
    }

    #[test]
    fn roster_lists_other_agents_and_teaches_delegation() {
        let me = agent();
        let roster = vec![me.sanitized(), teammate("Dev"), teammate("QA")];
        let messages = compose(&me, Some(&roster), &SwarmConfig::default(), "go");

        let system = &messages[0].content;
        assert!(system.contains("## Your team"));
        assert!(system.contains("- Dev (developer): writes code"));
        assert!(system.contains("- QA (developer)"));
        assert!(system.contains("@delegate(AgentName, \"task description\")"));
        // Never lists itself.
        assert!(!system.contains("- Lead"));
    }

    #[test]
    fn empty_roster_of_others_is_omitted() {
        let me = agent();
        let roster = vec![me.sanitized()];
        let messages = compose(&me, Some(&roster), &SwarmConfig::default(), "go");
        assert!(!messages[0].content.contains("## Your team"));
    }

    #[test]
    fn rag_docs_and_todos_render_as_sections() {
        let mut me = agent();
        me.rag_docs.push(RagDoc::new("style", "tabs only"));
        me.todos.push(Todo::new("ship it"));
        let mut done = Todo::new("draft it");
        done.done = true;
        me.todos.push(done);

        let messages = compose(&me, None, &SwarmConfig::default(), "go");
        let system = &messages[0].content;
        assert!(system.contains("## Reference: style\ntabs only"));
        assert!(system.contains("- [ ] ship it"));
        assert!(system.contains("- [x] draft it"));
    }

    #[test]
    fn project_binding_brings_tool_docs() {
        let mut me = agent();
        me.project = Some("demo".into());
        let messages = compose(&me, None, &SwarmConfig::default(), "go");
        let system = &messages[0].content;
        assert!(system.contains("## Project context"));
        assert!(system.contains("\"demo\""));
        assert!(system.contains("@write_file(path, \"\"\"content\"\"\")"));
        assert!(system.contains("relative to the project root"));
    }

    #[test]
    fn no_project_means_no_tool_docs() {
        let messages = compose(&agent(), None, &SwarmConfig::default(), "go");
        assert!(!messages[0].content.contains("## Tools"));
    }

    #[test]
    fn history_window_keeps_the_tail() {
        let mut me = agent();
        for i in 0..60 {
            me.history
                .push(HistoryEntry::new(Role::User, format!("m{i}")));
        }
        let messages = compose(&me, None, &SwarmConfig::default(), "now");

        // system + 50 history + current message
        assert_eq!(messages.len(), 52);
        assert_eq!(messages[1].content, "m10");
        assert_eq!(messages[50].content, "m59");
        assert_eq!(messages[51].content, "now");
    }

    #[test]
    fn history_roles_map_through() {
        let mut me = agent();
        me.history.push(HistoryEntry::new(Role::User, "question"));
        me.history
            .push(HistoryEntry::new(Role::Assistant, "answer"));
        let messages = compose(&me, None, &SwarmConfig::default(), "next");
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[2].role, ChatRole::Assistant);
    }
}
