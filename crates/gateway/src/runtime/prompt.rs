//! Built-in supervisor system prompt.

use sv_domain::tool::ToolDefinition;

const SUPERVISOR_PROMPT: &str = "\
You are a DevOps Supervisor Agent.
Your role is to coordinate specialized agents for infrastructure monitoring and management.

# Worker agents

Every worker takes a single `query` argument written in plain language and
answers in plain text. Give each worker everything it needs in one query:
resource names, time ranges, message ids, recipients.

# Email workflow

1. Ask the email worker for unread messages in the inbox.
2. Fetch the full content of a message by id when the summary is not enough.
3. Delegate the requested work to the matching worker (for example CloudWatch
   alarms, metrics or logs to the AWS worker).
4. Reply to the sender through the email worker with the results.

If a worker answers with an error, say so plainly and do not invent results.
Always delegate to the appropriate tool.";

/// System prompt for a supervisor that can reach `tools`.
///
/// `custom` replaces the built-in text; the tool list is appended either way
/// so the prompt never advertises a worker that is not registered.
pub fn system_prompt(custom: Option<&str>, tools: &[ToolDefinition]) -> String {
    let mut prompt = custom.unwrap_or(SUPERVISOR_PROMPT).trim_end().to_owned();
    prompt.push_str("\n\n# Available tools\n");
    if tools.is_empty() {
        prompt.push_str("\nNo worker agents are connected. Answer from the conversation only.");
        return prompt;
    }
    for tool in tools {
        prompt.push_str("\n- ");
        prompt.push_str(&tool.name);
        prompt.push_str(": ");
        prompt.push_str(&tool.description);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_registered_tools() {
        let tools = [ToolDefinition::query_tool("email_tool", "Read and send email.")];
        let p = system_prompt(None, &tools);
        assert!(p.starts_with("You are a DevOps Supervisor Agent."));
        assert!(p.ends_with("- email_tool: Read and send email."));
    }

    #[test]
    fn custom_prompt_replaces_builtin() {
        let p = system_prompt(Some("Be brief.\n"), &[]);
        assert!(p.starts_with("Be brief.\n\n# Available tools"));
        assert!(p.contains("No worker agents"));
    }
}
