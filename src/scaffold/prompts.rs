//! Prompts for the bug-fixing agent.
//!
//! The system prompt carries the task; the first user message carries the
//! failing test output captured before the loop starts.

use crate::task::Task;

/// Fixed part of the system prompt.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are an autonomous software engineer fixing a bug in a code repository. A test that exercises the bug is currently failing. Your goal is to change the code so that it passes without breaking anything else.

## Available Tools

1. **run_command** - Execute a shell command in the repository root
   - Use for running tests, listing files, searching code (grep, find)
   - Returns combined stdout and stderr plus the exit code

2. **read_file** - Read file contents
   - Paths are relative to the repository root unless absolute
   - Can read specific line ranges with start_line and end_line

3. **write_file** - Create or overwrite a file
   - Creates parent directories automatically
   - Replaces the whole file

4. **edit_file** - Replace literal content in an existing file
   - old_content must match exactly (including whitespace)
   - Replaces the first occurrence unless replace_all is true

## Guidelines

1. **Read before writing**: inspect the failing test and the code under test first.
2. **Make minimal changes**: fix the root cause, do not rewrite unrelated code.
3. **Do not edit the tests** unless the task says so.
4. **Verify your work**: run the test command after changing the code.
5. **Stop when done**: when the fix is in place, reply with a short summary and no tool calls.
"#;

fn push_section(prompt: &mut String, heading: &str, body: &str) {
    let body = body.trim();
    if body.is_empty() {
        return;
    }
    prompt.push_str("\n## ");
    prompt.push_str(heading);
    prompt.push_str("\n\n");
    prompt.push_str(body);
    prompt.push('\n');
}

/// Build the system prompt for a task.
pub fn build_system_prompt(task: &Task) -> String {
    let mut prompt = String::from(AGENT_SYSTEM_PROMPT);

    let heading = if task.title.trim().is_empty() {
        format!("Task {}", task.task_id)
    } else {
        format!("Task {}: {}", task.task_id, task.title.trim())
    };
    push_section(&mut prompt, &heading, &task.description);
    push_section(&mut prompt, "Requirements", &task.requirements);
    push_section(&mut prompt, "Interface", &task.interface);

    if !task.files_to_modify.is_empty() {
        let files = task
            .files_to_modify
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n");
        push_section(&mut prompt, "Files likely to need changes", &files);
    }

    push_section(
        &mut prompt,
        "Test command",
        &format!("`{}`", task.tests.test_command),
    );
    prompt
}

/// Build the first user message from the pre-verification output.
pub fn build_initial_message(task: &Task, pre_output: &str) -> String {
    let output = if pre_output.trim().is_empty() {
        "(the test command produced no output)"
    } else {
        pre_output.trim_end()
    };

    let mut message = format!(
        "Tests failing:\n```\n{}\n```\n\n{}",
        output,
        task.description.trim()
    );
    if let Some(first) = task.files_to_modify.first() {
        message.push_str(&format!("\n\nStart by looking at {}.", first));
    }
    message
}
