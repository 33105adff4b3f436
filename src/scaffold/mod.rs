//! Scaffold system for agent execution.
//!
//! The scaffold provides tools to the model and drives the conversation:
//! 1. Send the conversation
//! 2. Append the reply
//! 3. Execute requested tools
//! 4. Append their results
//! 5. Check termination
//!
//! # Example
//!
//! ```ignore
//! use swe_resolve::scaffold::{AgentConfig, AgentLoop, ExecutionContext};
//!
//! let agent = AgentLoop::new(client, AgentConfig::default().with_max_turns(5));
//! let outcome = agent.run(&task, &pre_output, &ExecutionContext::new("/testbed"), &mut transcript).await;
//! ```

pub mod agent_loop;
pub mod prompts;
pub mod tools;

pub use agent_loop::{AgentConfig, AgentError, AgentLoop, AgentOutcome, Termination};
pub use prompts::{build_initial_message, build_system_prompt, AGENT_SYSTEM_PROMPT};
pub use tools::{
    run_command, CommandOutput, EditFileTool, ExecutionContext, ReadFileTool, RunCommandTool,
    Tool, ToolError, ToolOutcome, ToolRegistry, WriteFileTool,
};
