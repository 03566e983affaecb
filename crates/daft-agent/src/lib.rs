mod agent_loop;
mod executor;
mod prompt;

pub use agent_loop::{
    AgentError, AgentLoop, AgentLoopConfig, AgentOutcome, DENIAL_MESSAGE, EventCallback,
};
pub use executor::{CommandExecutor, CommandReport, CommandStatus};
pub use prompt::{
    MemoryChoice, QuestionError, assemble_prompt, large_memory_question, memory_context,
    needs_memory_choice, validate_question,
};
