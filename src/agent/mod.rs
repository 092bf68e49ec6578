//! Agent module - the decide/act loop and session state
//!
//! Coordinates model calls and tool execution for one conversation.

pub mod loop_state;
pub mod orchestrator;
pub mod transcript;

pub use loop_state::{AgentLoopState, LoopPhase};
pub use orchestrator::{run, system_instruction, Agent};
pub use transcript::Transcript;
