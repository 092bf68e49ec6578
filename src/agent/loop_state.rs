//! Agent loop state management
//!
//! Tracks where one user turn is in the decide/act cycle and how many model
//! calls it has used.

/// Phase of the agent loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Waiting for the model's next decision
    AwaitingModel,
    /// Running the tool calls the model requested
    DispatchingTools,
    /// Final answer produced
    Done,
    /// Stopped without an answer
    Failed,
}

/// State of the agent loop for one user turn
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    /// Model calls made so far
    pub iteration: usize,
    /// Maximum allowed model calls
    pub max_iterations: usize,
    phase: LoopPhase,
}

impl AgentLoopState {
    /// Create a new loop state with the given budget
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            phase: LoopPhase::AwaitingModel,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Check if another model call is allowed
    pub fn should_continue(&self) -> bool {
        self.phase == LoopPhase::AwaitingModel && self.iteration < self.max_iterations
    }

    /// Count a model call
    pub fn record_model_call(&mut self) {
        debug_assert_eq!(self.phase, LoopPhase::AwaitingModel);
        self.iteration += 1;
    }

    /// AwaitingModel -> DispatchingTools
    pub fn begin_dispatch(&mut self) {
        debug_assert_eq!(self.phase, LoopPhase::AwaitingModel);
        self.phase = LoopPhase::DispatchingTools;
    }

    /// DispatchingTools -> AwaitingModel
    pub fn finish_dispatch(&mut self) {
        debug_assert_eq!(self.phase, LoopPhase::DispatchingTools);
        self.phase = LoopPhase::AwaitingModel;
    }

    /// AwaitingModel -> Done
    pub fn complete(&mut self) {
        self.phase = LoopPhase::Done;
    }

    /// Any -> Failed
    pub fn fail(&mut self) {
        self.phase = LoopPhase::Failed;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, LoopPhase::Done | LoopPhase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_new() {
        let state = AgentLoopState::new(10);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.max_iterations, 10);
        assert_eq!(state.phase(), LoopPhase::AwaitingModel);
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_should_continue() {
        let mut state = AgentLoopState::new(2);
        assert!(state.should_continue());

        state.record_model_call();
        state.begin_dispatch();
        assert!(!state.should_continue());
        state.finish_dispatch();
        assert!(state.should_continue());

        state.record_model_call();
        assert!(!state.should_continue()); // Budget used up
    }

    #[test]
    fn test_terminal_states() {
        let mut state = AgentLoopState::new(3);
        state.record_model_call();
        state.complete();
        assert!(state.is_terminal());
        assert!(!state.should_continue());

        let mut state = AgentLoopState::new(3);
        state.fail();
        assert_eq!(state.phase(), LoopPhase::Failed);
    }
}
