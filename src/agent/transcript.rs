//! Conversation transcript
//!
//! Append-only, ordered record of turns. Tool exchanges are appended as an
//! assistant turn immediately followed by the tool turn answering it.

use crate::core::{Result, Role, ToolCall, ToolResult, Turn, TytuxError};

/// Ordered conversation history for one session
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    /// Add an assistant text turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    /// Add an assistant tool-call turn and the tool turn answering it
    ///
    /// `content` is any text the model sent with the calls. Rejects the pair
    /// unless `results` answer `calls` one-to-one, in order.
    pub fn push_tool_exchange(
        &mut self,
        content: impl Into<String>,
        calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    ) -> Result<()> {
        if !results_match_calls(&calls, &results) {
            return Err(TytuxError::tool(format!(
                "tool results do not answer the {} requested call(s) in order",
                calls.len()
            )));
        }

        self.turns.push(Turn::assistant_calls(content, calls));
        self.turns.push(Turn::tool(results));
        Ok(())
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Get the last turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Get the last user turn
    pub fn last_user_message(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::User)
    }

    /// Check that every tool turn answers the assistant turn right before it
    pub fn is_consistent(&self) -> bool {
        self.turns.iter().enumerate().all(|(i, turn)| {
            if turn.role != Role::Tool {
                return true;
            }
            match i.checked_sub(1).map(|p| &self.turns[p]) {
                Some(prev) if prev.role == Role::Assistant => {
                    results_match_calls(&prev.tool_calls, &turn.tool_results)
                }
                _ => false,
            }
        })
    }

    /// Get turn count
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

fn results_match_calls(calls: &[ToolCall], results: &[ToolResult]) -> bool {
    calls.len() == results.len()
        && calls
            .iter()
            .zip(results)
            .all(|(call, result)| call.id == result.call_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "executeQuery", json!({"query": "{}"}))
    }

    #[test]
    fn test_transcript_basic() {
        let mut transcript = Transcript::new();
        transcript.push_user("How many hosts?");
        transcript.push_assistant("Twelve.");

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last_user_message().unwrap().content, "How many hosts?");
        assert_eq!(transcript.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_tool_exchange_appends_pair() {
        let mut transcript = Transcript::new();
        transcript.push_user("q");
        let calls = vec![call("a"), call("b")];
        let results = vec![
            ToolResult::ok(&calls[0], json!(1)),
            ToolResult::error(&calls[1], "nope"),
        ];
        transcript.push_tool_exchange("Checking both.", calls, results).unwrap();

        let turns = transcript.turns();
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].tool_calls.len(), 2);
        assert_eq!(turns[1].content, "Checking both.");
        assert_eq!(turns[2].role, Role::Tool);
        assert_eq!(turns[2].tool_results[1].call_id, "b");
        assert!(transcript.is_consistent());
    }

    #[test]
    fn test_tool_exchange_rejects_reordered_results() {
        let mut transcript = Transcript::new();
        let calls = vec![call("a"), call("b")];
        let results = vec![
            ToolResult::ok(&calls[1], json!(1)),
            ToolResult::ok(&calls[0], json!(2)),
        ];

        assert!(transcript.push_tool_exchange("", calls, results).is_err());
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_tool_exchange_rejects_missing_result() {
        let mut transcript = Transcript::new();
        let calls = vec![call("a"), call("b")];
        let results = vec![ToolResult::ok(&calls[0], json!(1))];
        assert!(transcript.push_tool_exchange("", calls, results).is_err());
    }
}
