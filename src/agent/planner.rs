//! Tool planning — which tool runs next.
//!
//! The reasoning provider is inherently non-deterministic input, so planning
//! is a polymorphic seam: the `Llm` planner asks the provider, `Fixed` is
//! the always-available deterministic order the orchestrator falls back to,
//! and `Scripted` replays a queue for reproducible tests. Enum dispatch,
//! same as the provider layer.

use std::collections::VecDeque;

use serde_json::json;
use tracing::debug;

use crate::llm::{LlmProvider, ProviderError};
use crate::prompts::PLANNER_SYSTEM_PROMPT;
use crate::tools::ToolName;

use super::RunState;

/// A tagged planning choice among the fixed tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDecision {
    Invoke(ToolName),
    Finish,
}

/// The deterministic default order.
pub const FIXED_ORDER: [ToolName; 5] = [
    ToolName::Analyze,
    ToolName::Classify,
    ToolName::CheckMemory,
    ToolName::DeriveActions,
    ToolName::Summarize,
];

#[derive(Debug)]
pub enum Planner {
    Llm(LlmPlanner),
    Fixed(FixedPlanner),
    Scripted(ScriptedPlanner),
}

impl Planner {
    pub fn llm(provider: LlmProvider) -> Self {
        Planner::Llm(LlmPlanner { provider })
    }

    pub fn fixed() -> Self {
        Planner::Fixed(FixedPlanner)
    }

    pub fn scripted(decisions: impl IntoIterator<Item = PlanDecision>) -> Self {
        Planner::Scripted(ScriptedPlanner { queue: decisions.into_iter().collect() })
    }

    /// Select the next tool (or declare completion) given the run state.
    pub async fn next(&mut self, state: &RunState) -> Result<PlanDecision, ProviderError> {
        match self {
            Planner::Llm(p) => p.next(state).await,
            Planner::Fixed(p) => Ok(p.next(state)),
            Planner::Scripted(p) => Ok(p.next()),
        }
    }
}

// ── Fixed ─────────────────────────────────────────────────────────────────────

/// Picks the first artifact still missing, in [`FIXED_ORDER`].
#[derive(Debug)]
pub struct FixedPlanner;

impl FixedPlanner {
    pub fn next(&self, state: &RunState) -> PlanDecision {
        for tool in FIXED_ORDER {
            if !state.has_artifact(tool) {
                return PlanDecision::Invoke(tool);
            }
        }
        PlanDecision::Finish
    }
}

// ── Scripted ──────────────────────────────────────────────────────────────────

/// Replays a pre-recorded decision sequence; finishes when the queue drains.
#[derive(Debug)]
pub struct ScriptedPlanner {
    queue: VecDeque<PlanDecision>,
}

impl ScriptedPlanner {
    pub fn next(&mut self) -> PlanDecision {
        self.queue.pop_front().unwrap_or(PlanDecision::Finish)
    }
}

// ── Llm ───────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct LlmPlanner {
    provider: LlmProvider,
}

impl LlmPlanner {
    async fn next(&self, state: &RunState) -> Result<PlanDecision, ProviderError> {
        let tools: Vec<_> = ToolName::ALL.iter().map(|t| t.schema()).collect();
        let user = serde_json::to_string_pretty(&json!({
            "shift_id": state.shift_id,
            "srs_count": state.srs.len(),
            "computed": state.computed_artifacts(),
            "tools": tools,
        }))
        .map_err(|e| ProviderError::Request(format!("serialize planner state: {e}")))?;

        let reply = self.provider.complete(Some(PLANNER_SYSTEM_PROMPT), &user).await?;
        let decision = parse_decision(&reply)?;
        debug!(?decision, "planner decision");
        Ok(decision)
    }
}

/// Parse a planner reply leniently.
///
/// Accepted: `{"tool": "<name>"}`, `{"done": true}`, a bare tool name, or
/// `done`/`finish`. Anything else is a malformed response, which the
/// orchestrator treats like any other planning failure.
pub fn parse_decision(reply: &str) -> Result<PlanDecision, ProviderError> {
    let trimmed = reply.trim().trim_start_matches("```json").trim_matches('`').trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.get("done").and_then(|d| d.as_bool()) == Some(true) {
            return Ok(PlanDecision::Finish);
        }
        if let Some(name) = value.get("tool").and_then(|t| t.as_str()) {
            return ToolName::parse(name)
                .map(PlanDecision::Invoke)
                .ok_or_else(|| ProviderError::Request(format!("planner chose unknown tool: {name:?}")));
        }
    }

    let word = trimmed.trim_matches('"');
    if word.eq_ignore_ascii_case("done") || word.eq_ignore_ascii_case("finish") {
        return Ok(PlanDecision::Finish);
    }
    if let Some(tool) = ToolName::parse(word) {
        return Ok(PlanDecision::Invoke(tool));
    }

    Err(ProviderError::Request(format!("malformed planner reply: {reply:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_tool_choice() {
        assert_eq!(
            parse_decision(r#"{"tool": "classify"}"#).unwrap(),
            PlanDecision::Invoke(ToolName::Classify)
        );
    }

    #[test]
    fn parses_json_done() {
        assert_eq!(parse_decision(r#"{"done": true}"#).unwrap(), PlanDecision::Finish);
    }

    #[test]
    fn parses_bare_word_and_fenced_json() {
        assert_eq!(
            parse_decision("check_memory").unwrap(),
            PlanDecision::Invoke(ToolName::CheckMemory)
        );
        assert_eq!(
            parse_decision("```json\n{\"tool\": \"summarize\"}\n```").unwrap(),
            PlanDecision::Invoke(ToolName::Summarize)
        );
        assert_eq!(parse_decision("DONE").unwrap(), PlanDecision::Finish);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(parse_decision("[echo] whatever").is_err());
        assert!(parse_decision(r#"{"tool": "send_email"}"#).is_err());
        assert!(parse_decision("").is_err());
    }

    #[test]
    fn scripted_drains_then_finishes() {
        let mut p = ScriptedPlanner {
            queue: [PlanDecision::Invoke(ToolName::Classify)].into_iter().collect(),
        };
        assert_eq!(p.next(), PlanDecision::Invoke(ToolName::Classify));
        assert_eq!(p.next(), PlanDecision::Finish);
    }
}
