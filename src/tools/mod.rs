//! Tool registry — the named domain operations the orchestrator can invoke.
//!
//! Every tool is called uniformly by [`ToolName`] against the mutable
//! [`RunState`](crate::agent::RunState) and returns a JSON payload or a
//! typed failure. `summarize` is the only tool that reaches the reasoning
//! provider; everything else is deterministic local computation, so the
//! factual outputs are identical no matter in which order the planner
//! sequences the calls.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::agent::RunState;
use crate::classify::{Thresholds, classify, compute_stats, derive_actions};
use crate::llm::{LlmProvider, ProviderError};
use crate::memory::SiteMemory;
use crate::model::RunWarning;
use crate::prompts::SUMMARY_SYSTEM_PROMPT;

// ── Names ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    Analyze,
    Classify,
    CheckMemory,
    DeriveActions,
    Summarize,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::Analyze,
        ToolName::Classify,
        ToolName::CheckMemory,
        ToolName::DeriveActions,
        ToolName::Summarize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Analyze => "analyze",
            ToolName::Classify => "classify",
            ToolName::CheckMemory => "check_memory",
            ToolName::DeriveActions => "derive_actions",
            ToolName::Summarize => "summarize",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_matches('"').to_lowercase().as_str() {
            "analyze" | "analyze_tickets" => Some(ToolName::Analyze),
            "classify" | "classify_tickets" => Some(ToolName::Classify),
            "check_memory" | "detect_persistent_sites" => Some(ToolName::CheckMemory),
            "derive_actions" | "create_action_list" => Some(ToolName::DeriveActions),
            "summarize" | "generate_summary" => Some(ToolName::Summarize),
            _ => None,
        }
    }

    /// One-line description shown to the planner.
    pub fn description(self) -> &'static str {
        match self {
            ToolName::Analyze => "compute batch stats (totals, status and priority counts)",
            ToolName::Classify => "classify SRs into open / follow-up / escalation buckets",
            ToolName::CheckMemory => "detect sites recurring across shifts and record this shift",
            ToolName::DeriveActions => "derive the handover action list from classifications",
            ToolName::Summarize => "generate the free-text handover summary",
        }
    }

    /// Declared input/output shape, shown to the planner. Inputs name the
    /// run-state artifacts a tool reads; tools compute missing
    /// prerequisites themselves, so every call is valid in any order.
    pub fn schema(self) -> Value {
        let (inputs, output) = match self {
            ToolName::Analyze => (vec!["srs"], "stats"),
            ToolName::Classify => (vec!["srs", "thresholds"], "classification"),
            ToolName::CheckMemory => (vec!["classification", "shift_id"], "persistent_sites"),
            ToolName::DeriveActions => (vec!["classification"], "actions"),
            ToolName::Summarize => (vec!["stats", "classification", "actions", "persistent_sites"], "summary"),
        };
        json!({
            "name": self.as_str(),
            "description": self.description(),
            "inputs": inputs,
            "output": output,
        })
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool failed: {0}")]
    Local(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ToolError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ToolError::Local(_) => false,
            ToolError::Provider(e) => e.is_retryable(),
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// The fixed tool set, bound to this run's thresholds, the shared site
/// memory, and the reasoning provider.
pub struct ToolRegistry {
    thresholds: Thresholds,
    memory: Arc<SiteMemory>,
    llm: LlmProvider,
}

impl ToolRegistry {
    pub fn new(thresholds: Thresholds, memory: Arc<SiteMemory>, llm: LlmProvider) -> Self {
        Self { thresholds, memory, llm }
    }

    /// Invoke a tool by name against the run state.
    ///
    /// Each call is independently retryable: the local tools are pure
    /// recomputation over the same inputs, and the memory sweep is
    /// idempotent per shift.
    pub async fn execute(&self, name: ToolName, state: &mut RunState) -> Result<Value, ToolError> {
        debug!(tool = %name, "executing tool");
        match name {
            ToolName::Analyze => {
                let stats = compute_stats(&state.srs, state.validation_errors.len(), state.now);
                let payload = serde_json::to_value(&stats)
                    .map_err(|e| ToolError::Local(format!("serialize stats: {e}")))?;
                state.stats = Some(stats);
                Ok(payload)
            }

            ToolName::Classify => {
                let c = self.ensure_classified(state);
                serde_json::to_value(c).map_err(|e| ToolError::Local(format!("serialize classification: {e}")))
            }

            ToolName::CheckMemory => self.check_memory(state).await,

            ToolName::DeriveActions => {
                let c = self.ensure_classified(state).clone();
                let actions = derive_actions(&c);
                let payload = serde_json::to_value(&actions)
                    .map_err(|e| ToolError::Local(format!("serialize actions: {e}")))?;
                state.actions = Some(actions);
                Ok(payload)
            }

            ToolName::Summarize => self.summarize(state).await,
        }
    }

    /// Classification is a prerequisite of several tools; computing it here
    /// keeps tool results identical regardless of planner sequencing.
    fn ensure_classified<'a>(&self, state: &'a mut RunState) -> &'a crate::model::Classification {
        if state.classification.is_none() {
            state.classification = Some(classify(&state.srs, state.now, self.thresholds));
        }
        state.classification.as_ref().unwrap()
    }

    /// The §persistent-site check: query + record every site seen with an
    /// open or escalated issue this shift, then report recurrence.
    async fn check_memory(&self, state: &mut RunState) -> Result<Value, ToolError> {
        let classification = self.ensure_classified(state).clone();

        let Some(shift_id) = state.shift_id.clone() else {
            state.warnings.push(RunWarning::new(
                "memory_skipped",
                "no shift id supplied; site recurrence not recorded",
            ));
            state.persistent_sites = Some(Vec::new());
            return Ok(json!({ "persistent_sites": [], "recorded": false }));
        };

        // Sites from the open and escalation sets, input order, deduplicated.
        let mut sites: Vec<String> = Vec::new();
        for id in classification.open_issues.iter().chain(&classification.escalations) {
            let Some(sr) = state.srs.iter().find(|sr| &sr.id == id) else { continue };
            if let Some(site) = &sr.site {
                if !sites.contains(site) {
                    sites.push(site.clone());
                }
            }
        }

        let sweep = self
            .memory
            .check_and_record(&sites, &shift_id)
            .await
            .map_err(|e| ToolError::Local(e.to_string()))?;

        if let Some(detail) = &sweep.degraded {
            if !state.degraded_memory {
                state.degraded_memory = true;
                state.warnings.push(RunWarning::memory_corrupt(detail));
            }
        }
        state.memory_wrote |= sweep.wrote;

        let persistent: Vec<String> = sweep
            .sites
            .iter()
            .filter(|(_, &p)| p)
            .map(|(s, _)| s.clone())
            .collect();
        let payload = json!({
            "persistent_sites": persistent,
            "sites": sweep.sites,
            "recorded": sweep.wrote,
        });
        state.persistent_sites = Some(persistent);
        Ok(payload)
    }

    /// The only provider-backed tool. Network failure modes (timeout,
    /// rate-limit) surface as [`ToolError::Provider`] so the orchestrator
    /// can retry and finally fall back to the deterministic summary.
    async fn summarize(&self, state: &mut RunState) -> Result<Value, ToolError> {
        let stats = state
            .stats
            .clone()
            .unwrap_or_else(|| compute_stats(&state.srs, state.validation_errors.len(), state.now));
        let classification = self.ensure_classified(state).clone();

        let payload = json!({
            "shift_id": state.shift_id,
            "stats": stats,
            "open": classification.open_issues.len(),
            "follow_up": classification.follow_up_required.len(),
            "escalations": classification.escalations.len(),
            "persistent_sites": state.persistent_sites.clone().unwrap_or_default(),
            "actions": state.actions.clone().unwrap_or_default(),
        });
        let user = format!(
            "Summarize shift data:\n{}",
            serde_json::to_string_pretty(&payload)
                .map_err(|e| ToolError::Local(format!("serialize summary payload: {e}")))?
        );

        let text = self.llm.complete(Some(SUMMARY_SYSTEM_PROMPT), &user).await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::Request("empty summary".into()).into());
        }
        state.summary = Some(text.clone());
        Ok(json!({ "summary": text }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for t in ToolName::ALL {
            assert_eq!(ToolName::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn legacy_aliases_parse() {
        assert_eq!(ToolName::parse("classify_tickets"), Some(ToolName::Classify));
        assert_eq!(ToolName::parse("detect_persistent_sites"), Some(ToolName::CheckMemory));
        assert_eq!(ToolName::parse("generate_summary"), Some(ToolName::Summarize));
        assert_eq!(ToolName::parse("send_email"), None);
    }

    #[test]
    fn local_errors_are_not_retryable() {
        assert!(!ToolError::Local("x".into()).is_retryable());
        assert!(ToolError::Provider(ProviderError::Timeout("t".into())).is_retryable());
    }
}
