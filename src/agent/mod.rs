//! Agent orchestrator — the bounded-step control loop.
//!
//! One invocation runs one shift: ask the planner which tool to invoke next,
//! execute it, fold the result into [`RunState`], repeat until the planner
//! declares completion or the step budget runs out. The loop is
//! deterministic in its bookkeeping; only the planner's choice (and the
//! summary text) depend on the reasoning provider. Planning failures retry
//! with bounded backoff and then degrade to the fixed plan, so a dead
//! provider never fails the shift.

pub mod planner;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classify::{Thresholds, validate_batch};
use crate::config::{AgentConfig, Config};
use crate::llm::LlmProvider;
use crate::memory::SiteMemory;
use crate::model::{
    ActionItem, Classification, RunWarning, ServiceRequest, ShiftReport, ShiftStats, ValidSr,
    ValidationIssue,
};
use crate::report;
use crate::tools::{ToolError, ToolName, ToolRegistry};

use planner::{FIXED_ORDER, PlanDecision, Planner};

// ── Phases ────────────────────────────────────────────────────────────────────

/// Orchestrator state machine. `Done` and `BudgetExhausted` are distinct
/// terminals. There is no failure terminal: report assembly is pure and
/// every provider, tool, and memory fault degrades into report warnings,
/// so a run always ends in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Planning,
    Executing,
    Observing,
    Summarizing,
    Done,
    BudgetExhausted,
}

// ── Run state ─────────────────────────────────────────────────────────────────

/// Accumulated state of one shift run. Tools fold their results in here;
/// the report assembler reads it out at the end.
#[derive(Debug)]
pub struct RunState {
    pub shift_id: Option<String>,
    /// The single clock read for the whole run — repeated classification is
    /// bit-identical.
    pub now: DateTime<Utc>,
    pub srs: Vec<ValidSr>,
    pub validation_errors: Vec<ValidationIssue>,
    pub stats: Option<ShiftStats>,
    pub classification: Option<Classification>,
    pub actions: Option<Vec<ActionItem>>,
    pub persistent_sites: Option<Vec<String>>,
    pub summary: Option<String>,
    pub warnings: Vec<RunWarning>,
    pub memory_wrote: bool,
    pub degraded_memory: bool,
    pub degraded_planner: bool,
}

impl RunState {
    fn new(
        shift_id: Option<String>,
        now: DateTime<Utc>,
        srs: Vec<ValidSr>,
        validation_errors: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            shift_id,
            now,
            srs,
            validation_errors,
            stats: None,
            classification: None,
            actions: None,
            persistent_sites: None,
            summary: None,
            warnings: Vec::new(),
            memory_wrote: false,
            degraded_memory: false,
            degraded_planner: false,
        }
    }

    /// Whether the artifact a tool produces is already present.
    pub fn has_artifact(&self, tool: ToolName) -> bool {
        match tool {
            ToolName::Analyze => self.stats.is_some(),
            ToolName::Classify => self.classification.is_some(),
            ToolName::CheckMemory => self.persistent_sites.is_some(),
            ToolName::DeriveActions => self.actions.is_some(),
            ToolName::Summarize => self.summary.is_some(),
        }
    }

    pub fn is_complete(&self) -> bool {
        FIXED_ORDER.iter().all(|t| self.has_artifact(*t))
    }

    /// Names of the artifacts computed so far — shown to the planner.
    pub fn computed_artifacts(&self) -> Vec<&'static str> {
        FIXED_ORDER
            .iter()
            .filter(|t| self.has_artifact(**t))
            .map(|t| t.as_str())
            .collect()
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Orchestrator {
    config: AgentConfig,
    registry: ToolRegistry,
    planner: Planner,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(config: AgentConfig, registry: ToolRegistry, planner: Planner) -> Self {
        Self { config, registry, planner, phase: Phase::Init }
    }

    /// Standard wiring: thresholds from config, planner per
    /// `agent.planner` (`"llm"` or `"fixed"`).
    pub fn from_config(config: &Config, memory: Arc<SiteMemory>, llm: LlmProvider) -> Self {
        let thresholds =
            Thresholds::from_hours(config.agent.followup_hours, config.agent.sla_hours);
        let registry = ToolRegistry::new(thresholds, memory, llm.clone());
        // The canned provider never produces a parseable plan, so asking it
        // would only burn retries before landing on the fixed order anyway.
        let planner = match config.agent.planner.as_str() {
            "fixed" => Planner::fixed(),
            _ if matches!(llm, LlmProvider::Dummy(_)) => Planner::fixed(),
            _ => Planner::llm(llm),
        };
        Self::new(config.agent.clone(), registry, planner)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one shift to a report. Absorbs every recoverable failure into
    /// report warnings; never panics, never loops past the step budget.
    pub async fn run(
        mut self,
        shift_id: Option<String>,
        batch: &[ServiceRequest],
    ) -> ShiftReport {
        let now = Utc::now();
        let (valid, issues) = validate_batch(batch);
        let mut state = RunState::new(shift_id, now, valid, issues);

        info!(
            shift_id = state.shift_id.as_deref().unwrap_or("<none>"),
            srs = state.srs.len(),
            rejected = state.validation_errors.len(),
            "shift run starting"
        );

        if state.srs.is_empty() {
            // Nothing to reason about; skip the provider entirely.
            state.summary = Some("No SRs provided for this shift.".to_string());
            state.classification = Some(Classification::default());
            state.persistent_sites = Some(Vec::new());
            self.backfill(&mut state).await;
            self.phase = Phase::Done;
            return report::assemble(state, self.phase);
        }

        let mut steps: u32 = 0;
        loop {
            if state.is_complete() {
                break;
            }
            if steps >= self.config.max_steps {
                warn!(steps, "step budget exhausted before plan converged");
                self.phase = Phase::BudgetExhausted;
                return report::assemble(state, self.phase);
            }

            self.phase = Phase::Planning;
            let decision = self.plan(&mut state).await;

            let tool = match decision {
                PlanDecision::Finish => break,
                PlanDecision::Invoke(tool) => tool,
            };

            self.phase = Phase::Executing;
            self.execute_with_retry(tool, &mut state).await;

            self.phase = Phase::Observing;
            steps += 1;
            debug!(step = steps, tool = %tool, computed = ?state.computed_artifacts(), "step observed");
        }

        // Converged (or the planner declared completion early): fill in any
        // missing deterministic artifacts, then make sure a summary exists.
        self.backfill(&mut state).await;

        self.phase = Phase::Summarizing;
        if state.summary.is_none() {
            self.execute_with_retry(ToolName::Summarize, &mut state).await;
        }

        self.phase = Phase::Done;
        info!(
            shift_id = state.shift_id.as_deref().unwrap_or("<none>"),
            steps,
            warnings = state.warnings.len(),
            "shift run complete"
        );
        report::assemble(state, self.phase)
    }

    /// Ask the planner, retrying with bounded backoff. After the attempt
    /// budget the orchestrator permanently switches to the fixed plan.
    /// Failed attempts are annotated in the report even when a later
    /// attempt succeeds.
    async fn plan(&mut self, state: &mut RunState) -> PlanDecision {
        let mut attempt: u32 = 0;
        loop {
            match self.planner.next(state).await {
                Ok(decision) => {
                    if attempt > 0 {
                        state.warnings.push(RunWarning::new(
                            "provider_retry",
                            format!("planning succeeded after {attempt} failed attempt(s)"),
                        ));
                    }
                    return decision;
                }
                Err(e) => {
                    attempt += 1;
                    warn!(attempt, error = %e, "planning call failed");
                    if attempt >= self.config.planner_attempts {
                        if !state.degraded_planner {
                            state.degraded_planner = true;
                            state.warnings.push(RunWarning::new(
                                "planner_fallback",
                                format!(
                                    "planning failed after {attempt} attempts ({e}); using fixed tool order"
                                ),
                            ));
                        }
                        self.planner = Planner::fixed();
                        return match self.planner.next(state).await {
                            Ok(d) => d,
                            Err(_) => PlanDecision::Finish,
                        };
                    }
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }
    }

    /// Execute one tool; retry once on a network-style failure; absorb
    /// anything that still fails into a report warning. A retry that
    /// succeeds still leaves a trace in the warnings.
    async fn execute_with_retry(&mut self, tool: ToolName, state: &mut RunState) {
        let first = self.registry.execute(tool, state).await;
        let outcome = match first {
            Err(e) if e.is_retryable() => {
                warn!(tool = %tool, error = %e, "tool failed; retrying once");
                tokio::time::sleep(self.backoff(1)).await;
                let second = self.registry.execute(tool, state).await;
                if second.is_ok() {
                    state.warnings.push(RunWarning::new(
                        "provider_retry",
                        format!("tool {tool} succeeded after a retry ({e})"),
                    ));
                }
                second
            }
            other => other,
        };

        if let Err(e) = outcome {
            self.absorb_tool_failure(tool, e, state);
        }
    }

    fn absorb_tool_failure(&self, tool: ToolName, e: ToolError, state: &mut RunState) {
        warn!(tool = %tool, error = %e, "tool failed; degrading");
        if tool == ToolName::Summarize {
            // The report falls back to the deterministic one-line summary.
            state.warnings.push(RunWarning::new(
                "summary_fallback",
                format!("summary generation failed ({e}); using deterministic summary"),
            ));
        } else {
            state.warnings.push(RunWarning::new(
                "tool_failed",
                format!("tool {tool} failed: {e}"),
            ));
        }
    }

    /// Fill in missing deterministic artifacts in fixed order. Runs only
    /// after convergence — never on budget exhaustion, which reports the
    /// partial state as-is.
    async fn backfill(&mut self, state: &mut RunState) {
        for tool in FIXED_ORDER {
            if tool == ToolName::Summarize || state.has_artifact(tool) {
                continue;
            }
            if let Err(e) = self.registry.execute(tool, state).await {
                self.absorb_tool_failure(tool, e, state);
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.backoff_ms << attempt.saturating_sub(1).min(6))
    }
}
