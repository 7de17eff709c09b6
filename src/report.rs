//! Report assembly — pure aggregation of the final orchestrator state.
//!
//! Stats are recomputed directly from the validated batch, independent of
//! classification bucket contents, so stats and classifications can never
//! disagree about the SRs they both describe.

use crate::agent::{Phase, RunState};
use crate::classify::compute_stats;
use crate::model::{ShiftReport, ShiftStats};

/// Build the immutable [`ShiftReport`] from a finished (or truncated) run.
pub fn assemble(state: RunState, phase: Phase) -> ShiftReport {
    let stats = compute_stats(&state.srs, state.validation_errors.len(), state.now);
    let classifications = state.classification.unwrap_or_default();
    let summary = state
        .summary
        .unwrap_or_else(|| fallback_summary(state.shift_id.as_deref(), &stats, classifications.escalations.len()));

    ShiftReport {
        shift_id: state.shift_id,
        summary,
        stats,
        classifications,
        actions: state.actions.unwrap_or_default(),
        persistent_sites: state.persistent_sites.unwrap_or_default(),
        validation_errors: state.validation_errors,
        warnings: state.warnings,
        email: None,
        memory_updated: state.memory_wrote,
        degraded: state.degraded_memory || state.degraded_planner,
        budget_exhausted: phase == Phase::BudgetExhausted,
    }
}

/// Deterministic one-line summary used whenever the provider cannot supply
/// free text.
pub fn fallback_summary(shift_id: Option<&str>, stats: &ShiftStats, escalations: usize) -> String {
    format!(
        "Shift {} summary: {} SRs handled, {} open, {} escalations.",
        shift_id.unwrap_or(""),
        stats.total,
        stats.open,
        escalations
    )
    .replace("  ", " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShiftStats;

    #[test]
    fn fallback_summary_mentions_counts() {
        let stats = ShiftStats { total: 5, open: 3, ..Default::default() };
        let s = fallback_summary(Some("S1"), &stats, 2);
        assert!(s.contains("S1"));
        assert!(s.contains("5 SRs"));
        assert!(s.contains("3 open"));
        assert!(s.contains("2 escalations"));
    }

    #[test]
    fn fallback_summary_without_shift_id() {
        let stats = ShiftStats::default();
        let s = fallback_summary(None, &stats, 0);
        assert!(s.starts_with("Shift summary:"));
    }
}
