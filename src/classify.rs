//! Batch validation, classification, action derivation and stats.
//!
//! Everything here is a pure function of (batch, now, thresholds) — no I/O,
//! no clock reads. The orchestrator supplies `now` once per run so repeated
//! classification within a run is bit-identical.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    ActionItem, ActionPriority, Classification, ServiceRequest, ShiftStats, SrStatus, ValidSr,
    ValidationIssue, parse_instant,
};

/// Follow-up and SLA thresholds. Both comparisons are strict: an SR whose
/// age equals a threshold exactly is not flagged.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub followup: Duration,
    pub sla: Duration,
}

impl Thresholds {
    pub fn from_hours(followup_hours: f64, sla_hours: f64) -> Self {
        Self {
            followup: hours(followup_hours),
            sla: hours(sla_hours),
        }
    }
}

fn hours(h: f64) -> Duration {
    Duration::nanoseconds((h * 3_600_000_000_000.0) as i64)
}

/// Validate a raw batch: rejects SRs individually, never the whole batch.
///
/// Rejection reasons: empty id, duplicate id within the batch, missing or
/// unparseable `last_update`. Output order matches input order.
pub fn validate_batch(batch: &[ServiceRequest]) -> (Vec<ValidSr>, Vec<ValidationIssue>) {
    let mut valid = Vec::with_capacity(batch.len());
    let mut issues = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for sr in batch {
        let id = sr.id.trim();
        if id.is_empty() {
            issues.push(ValidationIssue {
                id: "<missing>".into(),
                reason: "empty id".into(),
            });
            continue;
        }
        if !seen.insert(id) {
            issues.push(ValidationIssue {
                id: id.to_string(),
                reason: "duplicate id within batch".into(),
            });
            continue;
        }

        let last_update = match sr.last_update.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => match parse_instant(raw) {
                Some(dt) => dt,
                None => {
                    issues.push(ValidationIssue {
                        id: id.to_string(),
                        reason: format!("unparseable last_update: {raw:?}"),
                    });
                    continue;
                }
            },
            _ => {
                issues.push(ValidationIssue {
                    id: id.to_string(),
                    reason: "missing last_update".into(),
                });
                continue;
            }
        };

        let status = SrStatus::parse(sr.status.as_deref());
        let status_label = sr
            .status
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".into());

        valid.push(ValidSr {
            id: id.to_string(),
            title: sr.title.clone(),
            status,
            status_label,
            priority: crate::model::Priority::parse(sr.priority.as_deref()),
            last_update,
            site: site_of(sr),
            escalation_flag: sr.escalation_flag.unwrap_or(false),
        });
    }

    (valid, issues)
}

/// The facility identifier for an SR: `site`, falling back to `node`.
fn site_of(sr: &ServiceRequest) -> Option<String> {
    sr.site
        .as_deref()
        .or(sr.node.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Classify validated SRs into the three buckets.
///
/// - open: status is not terminal
/// - follow-up: open AND `now - last_update > followup` (strict)
/// - escalation: `escalation_flag`, OR high/critical priority AND
///   `now - last_update > sla` (strict)
///
/// Buckets preserve input order; an SR may appear in more than one bucket.
pub fn classify(srs: &[ValidSr], now: DateTime<Utc>, thresholds: Thresholds) -> Classification {
    let mut out = Classification::default();

    for sr in srs {
        let age = now - sr.last_update;
        let open = !sr.status.is_terminal();

        if open {
            out.open_issues.push(sr.id.clone());
        }
        if open && age > thresholds.followup {
            out.follow_up_required.push(sr.id.clone());
        }
        if sr.escalation_flag || (sr.priority.is_high() && age > thresholds.sla) {
            out.escalations.push(sr.id.clone());
        }
    }

    out
}

/// Derive the action list from classification buckets.
///
/// One critical action per escalation, one medium follow-up action per
/// follow-up SR not already escalated. An empty list gets the standing
/// "nothing to do" item so the handover is never actionless.
pub fn derive_actions(classification: &Classification) -> Vec<ActionItem> {
    let escalated: HashSet<&str> = classification.escalations.iter().map(String::as_str).collect();
    let mut actions = Vec::new();

    for id in &classification.escalations {
        actions.push(ActionItem {
            action: format!("Escalate SR {id} to L2/management"),
            sr_id: Some(id.clone()),
            priority: ActionPriority::Critical,
        });
    }

    for id in &classification.follow_up_required {
        if escalated.contains(id.as_str()) {
            continue;
        }
        actions.push(ActionItem {
            action: format!("Follow up on SR {id}: no recent update"),
            sr_id: Some(id.clone()),
            priority: ActionPriority::Medium,
        });
    }

    if actions.is_empty() {
        actions.push(ActionItem {
            action: "No critical actions detected.".into(),
            sr_id: None,
            priority: ActionPriority::Low,
        });
    }

    actions
}

/// Batch statistics, independent of classification bucket contents.
pub fn compute_stats(
    srs: &[ValidSr],
    rejected: usize,
    now: DateTime<Utc>,
) -> ShiftStats {
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut priority_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut open = 0;
    let mut age_sum = 0.0;

    for sr in srs {
        *status_counts.entry(sr.status_label.clone()).or_default() += 1;
        *priority_counts.entry(sr.priority.label().to_string()).or_default() += 1;
        if !sr.status.is_terminal() {
            open += 1;
        }
        age_sum += sr.age_hours(now);
    }

    let avg_age_hours = if srs.is_empty() {
        0.0
    } else {
        (age_sum / srs.len() as f64 * 100.0).round() / 100.0
    };

    ShiftStats {
        total: srs.len(),
        open,
        status_counts,
        priority_counts,
        avg_age_hours,
        rejected,
    }
}
