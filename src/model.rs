//! Data model for shift handover runs.
//!
//! [`ServiceRequest`] is the permissive wire shape accepted from the adapter;
//! [`ValidSr`] is the validated form the classification engine works on.
//! Report-side types ([`Classification`], [`ActionItem`], [`ShiftStats`],
//! [`ShiftReport`]) are plain serde structs — assembled once, immutable after.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Input shape ───────────────────────────────────────────────────────────────

/// A service request snapshot as supplied by the caller.
///
/// Fields other than `id` are optional on the wire; validation decides what
/// is usable. Unknown extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    #[serde(alias = "sr_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    /// Legacy field — used as the site when `site` is absent.
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub escalation_flag: Option<bool>,
}

// ── Status & priority ─────────────────────────────────────────────────────────

/// Normalised SR status.
///
/// The terminal set is explicit: `Closed`, `Resolved`, `Done`, `Completed`
/// and `Cancelled` end an SR's life; everything else — including `Pending`
/// and unrecognised statuses — counts as open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrStatus {
    Open,
    InProgress,
    Pending,
    Closed,
    Resolved,
    Done,
    Completed,
    Cancelled,
    Unknown,
}

impl SrStatus {
    /// Parse a free-text status, case- and separator-insensitive.
    pub fn parse(raw: Option<&str>) -> Self {
        let norm = normalize(raw);
        match norm.as_str() {
            "open" | "new" => SrStatus::Open,
            "in progress" | "assigned" | "working" => SrStatus::InProgress,
            "pending" | "waiting" | "on hold" => SrStatus::Pending,
            "closed" => SrStatus::Closed,
            "resolved" => SrStatus::Resolved,
            "done" => SrStatus::Done,
            "completed" => SrStatus::Completed,
            "cancelled" | "canceled" => SrStatus::Cancelled,
            _ => SrStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SrStatus::Closed
                | SrStatus::Resolved
                | SrStatus::Done
                | SrStatus::Completed
                | SrStatus::Cancelled
        )
    }
}

/// Normalised SR priority.
///
/// Accepts the ticketing aliases the center actually emits: `p1` maps to
/// `Critical`, `p2` and `urgent` to `High`, `p3` to `Medium`, `p4` to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn parse(raw: Option<&str>) -> Self {
        match normalize(raw).as_str() {
            "low" | "p4" => Priority::Low,
            "medium" | "normal" | "p3" => Priority::Medium,
            "high" | "urgent" | "p2" => Priority::High,
            "critical" | "p1" => Priority::Critical,
            _ => Priority::Unknown,
        }
    }

    /// High tier for SLA purposes: `High` or `Critical`.
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Unknown => "unknown",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

fn normalize(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
}

// ── Validated SR ──────────────────────────────────────────────────────────────

/// A service request that passed batch validation.
#[derive(Debug, Clone)]
pub struct ValidSr {
    pub id: String,
    pub title: Option<String>,
    pub status: SrStatus,
    /// Normalised status label used for per-status stats counting.
    pub status_label: String,
    pub priority: Priority,
    pub last_update: DateTime<Utc>,
    pub site: Option<String>,
    pub escalation_flag: bool,
}

impl ValidSr {
    /// Hours elapsed since the SR's last update, as of `now`.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_update).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Parse a timestamp string as a UTC instant.
///
/// Accepts RFC 3339 (with `Z` or numeric offset) and bare
/// `YYYY-MM-DDTHH:MM:SS[.fff]` assumed UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// One rejected SR: kept out of classification, reported per-id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub id: String,
    pub reason: String,
}

// ── Report-side types ─────────────────────────────────────────────────────────

/// Classification buckets — ordered SR id lists, stable in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    pub open_issues: Vec<String>,
    pub follow_up_required: Vec<String>,
    pub escalations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Medium,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionItem {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sr_id: Option<String>,
    pub priority: ActionPriority,
}

/// Batch statistics, recomputed directly from the validated SRs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShiftStats {
    pub total: usize,
    pub open: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub priority_counts: BTreeMap<String, usize>,
    pub avg_age_hours: f64,
    /// SRs rejected by validation, excluded from `total`.
    pub rejected: usize,
}

/// A degraded-run annotation. Nothing is ever silently dropped: every
/// absorbed failure surfaces here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunWarning {
    pub code: String,
    pub message: String,
}

impl RunWarning {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self { code: code.to_string(), message: message.into() }
    }
}

/// The assembled handover report — created once per invocation, immutable
/// after assembly, not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftReport {
    pub shift_id: Option<String>,
    pub summary: String,
    pub stats: ShiftStats,
    pub classifications: Classification,
    pub actions: Vec<ActionItem>,
    pub persistent_sites: Vec<String>,
    #[serde(default)]
    pub validation_errors: Vec<ValidationIssue>,
    #[serde(default)]
    pub warnings: Vec<RunWarning>,
    /// Opaque pass-through for the email adapter; the core never fills it.
    #[serde(default)]
    pub email: Option<serde_json::Value>,
    pub memory_updated: bool,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub budget_exhausted: bool,
}
