//! relevo — agentic shift-handover assistant for network monitoring centers.
//!
//! The core pipeline: a batch of service requests is validated, classified
//! into handover buckets, checked against the cross-shift site memory, and
//! condensed into a structured report. An agent loop sequences those steps
//! through a reasoning provider, bounded by a step budget and backed by a
//! deterministic fallback plan.

pub mod agent;
pub mod classify;
pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod memory;
pub mod model;
pub mod prompts;
pub mod report;
pub mod server;
pub mod tools;
