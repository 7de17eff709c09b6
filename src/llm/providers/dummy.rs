//! Canned reasoning provider — runs the full pipeline without network
//! calls or an API key. Planning replies never parse as a plan, so the
//! orchestrator wires the fixed tool order instead; summaries come back as
//! [`CANNED_REPLY`]. Tests can script the reply and inject transient
//! failures to exercise the retry paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::llm::ProviderError;

/// Reply returned when no script is set.
pub const CANNED_REPLY: &str =
    "Shift processed without a reasoning provider; review the stats, actions, and escalations in this report.";

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    reply: Option<String>,
    fail_first: Arc<AtomicU32>,
}

impl DummyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always reply with `reply` instead of [`CANNED_REPLY`].
    pub fn scripted(reply: impl Into<String>) -> Self {
        Self { reply: Some(reply.into()), fail_first: Arc::default() }
    }

    /// Time out the first `n` calls, then reply normally. Clones share the
    /// failure counter.
    pub fn failing_first(self, n: u32) -> Self {
        Self { fail_first: Arc::new(AtomicU32::new(n)), ..self }
    }

    pub async fn complete(
        &self,
        _system: Option<&str>,
        _user: &str,
    ) -> Result<String, ProviderError> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Timeout("simulated timeout".into()));
        }
        Ok(self.reply.clone().unwrap_or_else(|| CANNED_REPLY.to_string()))
    }
}
