//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("memory corrupt: {0}")]
    MemoryCorrupt(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("provider error: {0}")]
    Provider(#[from] crate::llm::ProviderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn memory_corrupt_display() {
        let e = AppError::MemoryCorrupt("bad json at byte 12".into());
        assert!(e.to_string().contains("memory corrupt"));
        assert!(e.to_string().contains("bad json"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn provider_error_converts() {
        let e: AppError = crate::llm::ProviderError::Request("boom".into()).into();
        assert!(e.to_string().contains("boom"));
    }
}
